//! Persisted audit log
//!
//! Append-only file of raw audit records, written back to back without a
//! delimiter. Appends are serialized so concurrent submissions never
//! interleave partial values.

use log::{debug, error};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::codec::{encode_record, RecordStream};
use crate::common::{AuditError, Result};
use crate::fingerprint::AuditRecord;

/// File name of the log inside the data directory
pub const LOG_FILE_NAME: &str = "browser-data.json";

/// Most records a single read returns
pub const MAX_RESULTS: usize = 5000;

/// Audit log manager
#[derive(Debug)]
pub struct AuditLog {
    /// Path to the log file
    file_path: PathBuf,

    /// Held for the duration of each append
    write_lock: Mutex<()>,
}

impl AuditLog {
    /// Open the log inside a data directory, creating the directory if needed
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        Ok(Self::at_path(data_dir.join(LOG_FILE_NAME)))
    }

    /// Use an explicit file path
    pub fn at_path<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path to the log file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Append a record
    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        let bytes = encode_record(record)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AuditError::Other("audit log lock poisoned".to_string()))?;

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .and_then(|mut file| {
                file.write_all(&bytes)?;
                file.flush()
            });

        if let Err(e) = &result {
            error!("Failed to append to {}: {}", self.file_path.display(), e);
        }
        result?;

        debug!("Appended audit record for agent {:?}", record.user_agent);
        Ok(())
    }

    /// Read records oldest first
    ///
    /// # Parameters
    ///
    /// * `limit` - Maximum number of records, clamped to [`MAX_RESULTS`]
    ///
    /// # Returns
    ///
    /// The well-formed records; malformed ones are skipped with a warning
    pub fn read_records(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        let limit = limit.min(MAX_RESULTS);
        if limit == 0 || !self.file_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.file_path)?;
        let mut records = Vec::with_capacity(limit.min(256));
        for record in RecordStream::new(file).take(limit) {
            records.push(record?);
        }
        Ok(records)
    }
}
