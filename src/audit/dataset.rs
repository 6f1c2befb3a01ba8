//! Enriched dataset export
//!
//! Writes every persisted record, enriched, into a single timestamped JSON
//! document. A previous dataset is kept under a date-prefixed name.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::codec::EnrichedAuditRecordJson;
use crate::agent::AgentClassifier;
use crate::common::Result;
use crate::fingerprint::{enrich_record, AuditRecord, ProtocolNameTables};

/// File name of the current dataset
pub const DATASET_FILE_NAME: &str = "enriched-browser-data.json";

/// The exported document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedDataset {
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "Capabilities")]
    pub capabilities: Vec<EnrichedAuditRecordJson>,
}

/// Only the timestamp of an existing dataset
#[derive(Deserialize)]
struct DatasetHeader {
    #[serde(rename = "Timestamp")]
    timestamp: DateTime<Utc>,
}

/// Enrich raw records into a dataset stamped with `timestamp`
pub fn build_dataset(
    records: Vec<AuditRecord>,
    tables: &ProtocolNameTables,
    classifier: &dyn AgentClassifier,
    timestamp: DateTime<Utc>,
) -> EnrichedDataset {
    let capabilities = records
        .into_iter()
        .map(|record| {
            let client = classifier.classify(&record.user_agent);
            EnrichedAuditRecordJson::from(&enrich_record(record, tables, client))
        })
        .collect();

    EnrichedDataset { timestamp, capabilities }
}

/// Name an existing dataset is moved to before being replaced
pub fn backup_file_name(timestamp: &DateTime<Utc>) -> String {
    format!("{}-{}", timestamp.format("%Y%m%d"), DATASET_FILE_NAME)
}

/// Move an existing dataset aside
///
/// The backup is named after the date stored in the dataset itself, or the
/// file's modification time when the stored date cannot be read.
fn backup_existing(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    let stamp = match fs::read(path).map(|bytes| serde_json::from_slice::<DatasetHeader>(&bytes)) {
        Ok(Ok(header)) => header.timestamp,
        Ok(Err(e)) => {
            warn!("Existing dataset {} has no readable timestamp: {}", path.display(), e);
            DateTime::<Utc>::from(fs::metadata(path)?.modified()?)
        }
        Err(e) => return Err(e.into()),
    };

    let backup = path.with_file_name(backup_file_name(&stamp));
    fs::rename(path, &backup)?;
    info!("Previous dataset moved to {}", backup.display());
    Ok(Some(backup))
}

/// Write a dataset into `out_dir`, backing up any previous one
///
/// # Returns
///
/// Path of the written dataset
pub fn write_dataset(out_dir: &Path, dataset: &EnrichedDataset) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(DATASET_FILE_NAME);
    backup_existing(&path)?;

    let json = serde_json::to_vec_pretty(dataset)?;
    fs::write(&path, json)?;
    info!(
        "Wrote {} enriched records to {}",
        dataset.capabilities.len(),
        path.display()
    );
    Ok(path)
}
