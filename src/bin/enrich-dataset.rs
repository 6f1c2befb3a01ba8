//! Export the persisted audit log as an enriched dataset

use chrono::Utc;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use browser_tls_audit::agent::UserAgentClassifier;
use browser_tls_audit::audit::{build_dataset, write_dataset, AuditLog, MAX_RESULTS};
use browser_tls_audit::common::{init_logger, Result};
use browser_tls_audit::config::defaults;
use browser_tls_audit::fingerprint::ProtocolNameTables;

/// Enrich the recorded ClientHello capabilities into a timestamped dataset
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the audit log
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// Output directory for the dataset
    #[clap(long, default_value = "data")]
    out_dir: PathBuf,

    /// Log level
    #[clap(long, default_value = defaults::LOG_LEVEL_STR)]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level);

    let data_dir = args.data_dir.unwrap_or_else(defaults::data_dir);
    let log = AuditLog::open(&data_dir)?;
    let records = log.read_records(MAX_RESULTS)?;
    info!("Read {} records from {}", records.len(), log.path().display());

    let dataset = build_dataset(
        records,
        ProtocolNameTables::standard(),
        &UserAgentClassifier,
        Utc::now(),
    );
    let path = write_dataset(&args.out_dir, &dataset)?;
    println!("{}", path.display());

    Ok(())
}
