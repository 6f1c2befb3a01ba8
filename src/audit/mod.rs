//! Audit records: codec, persisted log, service and dataset export

pub mod codec;
pub mod dataset;
pub mod log;
pub mod service;

pub use codec::{
    decode_enriched, decode_record, encode_enriched, encode_record, DecodeError, EnrichedAuditRecordJson, RecordStream,
};
pub use dataset::{build_dataset, write_dataset, EnrichedDataset, DATASET_FILE_NAME};
pub use log::{AuditLog, LOG_FILE_NAME, MAX_RESULTS};
pub use service::AuditService;
