//! Handshake fingerprints and their enrichment
//!
//! This module holds the captured data model, the reference name tables and
//! the pure enrichment function.

pub mod enrich;
pub mod tables;
pub mod types;

pub use enrich::{enrich, enrich_record, hex16, hex8};
pub use tables::ProtocolNameTables;
pub use types::{
    AuditRecord, CapabilityNames, ClientAddress, ClientDescription, EnrichedAuditRecord,
    HandshakeFingerprint,
};
