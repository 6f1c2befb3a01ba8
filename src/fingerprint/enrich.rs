//! Fingerprint enrichment
//!
//! Decorates each numeric list of a fingerprint with a parallel list of
//! canonical names. Identifiers missing from the tables are rendered as
//! fixed-width lowercase hex, so enrichment never fails and never drops a
//! value.

use super::tables::ProtocolNameTables;
use super::types::{AuditRecord, CapabilityNames, ClientDescription, EnrichedAuditRecord, HandshakeFingerprint};

/// Render a 16-bit identifier as `0xNNNN`
pub fn hex16(value: u16) -> String {
    format!("0x{:04x}", value)
}

/// Render an 8-bit identifier as `0xNN`
pub fn hex8(value: u8) -> String {
    format!("0x{:02x}", value)
}

fn names_for(ids: &[u16], lookup: impl Fn(u16) -> Option<&'static str>) -> Vec<String> {
    ids.iter()
        .map(|id| match lookup(*id) {
            Some(name) => name.to_string(),
            None => hex16(*id),
        })
        .collect()
}

/// Compute the name lists for a fingerprint
///
/// # Parameters
///
/// * `fingerprint` - The captured handshake
/// * `tables` - Reference tables to resolve identifiers against
///
/// # Returns
///
/// Name lists with exactly the length and order of the numeric lists
pub fn enrich(fingerprint: &HandshakeFingerprint, tables: &ProtocolNameTables) -> CapabilityNames {
    CapabilityNames {
        cipher_suites: names_for(&fingerprint.cipher_suites, |id| tables.cipher_suite(id)),
        supported_curves: names_for(&fingerprint.supported_curves, |id| tables.group(id)),
        signature_schemes: names_for(&fingerprint.signature_schemes, |id| tables.signature_scheme(id)),
        supported_versions: names_for(&fingerprint.supported_versions, |id| tables.version(id)),
    }
}

/// Enrich a full record, attaching an optional client description
pub fn enrich_record(
    record: AuditRecord,
    tables: &ProtocolNameTables,
    client: Option<ClientDescription>,
) -> EnrichedAuditRecord {
    let names = enrich(&record.fingerprint, tables);
    EnrichedAuditRecord {
        user_agent: record.user_agent,
        fingerprint: record.fingerprint,
        names,
        client,
    }
}
