//! Correlation engine messages

use tokio::sync::oneshot;

use crate::fingerprint::{AuditRecord, ClientAddress, HandshakeFingerprint};

/// The closed set of events the correlation engine consumes
#[derive(Debug)]
pub enum CorrelationMessage {
    /// A ClientHello was captured for a connection
    RecordHandshake {
        address: ClientAddress,
        fingerprint: HandshakeFingerprint,
    },

    /// An audit request arrived on a connection
    RequestAudit {
        address: ClientAddress,
        user_agent: String,
        /// Response channel
        response: oneshot::Sender<Option<AuditRecord>>,
    },

    /// Drop expired entries
    Prune,

    /// Stop the engine
    Shutdown,
}
