//! Fingerprint data types

use std::net::SocketAddr;

/// Network identity of the TCP connection a handshake arrived on
pub type ClientAddress = SocketAddr;

/// Snapshot of everything a client offered in its ClientHello
///
/// Captured once per connection and never mutated afterwards. All lists keep
/// the order the client sent them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeFingerprint {
    /// Offered protocol versions
    pub supported_versions: Vec<u16>,
    /// Cipher suites in client preference order
    pub cipher_suites: Vec<u16>,
    /// Supported groups (named curves)
    pub supported_curves: Vec<u16>,
    /// Elliptic-curve point formats
    pub supported_points: Vec<u8>,
    /// Signature schemes
    pub signature_schemes: Vec<u16>,
    /// Requested server name (SNI)
    pub server_name: Option<String>,
    /// ALPN protocol names
    pub supported_protos: Vec<String>,
}

/// A fingerprint paired with the user-agent seen on the same connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub user_agent: String,
    pub fingerprint: HandshakeFingerprint,
}

/// Canonical names parallel to each numeric field of a fingerprint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityNames {
    pub cipher_suites: Vec<String>,
    pub supported_curves: Vec<String>,
    pub signature_schemes: Vec<String>,
    pub supported_versions: Vec<String>,
}

/// Browser, version and operating system guessed from a user-agent string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientDescription {
    pub browser: String,
    pub browser_version: String,
    pub os: String,
}

/// The externally served and reported shape of an audit record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedAuditRecord {
    pub user_agent: String,
    pub fingerprint: HandshakeFingerprint,
    pub names: CapabilityNames,
    pub client: Option<ClientDescription>,
}

impl EnrichedAuditRecord {
    /// Drop the enrichment, keeping the raw pairing
    pub fn to_audit_record(&self) -> AuditRecord {
        AuditRecord {
            user_agent: self.user_agent.clone(),
            fingerprint: self.fingerprint.clone(),
        }
    }
}
