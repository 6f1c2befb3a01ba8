//! ClientHello observer
//!
//! Hooks the OpenSSL ClientHello callback, turns the offered capabilities
//! into a [`HandshakeFingerprint`] and hands it, keyed by the peer address,
//! to a [`HandshakeSink`]. The callback never influences the handshake
//! outcome.

use foreign_types_shared::ForeignTypeRef;
use log::{debug, warn};
use once_cell::sync::OnceCell;
use openssl::error::ErrorStack;
use openssl::ex_data::Index;
use openssl::ssl::{ClientHelloResponse, Ssl, SslContextBuilder, SslRef, SslVersion};
use std::ffi::c_uint;
use std::sync::Arc;

use super::extensions::{self, ExtensionError};
use crate::common::Result;
use crate::fingerprint::{ClientAddress, HandshakeFingerprint};

/// Receiver of captured handshakes
///
/// Implementations must not block: the sink is called from inside the TLS
/// handshake.
pub trait HandshakeSink: Send + Sync {
    /// Offer a fingerprint; `false` means the event was lost
    fn record_handshake(&self, address: ClientAddress, fingerprint: HandshakeFingerprint) -> bool;
}

/// Per-connection state carried in the `Ssl` ex-data
struct HandshakeContext {
    peer: ClientAddress,
    captured: bool,
}

static CONTEXT_INDEX: OnceCell<Index<Ssl, HandshakeContext>> = OnceCell::new();

fn context_index() -> std::result::Result<Index<Ssl, HandshakeContext>, ErrorStack> {
    CONTEXT_INDEX.get_or_try_init(Ssl::new_ex_index).copied()
}

/// Attach the peer address to a connection before its handshake starts
pub fn bind_peer(ssl: &mut SslRef, peer: ClientAddress) -> Result<()> {
    let index = context_index()?;
    ssl.set_ex_data(index, HandshakeContext { peer, captured: false });
    Ok(())
}

/// Handshake observer shared by every connection of an acceptor
pub struct HandshakeObserver {
    sink: Arc<dyn HandshakeSink>,
    domains: Vec<String>,
}

impl HandshakeObserver {
    /// Create an observer
    ///
    /// # Parameters
    ///
    /// * `sink` - Destination of captured fingerprints
    /// * `domains` - Served host names, only used to flag unexpected SNI values
    pub fn new(sink: Arc<dyn HandshakeSink>, domains: Vec<String>) -> Self {
        Self { sink, domains }
    }

    /// Register the observer as the ClientHello callback of a context
    pub fn install(self: Arc<Self>, builder: &mut SslContextBuilder) {
        builder.set_client_hello_callback(move |ssl, _alert| {
            self.on_client_hello(ssl);
            Ok(ClientHelloResponse::SUCCESS)
        });
    }

    fn on_client_hello(&self, ssl: &mut SslRef) {
        let index = match context_index() {
            Ok(index) => index,
            Err(e) => {
                warn!("ClientHello capture unavailable: {}", e);
                return;
            }
        };

        let peer = match ssl.ex_data_mut(index) {
            Some(context) if !context.captured => {
                context.captured = true;
                context.peer
            }
            // HelloRetryRequest: the second ClientHello belongs to the same capture
            Some(context) => {
                debug!("Ignoring repeated ClientHello from {}", context.peer);
                return;
            }
            None => {
                warn!("ClientHello on a connection without peer address, capture skipped");
                return;
            }
        };

        match read_fingerprint(ssl) {
            Ok(fingerprint) => {
                self.observe(peer, fingerprint);
            }
            Err(e) => warn!("Malformed ClientHello from {}, capture lost: {}", peer, e),
        }
    }

    /// Forward a fingerprint to the sink, `false` when the sink dropped it
    pub fn observe(&self, peer: ClientAddress, fingerprint: HandshakeFingerprint) -> bool {
        if let Some(name) = &fingerprint.server_name {
            if !self.domains.iter().any(|d| d.eq_ignore_ascii_case(name)) {
                debug!("Client {} asked for unlisted server name {}", peer, name);
            }
        }

        debug!(
            "Captured ClientHello from {}: {} cipher suites, {} groups",
            peer,
            fingerprint.cipher_suites.len(),
            fingerprint.supported_curves.len()
        );
        let recorded = self.sink.record_handshake(peer, fingerprint);
        if !recorded {
            warn!("Handshake from {} was not recorded", peer);
        }
        recorded
    }
}

fn client_hello_extension(ssl: &SslRef, ext_type: u16) -> Option<&[u8]> {
    let mut out: *const u8 = std::ptr::null();
    let mut out_len: usize = 0;
    // SAFETY: only called from the ClientHello callback, where OpenSSL keeps
    // the extension buffer alive for at least as long as `ssl` is borrowed.
    unsafe {
        let found = openssl_sys::SSL_client_hello_get0_ext(
            ssl.as_ptr(),
            ext_type as c_uint,
            &mut out,
            &mut out_len,
        );
        if found == 1 && !out.is_null() {
            Some(std::slice::from_raw_parts(out, out_len))
        } else {
            None
        }
    }
}

/// Wire values of the versions OpenSSL reports as the legacy version
const LEGACY_WIRE_VERSIONS: [(SslVersion, u16); 5] = [
    (SslVersion::TLS1_3, 0x0304),
    (SslVersion::TLS1_2, 0x0303),
    (SslVersion::TLS1_1, 0x0302),
    (SslVersion::TLS1, 0x0301),
    (SslVersion::SSL3, 0x0300),
];

/// Legacy `client_version` of the ClientHello, `0` when unknown
fn legacy_version(ssl: &SslRef) -> u16 {
    let reported = ssl.client_hello_legacy_version();
    LEGACY_WIRE_VERSIONS
        .iter()
        .find(|(version, _)| reported == Some(*version))
        .map(|(_, wire)| *wire)
        .unwrap_or(0)
}

fn read_fingerprint(ssl: &SslRef) -> std::result::Result<HandshakeFingerprint, ExtensionError> {
    let cipher_suites = match ssl.client_hello_ciphers() {
        Some(raw) => extensions::parse_cipher_list(raw)?,
        None => Vec::new(),
    };

    let supported_versions = match client_hello_extension(ssl, extensions::EXT_SUPPORTED_VERSIONS) {
        Some(body) => extensions::parse_supported_versions(body)?,
        None => extensions::versions_from_legacy(legacy_version(ssl)),
    };

    let server_name = match client_hello_extension(ssl, extensions::EXT_SERVER_NAME) {
        Some(body) => extensions::parse_server_name(body)?,
        None => None,
    };

    let supported_curves = client_hello_extension(ssl, extensions::EXT_SUPPORTED_GROUPS)
        .map(extensions::parse_supported_groups)
        .transpose()?
        .unwrap_or_default();

    let supported_points = client_hello_extension(ssl, extensions::EXT_EC_POINT_FORMATS)
        .map(extensions::parse_ec_point_formats)
        .transpose()?
        .unwrap_or_default();

    let signature_schemes = client_hello_extension(ssl, extensions::EXT_SIGNATURE_ALGORITHMS)
        .map(extensions::parse_signature_algorithms)
        .transpose()?
        .unwrap_or_default();

    let supported_protos = client_hello_extension(ssl, extensions::EXT_ALPN)
        .map(extensions::parse_alpn)
        .transpose()?
        .unwrap_or_default();

    Ok(HandshakeFingerprint {
        supported_versions,
        cipher_suites,
        supported_curves,
        supported_points,
        signature_schemes,
        server_name,
        supported_protos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(ClientAddress, HandshakeFingerprint)>>,
    }

    impl HandshakeSink for RecordingSink {
        fn record_handshake(&self, address: ClientAddress, fingerprint: HandshakeFingerprint) -> bool {
            self.events.lock().unwrap().push((address, fingerprint));
            true
        }
    }

    /// Sink whose buffer is always full
    struct FullSink;

    impl HandshakeSink for FullSink {
        fn record_handshake(&self, _address: ClientAddress, _fingerprint: HandshakeFingerprint) -> bool {
            false
        }
    }

    #[test]
    fn test_observe_forwards_to_sink() {
        let sink = Arc::new(RecordingSink::default());
        let observer = HandshakeObserver::new(sink.clone(), vec!["localhost".to_string()]);

        let peer: ClientAddress = "203.0.113.5:51000".parse().unwrap();
        let fingerprint = HandshakeFingerprint {
            cipher_suites: vec![0x1301],
            server_name: Some("elsewhere.example".to_string()),
            ..Default::default()
        };
        assert!(observer.observe(peer, fingerprint.clone()));

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], (peer, fingerprint));
    }

    #[test]
    fn test_observe_reports_lost_event() {
        let observer = HandshakeObserver::new(Arc::new(FullSink), vec!["localhost".to_string()]);
        let peer: ClientAddress = "203.0.113.6:51000".parse().unwrap();
        assert!(!observer.observe(peer, HandshakeFingerprint::default()));
    }

    #[test]
    fn test_legacy_wire_versions() {
        let wire: Vec<u16> = LEGACY_WIRE_VERSIONS.iter().map(|(_, wire)| *wire).collect();
        assert_eq!(wire, vec![0x0304, 0x0303, 0x0302, 0x0301, 0x0300]);
    }

    #[test]
    fn test_bind_peer() {
        let ctx = openssl::ssl::SslContext::builder(openssl::ssl::SslMethod::tls())
            .unwrap()
            .build();
        let mut ssl = Ssl::new(&ctx).unwrap();
        let peer: ClientAddress = "127.0.0.1:40000".parse().unwrap();
        bind_peer(&mut ssl, peer).unwrap();

        let index = context_index().unwrap();
        let context = ssl.ex_data(index).unwrap();
        assert_eq!(context.peer, peer);
        assert!(!context.captured);
    }
}
