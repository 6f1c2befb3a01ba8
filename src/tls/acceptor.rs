//! TLS acceptor creation with handshake capture

use log::info;
use openssl::ssl::{AlpnError, SslAcceptor, SslMethod};
use std::sync::Arc;

use super::cert::CertificateSource;
use super::observer::HandshakeObserver;
use crate::common::Result;

/// ALPN wire form of the only protocol the server speaks
const HTTP_1_1: &[u8] = b"\x08http/1.1";

/// Create a TLS acceptor with the handshake observer installed
///
/// The acceptor offers HTTP/1.1 only; whatever the client lists in its ALPN
/// extension is still captured by the observer.
///
/// # Parameters
///
/// * `source` - Where the server certificate comes from
/// * `observer` - ClientHello hook, or `None` for a plain acceptor
///
/// # Returns
///
/// The configured `SslAcceptor`
pub fn create_tls_acceptor(
    source: &CertificateSource,
    observer: Option<Arc<HandshakeObserver>>,
) -> Result<SslAcceptor> {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls())?;

    source.apply(&mut acceptor)?;

    acceptor.set_alpn_select_callback(|_ssl, client_protos| {
        openssl::ssl::select_next_proto(HTTP_1_1, client_protos).ok_or(AlpnError::NOACK)
    });

    match observer {
        Some(observer) => {
            observer.install(&mut acceptor);
            info!("ClientHello capture enabled");
        }
        None => info!("ClientHello capture disabled for this acceptor"),
    }

    Ok(acceptor.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_acceptor_self_signed() {
        let source = CertificateSource::SelfSigned { domains: vec!["localhost".to_string()] };
        assert!(create_tls_acceptor(&source, None).is_ok());
    }
}
