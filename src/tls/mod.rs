//! TLS handling module
//!
//! This module builds the TLS acceptor, loads or generates the server
//! certificate and captures ClientHello fingerprints.

mod acceptor;
mod cert;
pub mod extensions;
pub mod observer;

pub use acceptor::create_tls_acceptor;
pub use cert::{generate_self_signed, CertificateSource};
pub use observer::{bind_peer, HandshakeObserver, HandshakeSink};
