//! Browser TLS Audit: ClientHello capabilities correlated with User-Agent
//!
//! This library implements an HTTPS service that records what a browser
//! offers in its TLS ClientHello (protocol versions, cipher suites, groups,
//! point formats, signature schemes, SNI, ALPN) and pairs it with the
//! `User-Agent` of the HTTP request sent over the same connection.
//!
//! # Main Features
//!
//! - ClientHello capture through an OpenSSL handshake hook
//! - Correlation by client address through a single-owner engine task
//! - Human-readable names for every numeric identifier
//! - Append-only JSON log and an offline dataset exporter
//!
//! # Example
//!
//! ```no_run
//! use browser_tls_audit::agent::UserAgentClassifier;
//! use browser_tls_audit::audit::{AuditLog, AuditService};
//! use browser_tls_audit::correlation::{CorrelationEngine, StoreLimits};
//! use browser_tls_audit::server::{create_router, AuditServer};
//! use browser_tls_audit::tls::{create_tls_acceptor, CertificateSource, HandshakeObserver};
//! use browser_tls_audit::Result;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let engine = CorrelationEngine::new(1024, StoreLimits::default());
//!     let observer = Arc::new(HandshakeObserver::new(Arc::new(engine.clone()), vec!["localhost".into()]));
//!
//!     let source = CertificateSource::SelfSigned { domains: vec!["localhost".into()] };
//!     let tls_acceptor = create_tls_acceptor(&source, Some(observer))?;
//!
//!     let log = Arc::new(AuditLog::open("browserdata")?);
//!     let service = AuditService::new(engine, log, Arc::new(UserAgentClassifier));
//!
//!     let server = AuditServer::bind("0.0.0.0:8443".parse().unwrap(), tls_acceptor, create_router(service)).await?;
//!     server.run().await
//! }
//! ```

// Public modules
pub mod agent;
pub mod audit;
pub mod common;
pub mod config;
pub mod correlation;
pub mod fingerprint;
pub mod server;
pub mod tls;

// Re-export commonly used structures and functions for convenience
pub use common::{AuditError, Result};
pub use server::AuditServer;
pub use tls::create_tls_acceptor;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
