//! Configuration types
//!
//! This module contains the server configuration used throughout the application.

use log::debug;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use super::defaults;
use crate::common::{capture_port, listen_addr};
use crate::correlation::StoreLimits;
use crate::tls::CertificateSource;

/// Check if a file exists
pub fn check_file_exists(path: &Path) -> bool {
    path.exists() && path.is_file()
}

/// Server configuration
///
/// Every field has a default, so a partial configuration file or a handful
/// of environment variables is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Comma separated host names the server answers for
    pub domain: String,

    /// HTTPS port
    pub port: u16,

    /// Bind address
    pub bind: IpAddr,

    /// Certificate chain (PEM)
    pub cert: Option<PathBuf>,

    /// Private key (PEM)
    pub key: Option<PathBuf>,

    /// Directory holding the persisted audit log
    pub data_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Also run the capture-only listener on `port - 1`
    pub capture_listener: bool,

    /// Correlation channel capacity
    pub event_buffer: usize,

    /// Lifetime of an uncorrelated fingerprint, `0` keeps them forever
    pub store_ttl_secs: u64,

    /// Maximum number of stored fingerprints, `0` for no limit
    pub store_capacity: usize,

    /// Maximum records returned by `/browserTLSResults`
    pub results_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            domain: defaults::domain(),
            port: defaults::PORT,
            bind: defaults::bind(),
            cert: None,
            key: None,
            data_dir: defaults::data_dir(),
            log_level: defaults::log_level(),
            capture_listener: false,
            event_buffer: defaults::EVENT_BUFFER,
            store_ttl_secs: defaults::STORE_TTL_SECS,
            store_capacity: defaults::STORE_CAPACITY,
            results_limit: defaults::RESULTS_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Served host names, trimmed, empty entries dropped
    pub fn domains(&self) -> Vec<String> {
        self.domain
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Address of the HTTPS listener
    pub fn listen_addr(&self) -> SocketAddr {
        listen_addr(self.bind, self.port)
    }

    /// Address of the capture-only listener, when enabled
    pub fn capture_addr(&self) -> Option<SocketAddr> {
        if !self.capture_listener {
            return None;
        }
        capture_port(self.port).map(|port| listen_addr(self.bind, port))
    }

    /// Certificate source implied by `cert`/`key`
    ///
    /// Both paths given selects the static certificate; otherwise a
    /// self-signed certificate is generated for the domain list.
    pub fn certificate_source(&self) -> CertificateSource {
        match (&self.cert, &self.key) {
            (Some(cert), Some(key)) => CertificateSource::Static {
                cert: cert.clone(),
                key: key.clone(),
            },
            _ => CertificateSource::SelfSigned { domains: self.domains() },
        }
    }

    /// Correlation store bounds
    pub fn store_limits(&self) -> StoreLimits {
        StoreLimits::from_config(self.store_ttl_secs, self.store_capacity)
    }

    /// Log the configuration at debug level
    pub fn log(&self) {
        debug!("  domain: {}", self.domain);
        debug!("  listen: {}", self.listen_addr());
        debug!("  capture listener: {:?}", self.capture_addr());
        debug!("  cert: {:?}, key: {:?}", self.cert, self.key);
        debug!("  data_dir: {}", self.data_dir.display());
        debug!("  log_level: {}", self.log_level);
        debug!(
            "  event_buffer: {}, store_ttl_secs: {}, store_capacity: {}, results_limit: {}",
            self.event_buffer, self.store_ttl_secs, self.store_capacity, self.results_limit
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domains_split() {
        let config = ServerConfig {
            domain: " a.example , b.example,, ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.domains(), vec!["a.example", "b.example"]);
    }

    #[test]
    fn test_capture_addr() {
        let mut config = ServerConfig { port: 8443, ..Default::default() };
        assert_eq!(config.capture_addr(), None);

        config.capture_listener = true;
        assert_eq!(config.capture_addr().map(|a| a.port()), Some(8442));
    }

    #[test]
    fn test_certificate_source() {
        let mut config = ServerConfig::default();
        assert_eq!(
            config.certificate_source(),
            CertificateSource::SelfSigned { domains: vec!["localhost".to_string()] }
        );

        config.cert = Some("server.crt".into());
        assert!(matches!(config.certificate_source(), CertificateSource::SelfSigned { .. }));

        config.key = Some("server.key".into());
        assert_eq!(
            config.certificate_source(),
            CertificateSource::Static { cert: "server.crt".into(), key: "server.key".into() }
        );
    }

    #[test]
    fn test_partial_json() {
        let config: ServerConfig = serde_json::from_str(r#"{"port": 8443, "domain": "x.example"}"#).unwrap();
        assert_eq!(config.port, 8443);
        assert_eq!(config.domain, "x.example");
        assert_eq!(config.event_buffer, defaults::EVENT_BUFFER);
    }
}
