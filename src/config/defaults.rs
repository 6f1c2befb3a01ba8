//! Default configuration values
//!
//! Single source of truth for defaults.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "BROWSER_TLS_AUDIT_";

/// Default served domain list
pub const DOMAIN_STR: &str = "localhost";

/// Default HTTPS port
pub const PORT: u16 = 443;

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Name of the data directory under the home directory
pub const DATA_DIR_NAME: &str = "browserdata";

/// Default correlation channel capacity
pub const EVENT_BUFFER: usize = crate::correlation::DEFAULT_EVENT_BUFFER;

/// Default correlation entry lifetime in seconds
pub const STORE_TTL_SECS: u64 = 3600;

/// Default maximum number of stored fingerprints
pub const STORE_CAPACITY: usize = 100_000;

/// Default and maximum `/browserTLSResults` size
pub const RESULTS_LIMIT: usize = 5000;

/// Default served domain list
pub fn domain() -> String {
    DOMAIN_STR.to_string()
}

/// Default bind address
pub fn bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

/// Default data directory: `$HOME/browserdata`, or `./browserdata` without a home
pub fn data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(DATA_DIR_NAME),
        _ => PathBuf::from(DATA_DIR_NAME),
    }
}

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}
