//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use log::warn;
use std::path::Path;

use super::defaults::RESULTS_LIMIT;
use super::error::{ConfigError, Result};
use super::types::{check_file_exists, ServerConfig};

/// Validate the configuration
pub fn validate_config(config: &ServerConfig) -> Result<()> {
    validate_network_settings(config)?;
    validate_certificate_settings(config)?;
    validate_general_settings(config)?;
    Ok(())
}

/// Validate network settings
fn validate_network_settings(config: &ServerConfig) -> Result<()> {
    if config.port == 0 {
        return Err(ConfigError::InvalidValue(
            "port".to_string(),
            "Port must be greater than 0".to_string(),
        ));
    }

    if config.capture_listener && config.port <= 1 {
        return Err(ConfigError::InvalidCombination(
            "capture_listener needs a port above 1 to bind port - 1".to_string(),
        ));
    }

    if config.domains().is_empty() {
        return Err(ConfigError::MissingRequiredValue("domain".to_string()));
    }

    Ok(())
}

/// Validate certificate settings
fn validate_certificate_settings(config: &ServerConfig) -> Result<()> {
    match (&config.cert, &config.key) {
        (Some(cert), Some(key)) => {
            validate_file_exists(cert)?;
            validate_file_exists(key)?;
        }
        (None, None) => {}
        _ => {
            return Err(ConfigError::InvalidCombination(
                "cert and key must be given together".to_string(),
            ));
        }
    }
    Ok(())
}

/// Validate general settings
fn validate_general_settings(config: &ServerConfig) -> Result<()> {
    match config.log_level.as_str() {
        "error" | "warn" | "info" | "debug" | "trace" => {}
        level => {
            warn!("Invalid log level: {}. Using default: info", level);
        }
    }

    if config.event_buffer == 0 {
        return Err(ConfigError::InvalidValue(
            "event_buffer".to_string(),
            "Event buffer must be greater than 0".to_string(),
        ));
    }

    if config.results_limit > RESULTS_LIMIT {
        warn!(
            "results_limit {} exceeds the maximum, {} will be used",
            config.results_limit, RESULTS_LIMIT
        );
    }

    Ok(())
}

/// Validate that a file exists
fn validate_file_exists(path: &Path) -> Result<()> {
    if !check_file_exists(path) {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_port() {
        let config = ServerConfig { port: 0, ..Default::default() };
        assert!(matches!(validate_config(&config), Err(ConfigError::InvalidValue(..))));
    }

    #[test]
    fn test_capture_listener_needs_room() {
        let config = ServerConfig { port: 1, capture_listener: true, ..Default::default() };
        assert!(matches!(validate_config(&config), Err(ConfigError::InvalidCombination(_))));
    }

    #[test]
    fn test_cert_without_key() {
        let config = ServerConfig { cert: Some("server.crt".into()), ..Default::default() };
        assert!(matches!(validate_config(&config), Err(ConfigError::InvalidCombination(_))));
    }

    #[test]
    fn test_missing_cert_files() {
        let config = ServerConfig {
            cert: Some("missing.crt".into()),
            key: Some("missing.key".into()),
            ..Default::default()
        };
        assert!(matches!(validate_config(&config), Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_empty_domain() {
        let config = ServerConfig { domain: " , ".to_string(), ..Default::default() };
        assert!(matches!(validate_config(&config), Err(ConfigError::MissingRequiredValue(_))));
    }

    #[test]
    fn test_zero_event_buffer() {
        let config = ServerConfig { event_buffer: 0, ..Default::default() };
        assert!(validate_config(&config).is_err());
    }
}
