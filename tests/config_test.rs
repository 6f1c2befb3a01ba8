//! Test for configuration priority order
//!
//! Command line overrides > Environment variables > Configuration file > Default values

use browser_tls_audit::config::{load_config, ConfigBuilder, ConfigError, ConfigOverrides, ServerConfig, ENV_PREFIX};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

const ENV_KEYS: &[&str] = &["PORT", "DOMAIN", "DATA_DIR", "STORE_TTL_SECS", "CAPTURE_LISTENER"];

fn clear_env() {
    for key in ENV_KEYS {
        env::remove_var(format!("{}{}", ENV_PREFIX, key));
    }
}

#[test]
#[serial]
fn test_defaults_without_sources() {
    clear_env();
    let config = load_config(None, ConfigOverrides::default()).unwrap();
    assert_eq!(config.port, 443);
    assert_eq!(config.domain, "localhost");
    assert_eq!(config.results_limit, 5000);
    assert!(!config.capture_listener);
}

#[test]
#[serial]
fn test_config_priority() {
    clear_env();
    let dir = tempdir().unwrap();
    let config_file = dir.path().join("audit.json");
    fs::write(
        &config_file,
        r#"{
            "domain": "file.example",
            "port": 8000,
            "data_dir": "/var/lib/file-data",
            "store_ttl_secs": 60
        }"#,
    )
    .unwrap();

    env::set_var(format!("{}PORT", ENV_PREFIX), "9000");
    env::set_var(format!("{}DOMAIN", ENV_PREFIX), "env.example");

    let overrides = ConfigOverrides {
        domain: Some("cli.example".to_string()),
        ..Default::default()
    };
    let config = load_config(Some(&config_file), overrides).unwrap();
    clear_env();

    // CLI beats env
    assert_eq!(config.domain, "cli.example");
    // Env beats file
    assert_eq!(config.port, 9000);
    // File beats defaults
    assert_eq!(config.data_dir, PathBuf::from("/var/lib/file-data"));
    assert_eq!(config.store_ttl_secs, 60);
    // Untouched values keep their defaults
    assert_eq!(config.event_buffer, ServerConfig::default().event_buffer);
}

#[test]
#[serial]
fn test_env_only() {
    clear_env();
    env::set_var(format!("{}CAPTURE_LISTENER", ENV_PREFIX), "true");
    env::set_var(format!("{}PORT", ENV_PREFIX), "8443");

    let config = ConfigBuilder::default().build().unwrap();
    clear_env();

    assert!(config.capture_listener);
    assert_eq!(config.capture_addr().map(|a| a.port()), Some(8442));
}

#[test]
#[serial]
fn test_missing_config_file() {
    clear_env();
    let dir = tempdir().unwrap();
    let result = load_config(Some(&dir.path().join("absent.json")), ConfigOverrides::default());
    assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
}

#[test]
#[serial]
fn test_malformed_config_file() {
    clear_env();
    let dir = tempdir().unwrap();
    let config_file = dir.path().join("broken.json");
    fs::write(&config_file, "{ not json").unwrap();

    assert!(load_config(Some(&config_file), ConfigOverrides::default()).is_err());
}

#[test]
#[serial]
fn test_invalid_values_rejected() {
    clear_env();
    let overrides = ConfigOverrides {
        port: Some(0),
        ..Default::default()
    };
    assert!(matches!(
        load_config(None, overrides),
        Err(ConfigError::InvalidValue(..))
    ));

    let overrides = ConfigOverrides {
        cert: Some(PathBuf::from("only-cert.pem")),
        ..Default::default()
    };
    assert!(matches!(
        load_config(None, overrides),
        Err(ConfigError::InvalidCombination(_))
    ));
}
