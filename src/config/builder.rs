//! Configuration builder
//!
//! Layers configuration sources, lowest priority first:
//! 1. Default values (serde defaults on [`ServerConfig`])
//! 2. JSON configuration file
//! 3. Environment variables
//! 4. Command line overrides

use config::{Config, Environment, File, FileFormat};
use log::debug;
use std::path::{Path, PathBuf};

use super::defaults::ENV_PREFIX;
use super::error::{ConfigError, Result};
use super::types::ServerConfig;
use super::validator::validate_config;

/// Values given on the command line; `None` leaves lower layers untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub domain: Option<String>,
    pub port: Option<u16>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub capture_listener: Option<bool>,
}

impl ConfigOverrides {
    /// Write the given values over a configuration
    pub fn apply(self, config: &mut ServerConfig) {
        if let Some(domain) = self.domain {
            config.domain = domain;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(cert) = self.cert {
            config.cert = Some(cert);
        }
        if let Some(key) = self.key {
            config.key = Some(key);
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        if let Some(capture_listener) = self.capture_listener {
            config.capture_listener = capture_listener;
        }
    }
}

/// Configuration builder
///
/// Provides a fluent API for building configuration from multiple sources.
pub struct ConfigBuilder {
    file: Option<PathBuf>,
    env_prefix: Option<String>,
    overrides: ConfigOverrides,
    validate: bool,
}

impl ConfigBuilder {
    /// Create a builder with no sources beyond the defaults
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: None,
            overrides: ConfigOverrides::default(),
            validate: true,
        }
    }

    /// Add a JSON file source; the file must exist
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        debug!("Adding file configuration source: {}", path.display());
        self.file = Some(path.to_path_buf());
        self
    }

    /// Add environment source
    pub fn with_env(mut self, prefix: &str) -> Self {
        debug!("Adding environment configuration source with prefix: {}", prefix);
        self.env_prefix = Some(prefix.to_string());
        self
    }

    /// Add command line overrides
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        debug!("Adding command line configuration source");
        self.overrides = overrides;
        self
    }

    /// Disable validation
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ServerConfig> {
        let mut builder = Config::builder();

        if let Some(path) = &self.file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Json).required(true));
        }

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix.trim_end_matches('_')).try_parsing(true),
            );
        }

        let layered = builder.build().map_err(|e| match &self.file {
            Some(path) => ConfigError::FileReadError(path.clone(), e.to_string()),
            None => ConfigError::from(e),
        })?;
        let mut config: ServerConfig = layered.try_deserialize()?;

        self.overrides.apply(&mut config);

        if self.validate {
            debug!("Validating configuration");
            validate_config(&config)?;
        }

        debug!("Final configuration:");
        config.log();

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new().with_env(ENV_PREFIX)
    }
}

/// Load configuration from every source
///
/// # Parameters
///
/// * `config_file` - Optional JSON configuration file
/// * `overrides` - Command line values
pub fn load_config(config_file: Option<&Path>, overrides: ConfigOverrides) -> Result<ServerConfig> {
    let mut builder = ConfigBuilder::default();
    if let Some(path) = config_file {
        builder = builder.with_file(path);
    }
    builder.with_overrides(overrides).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_only() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigBuilder::new().with_file("does-not-exist.json").build();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = ConfigOverrides {
            port: Some(8443),
            capture_listener: Some(true),
            ..Default::default()
        };
        let config = ConfigBuilder::new().with_overrides(overrides).build().unwrap();
        assert_eq!(config.port, 8443);
        assert!(config.capture_listener);
        assert_eq!(config.domain, "localhost");
    }
}
