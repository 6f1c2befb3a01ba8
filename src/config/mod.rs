//! Configuration module
//!
//! This module handles application configuration, including loading from
//! different sources (files, environment variables, command line arguments)
//! and validating the configuration.

pub mod builder;
pub mod defaults;
pub mod error;
pub mod types;
pub mod validator;

pub use builder::{load_config, ConfigBuilder, ConfigOverrides};
pub use defaults::ENV_PREFIX;
pub use error::ConfigError;
pub use types::ServerConfig;
pub use validator::validate_config;
