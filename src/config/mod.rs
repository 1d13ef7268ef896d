//! Configuration management for jsonpbox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. `.env` file in the working directory, if present
//! 4. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use jsonpbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Callbacks live under: {}", config.host.callback_namespace);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `JSONPBOX__<section>__<key>`
//!
//! Examples:
//! - `JSONPBOX__HOST__CALLBACK_NAMESPACE=app.jsonp`
//! - `JSONPBOX__FETCH__TIMEOUT_MS=5000`
//! - `JSONPBOX__SERVER__BIND_ADDR=0.0.0.0:9000`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/jsonpbox.toml`.
//! This can be overridden using the `JSONPBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, FetchConfig, HostConfig, ResponseConfig, ServerConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[fetch]\ntimeout_ms = 100\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.fetch.timeout_ms, 100);
        assert_eq!(config.response.status, 200);
    }

    #[test]
    fn test_validation_catches_bad_namespace() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[host]
callback_namespace = "not a namespace"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::InvalidCallbackNamespace { .. })
        ));
    }

    #[test]
    fn test_malformed_file_is_load_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[response]\nstatus = \"many\"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(result.unwrap_err(), ConfigError::LoadError(_)));
    }
}
