//! Configuration module for policyset
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`POLICYSET_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use policyset::config::SyncConfig;
//!
//! let toml = r#"
//! [connection]
//! endpoint = "https://api.example.com"
//!
//! [policy_set]
//! name = "Standard"
//! "#;
//! let config: SyncConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.policy_set.name, "Standard");
//! assert_eq!(config.connection.timeout_seconds, 30);
//! ```

pub mod connection;
pub mod error;
pub mod logging;
pub mod policy_set;
pub mod reconcile;

pub use connection::{ConnectionConfig, Deployment};
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use policy_set::{
    AccessControlFilterConfig, BranchRepeaterFilterConfig, ObjectFilterConfig, PolicyConfig,
    PolicySetConfig, SettingConfig, ValueFilterConfig,
};
pub use reconcile::{FilterStrategy, ReconcileConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration: where to connect, how to log and reconcile, and
/// the declared policy set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    /// Remote service connection
    pub connection: ConnectionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Reconciliation behaviour
    pub reconcile: ReconcileConfig,
    /// Desired policy set
    pub policy_set: PolicySetConfig,
}

impl SyncConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                Ok(toml::from_str(&content)?)
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supports POLICYSET_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("POLICYSET_ENDPOINT") {
            self.connection.endpoint = endpoint;
        }
        if let Ok(deployment) = std::env::var("POLICYSET_DEPLOYMENT") {
            if let Ok(d) = deployment.parse() {
                self.connection.deployment = d;
            }
        }

        if let Ok(level) = std::env::var("POLICYSET_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("POLICYSET_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(strategy) = std::env::var("POLICYSET_FILTER_STRATEGY") {
            if let Ok(s) = strategy.parse() {
                self.reconcile.filter_strategy = s;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "connection.endpoint".to_string(),
                message: "endpoint cannot be empty".to_string(),
            });
        }
        if !self.connection.endpoint.starts_with("http://")
            && !self.connection.endpoint.starts_with("https://")
        {
            return Err(ConfigError::Validation {
                field: "connection.endpoint".to_string(),
                message: "endpoint must start with http:// or https://".to_string(),
            });
        }
        if self.connection.token_env.is_empty() {
            return Err(ConfigError::MissingField("connection.token_env".to_string()));
        }
        self.logging.validate()?;
        if crate::remote::ServiceVersion::parse(&self.reconcile.min_on_premises_version).is_none()
        {
            return Err(ConfigError::Validation {
                field: "reconcile.min_on_premises_version".to_string(),
                message: "expected a dotted version such as 7.41".to_string(),
            });
        }

        // Structural checks on the declared state
        self.policy_set.to_desired()?;

        Ok(())
    }
}
