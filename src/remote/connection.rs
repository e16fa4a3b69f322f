//! Immutable connection value passed to every remote call.

use super::{BatchHeader, RemoteError};
use crate::config::{ConnectionConfig, Deployment};
use std::time::Duration;

const CLOUD_API_PATH: &str = "/cvad/manage";
const ON_PREMISES_API_PATH: &str = "/orchestration/api";

/// Connection settings with every derived value computed once.
///
/// The base URL rewrite for on-premises targets and the fixed header set
/// are resolved at construction; nothing mutates this value afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    base_url: String,
    deployment: Deployment,
    headers: Vec<BatchHeader>,
    timeout: Duration,
}

impl ResolvedConnection {
    pub fn new(config: &ConnectionConfig, token: &str) -> Result<Self, RemoteError> {
        let endpoint = config.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(RemoteError::Configuration(
                "connection.endpoint cannot be empty".to_string(),
            ));
        }
        if token.is_empty() {
            return Err(RemoteError::Configuration(
                "session token is empty".to_string(),
            ));
        }

        let api_path = match config.deployment {
            Deployment::Cloud => CLOUD_API_PATH,
            Deployment::OnPremises => ON_PREMISES_API_PATH,
        };

        let mut headers = vec![BatchHeader::new("Authorization", format!("Bearer {}", token))];
        if let Some(customer_id) = &config.customer_id {
            headers.push(BatchHeader::new("Customer-Id", customer_id.clone()));
        }
        if let Some(site_id) = &config.site_id {
            headers.push(BatchHeader::new("Site-Id", site_id.clone()));
        }

        Ok(Self {
            base_url: format!("{}{}", endpoint, api_path),
            deployment: config.deployment,
            headers,
            timeout: Duration::from_secs(config.timeout_seconds.max(1)),
        })
    }

    /// Resolve using the token found in the configured environment variable.
    pub fn from_env(config: &ConnectionConfig) -> Result<Self, RemoteError> {
        let token = std::env::var(&config.token_env).map_err(|e| {
            RemoteError::Configuration(format!(
                "Failed to read session token from env var '{}': {}",
                config.token_env, e
            ))
        })?;
        Self::new(config, &token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, relative: &str) -> String {
        format!("{}{}", self.base_url, relative)
    }

    pub fn deployment(&self) -> Deployment {
        self.deployment
    }

    pub fn headers(&self) -> &[BatchHeader] {
        &self.headers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
