//! Remote service connection configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Where the orchestration service runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Deployment {
    /// Hosted service
    #[default]
    Cloud,
    /// Customer-managed controllers
    OnPremises,
}

impl FromStr for Deployment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "cloud" => Ok(Deployment::Cloud),
            "on_premises" | "onprem" => Ok(Deployment::OnPremises),
            _ => Err(format!("Invalid deployment: {}", s)),
        }
    }
}

/// Connection settings for the remote orchestration service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Scheme and host of the service, e.g. "https://api.example.com"
    pub endpoint: String,
    pub deployment: Deployment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    /// Environment variable holding the session bearer token
    pub token_env: String,
    /// Per-request timeout
    pub timeout_seconds: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            deployment: Deployment::Cloud,
            customer_id: None,
            site_id: None,
            token_env: "POLICYSET_API_TOKEN".to_string(),
            timeout_seconds: 30,
        }
    }
}
