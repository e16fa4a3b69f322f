//! Error types for remote service operations.

use thiserror::Error;

/// Errors that can occur while talking to the remote orchestration service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network connectivity error (DNS, connection refused, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded deadline.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Session token rejected or missing.
    #[error("Authentication failed: {message}")]
    Unauthorized {
        message: String,
        transaction_id: Option<String>,
    },

    /// Service returned an error response (4xx, 5xx).
    #[error("Remote error {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
        transaction_id: Option<String>,
    },

    /// Response doesn't match the expected format.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Connection configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The caller cancelled the run before this call was made.
    #[error("Operation cancelled")]
    Cancelled,
}

impl RemoteError {
    /// Transaction identifier reported by the service, when one was returned.
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            RemoteError::Unauthorized { transaction_id, .. }
            | RemoteError::Upstream { transaction_id, .. } => transaction_id.as_deref(),
            _ => None,
        }
    }

    pub fn from_reqwest(e: reqwest::Error, timeout_ms: u64) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout(timeout_ms)
        } else {
            RemoteError::Network(e.to_string())
        }
    }
}
