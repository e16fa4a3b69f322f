//! Reconciliation behaviour configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How filters of a changed policy are brought up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterStrategy {
    /// Delete every remote filter of the policy and recreate the desired set
    #[default]
    Recreate,
    /// Keep unchanged remote filters (and their identifiers), replace the rest
    Preserve,
}

impl FromStr for FilterStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recreate" => Ok(FilterStrategy::Recreate),
            "preserve" => Ok(FilterStrategy::Preserve),
            _ => Err(format!("Invalid filter strategy: {}", s)),
        }
    }
}

/// Reconciliation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub filter_strategy: FilterStrategy,
    /// Minimum on-premises product version supporting policy sets ("major.minor")
    pub min_on_premises_version: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            filter_strategy: FilterStrategy::Recreate,
            min_on_premises_version: "7.41".to_string(),
        }
    }
}
