//! Wire types exchanged with the remote orchestration service.

use crate::model::{FilterPayload, SettingPayload};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Envelope used by every list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Policy set as returned by `GET policy-sets` and `GET policy-sets/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySetRecord {
    pub policy_set_guid: String,
    pub name: String,
    #[serde(default)]
    pub policy_set_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub is_assigned: bool,
    /// Present when requested with `withPolicies=true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<Vec<PolicyRecord>>,
}

/// Policy as returned by `GET policies?policySetId=..&withFilters=true&withSettings=true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRecord {
    pub policy_guid: String,
    pub policy_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    /// Lower value is higher priority.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub settings: Vec<SettingRecord>,
    #[serde(default)]
    pub filters: Vec<FilterRecord>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingRecord {
    pub setting_guid: String,
    #[serde(flatten)]
    pub payload: SettingPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRecord {
    pub filter_guid: String,
    #[serde(flatten)]
    pub payload: FilterPayload,
}

/// Entry of the remote setting-definition catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingDefinition {
    pub setting_name: String,
    #[serde(default)]
    pub is_user_setting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryGroupRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Policy set this delivery group currently references.
    #[serde(default)]
    pub policy_set_guid: Option<String>,
}

/// Tags and administrative scopes share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfo {
    pub product_version: String,
}

/// Body of `POST policy-sets` and `PATCH policy-sets/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySetBody {
    pub name: String,
    pub description: String,
    pub policy_set_type: String,
    pub scopes: Vec<String>,
}

/// Body of policy create and patch batch items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyBody {
    pub policy_name: String,
    pub description: String,
    pub is_enabled: bool,
}

/// Body of delivery-group association patches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationBody {
    pub policy_set_guid: String,
}

/// HTTP-like method of a batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchMethod {
    Post,
    Patch,
    Delete,
}

impl fmt::Display for BatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchMethod::Post => f.write_str("POST"),
            BatchMethod::Patch => f.write_str("PATCH"),
            BatchMethod::Delete => f.write_str("DELETE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchHeader {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl BatchHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One sub-request of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    /// Label used to correlate results with requests.
    pub reference: String,
    pub method: BatchMethod,
    pub relative_url: String,
    pub headers: Vec<BatchHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
}

impl BatchRequest {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponseItem {
    pub reference: String,
    pub code: u16,
    #[serde(default)]
    pub body: Option<String>,
}

/// A sub-operation that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItemFailure {
    pub reference: String,
    pub code: u16,
    pub message: String,
}

/// Result of submitting a batch. Sibling failures never abort each other.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    pub success_count: usize,
    pub total: usize,
    pub transaction_id: String,
    pub failures: Vec<BatchItemFailure>,
}

impl BatchOutcome {
    pub fn from_response(items: &[BatchResponseItem], transaction_id: String) -> Self {
        let failures: Vec<BatchItemFailure> = items
            .iter()
            .filter(|i| !(200..300).contains(&i.code))
            .map(|i| BatchItemFailure {
                reference: i.reference.clone(),
                code: i.code,
                message: i.body.clone().unwrap_or_default(),
            })
            .collect();

        Self {
            success_count: items.len() - failures.len(),
            total: items.len(),
            transaction_id,
            failures,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.success_count >= self.total
    }
}

/// Major/minor version of the connected service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServiceVersion {
    pub major: u32,
    pub minor: u32,
}

impl ServiceVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse a dotted product version such as `7.41.0.12`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().unwrap_or("0").parse().ok()?;
        Some(Self { major, minor })
    }
}

impl fmt::Display for ServiceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
