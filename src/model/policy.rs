//! Policies and policy sets.

use super::{Filter, Setting};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Well-known identifier of the default policy set.
///
/// The default set always exists, cannot be deleted or renamed, and is the
/// association target for delivery groups that leave any other set.
pub const DEFAULT_POLICY_SET_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Name the remote service gives the default policy set.
pub const DEFAULT_POLICY_SET_NAME: &str = "DefaultSitePolicies";

/// The four fixed kinds of policy set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PolicySetType {
    #[default]
    DeliveryGroupPolicies,
    SiteTemplates,
    CustomTemplates,
    SitePolicies,
}

impl PolicySetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicySetType::DeliveryGroupPolicies => "DeliveryGroupPolicies",
            PolicySetType::SiteTemplates => "SiteTemplates",
            PolicySetType::CustomTemplates => "CustomTemplates",
            PolicySetType::SitePolicies => "SitePolicies",
        }
    }
}

impl fmt::Display for PolicySetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicySetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deliverygrouppolicies" => Ok(PolicySetType::DeliveryGroupPolicies),
            "sitetemplates" => Ok(PolicySetType::SiteTemplates),
            "customtemplates" => Ok(PolicySetType::CustomTemplates),
            "sitepolicies" => Ok(PolicySetType::SitePolicies),
            _ => Err(format!("Invalid policy set type: {}", s)),
        }
    }
}

/// A named bundle of settings and filters. Its position in the owning
/// [`PolicySet::policies`] list is its priority (index 0 is highest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Remote identifier, empty until created.
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub settings: Vec<Setting>,
    pub filters: Vec<Filter>,
}

impl Policy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            description: String::new(),
            enabled: true,
            settings: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_setting(mut self, setting: Setting) -> Self {
        self.settings.push(setting);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn is_created(&self) -> bool {
        !self.id.is_empty()
    }

    /// Policy names are unique within a set, compared case-insensitively.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn setting(&self, name: &str) -> Option<&Setting> {
        let key = name.to_lowercase();
        self.settings.iter().find(|s| s.key() == key)
    }
}

/// Top-level container grouping an ordered list of policies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PolicySet {
    /// Remote identifier, empty until created.
    pub id: String,
    pub name: String,
    pub policy_set_type: PolicySetType,
    pub description: String,
    pub scopes: BTreeSet<String>,
    pub policies: Vec<Policy>,
    pub delivery_groups: BTreeSet<String>,
}

impl PolicySet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether any delivery group references this set.
    pub fn assigned(&self) -> bool {
        !self.delivery_groups.is_empty()
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_POLICY_SET_ID
    }

    pub fn policy_names(&self) -> Vec<String> {
        self.policies.iter().map(|p| p.name.clone()).collect()
    }
}
