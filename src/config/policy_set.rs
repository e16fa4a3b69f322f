//! Declared policy set configuration
//!
//! This is the operator-facing shape of the desired state. Policy order in
//! the file is policy priority. Conversion into the domain model performs
//! the structural checks that need no remote data.

use super::ConfigError;
use crate::model::{
    AccessConnection, AccessControlRef, Filter, FilterData, ObjectRef, Policy, PolicySet,
    PolicySetType, Setting, SettingValue,
};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Desired policy set
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PolicySetConfig {
    /// Remote identifier from a previous run; resolved by name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub policy_set_type: PolicySetType,
    #[serde(default)]
    pub description: String,
    /// Administrative scope identifiers.
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub delivery_groups: Vec<String>,
    /// Ordered by priority, highest first
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
}

/// Desired policy
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PolicyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub settings: Vec<SettingConfig>,
    #[serde(default)]
    pub access_control_filters: Vec<AccessControlFilterConfig>,
    #[serde(default)]
    pub branch_repeater_filters: Vec<BranchRepeaterFilterConfig>,
    #[serde(default)]
    pub client_ip_filters: Vec<ValueFilterConfig>,
    #[serde(default)]
    pub client_name_filters: Vec<ValueFilterConfig>,
    #[serde(default)]
    pub delivery_group_filters: Vec<ObjectFilterConfig>,
    #[serde(default)]
    pub delivery_group_type_filters: Vec<ValueFilterConfig>,
    #[serde(default)]
    pub ou_filters: Vec<ValueFilterConfig>,
    #[serde(default)]
    pub user_filters: Vec<ValueFilterConfig>,
    #[serde(default)]
    pub tag_filters: Vec<ObjectFilterConfig>,
}

/// Desired setting: `use_default`, or exactly one of `value` / `enabled`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingConfig {
    pub name: String,
    #[serde(default)]
    pub use_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControlFilterConfig {
    #[serde(default = "default_true")]
    pub allowed: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub connection: AccessConnection,
    pub condition: String,
    pub gateway: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRepeaterFilterConfig {
    #[serde(default = "default_true")]
    pub allowed: bool,
}

/// Filter whose payload is a plain string (client IP, client name,
/// delivery group type, OU, user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueFilterConfig {
    #[serde(default = "default_true")]
    pub allowed: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub value: String,
}

/// Filter referencing a remote object (delivery group, tag)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectFilterConfig {
    #[serde(default = "default_true")]
    pub allowed: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub id: String,
    #[serde(default)]
    pub server: String,
}

impl ObjectFilterConfig {
    fn to_ref(&self) -> ObjectRef {
        ObjectRef {
            uuid: self.id.clone(),
            server: self.server.clone(),
        }
    }
}

impl SettingConfig {
    pub fn to_setting(&self, field: &str) -> Result<Setting, ConfigError> {
        let invalid = |message: &str| ConfigError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("setting name cannot be empty"));
        }

        let value = match (self.use_default, &self.value, self.enabled) {
            (true, None, None) => SettingValue::UseDefault,
            (true, _, _) => {
                return Err(invalid(
                    "use_default cannot be combined with value or enabled",
                ))
            }
            (false, Some(v), None) => SettingValue::Value(v.clone()),
            (false, None, Some(e)) => SettingValue::Enabled(e),
            (false, Some(_), Some(_)) => {
                return Err(invalid("exactly one of value or enabled must be set"))
            }
            (false, None, None) => {
                return Err(invalid(
                    "one of value or enabled is required unless use_default is true",
                ))
            }
        };

        Ok(Setting::new(self.name.clone(), value))
    }
}

impl PolicyConfig {
    /// Flatten the nine filter collections into typed filters.
    pub fn filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();

        filters.extend(self.access_control_filters.iter().map(|f| {
            Filter::new(
                FilterData::AccessControl(AccessControlRef {
                    connection: f.connection,
                    condition: f.condition.clone(),
                    gateway: f.gateway.clone(),
                }),
                f.allowed,
                f.enabled,
            )
        }));
        filters.extend(
            self.branch_repeater_filters
                .iter()
                .map(|f| Filter::new(FilterData::BranchRepeater, f.allowed, true)),
        );

        let values: [(&Vec<ValueFilterConfig>, fn(String) -> FilterData); 5] = [
            (&self.client_ip_filters, FilterData::ClientIp),
            (&self.client_name_filters, FilterData::ClientName),
            (&self.delivery_group_type_filters, FilterData::DeliveryGroupType),
            (&self.ou_filters, FilterData::OrganizationalUnit),
            (&self.user_filters, FilterData::User),
        ];
        for (configs, make) in values {
            filters.extend(
                configs
                    .iter()
                    .map(|f| Filter::new(make(f.value.clone()), f.allowed, f.enabled)),
            );
        }

        filters.extend(self.delivery_group_filters.iter().map(|f| {
            Filter::new(FilterData::DeliveryGroup(f.to_ref()), f.allowed, f.enabled)
        }));
        filters.extend(
            self.tag_filters
                .iter()
                .map(|f| Filter::new(FilterData::Tag(f.to_ref()), f.allowed, f.enabled)),
        );

        filters
    }

    pub fn to_policy(&self, field: &str) -> Result<Policy, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: format!("{}.name", field),
                message: "policy name cannot be empty".to_string(),
            });
        }

        let settings = self
            .settings
            .iter()
            .enumerate()
            .map(|(i, s)| s.to_setting(&format!("{}.settings[{}]", field, i)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Policy {
            id: self.id.clone().unwrap_or_default(),
            name: self.name.clone(),
            description: self.description.clone(),
            enabled: self.enabled,
            settings,
            filters: self.filters(),
        })
    }
}

impl PolicySetConfig {
    /// Convert to the desired domain state.
    pub fn to_desired(&self) -> Result<PolicySet, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "policy_set.name".to_string(),
                message: "name cannot be empty".to_string(),
            });
        }

        let policies = self
            .policies
            .iter()
            .enumerate()
            .map(|(i, p)| p.to_policy(&format!("policy_set.policies[{}]", i)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PolicySet {
            id: self.id.clone().unwrap_or_default(),
            name: self.name.clone(),
            policy_set_type: self.policy_set_type,
            description: self.description.clone(),
            scopes: self.scopes.iter().cloned().collect(),
            policies,
            delivery_groups: self.delivery_groups.iter().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FilterKind;

    #[test]
    fn test_parse_policy_set_toml() {
        let toml = r#"
        name = "Standard"
        type = "DeliveryGroupPolicies"
        delivery_groups = ["dg-1"]

        [[policies]]
        name = "Base"

        [[policies.settings]]
        name = "IcaRtt"
        use_default = true

        [[policies.client_ip_filters]]
        value = "10.0.0.0/8"
        allowed = false

        [[policies.branch_repeater_filters]]
        "#;

        let config: PolicySetConfig = toml::from_str(toml).unwrap();
        let desired = config.to_desired().unwrap();

        assert_eq!(desired.name, "Standard");
        assert!(desired.delivery_groups.contains("dg-1"));
        let base = &desired.policies[0];
        assert!(base.enabled);
        assert_eq!(base.settings[0].value, SettingValue::UseDefault);
        assert_eq!(base.filters.len(), 2);
        assert_eq!(base.filters[0].kind(), FilterKind::BranchRepeater);
        assert_eq!(base.filters[1].kind(), FilterKind::ClientIp);
        assert!(!base.filters[1].allowed);
    }

    #[test]
    fn test_policy_order_preserved() {
        let config = PolicySetConfig {
            name: "Ordered".to_string(),
            policies: ["P3", "P1", "P2"]
                .iter()
                .map(|n| PolicyConfig {
                    name: n.to_string(),
                    enabled: true,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        assert_eq!(
            config.to_desired().unwrap().policy_names(),
            vec!["P3", "P1", "P2"]
        );
    }

    #[test]
    fn test_setting_requires_exactly_one_value() {
        let both = SettingConfig {
            name: "X".to_string(),
            use_default: false,
            value: Some("1".to_string()),
            enabled: Some(true),
        };
        assert!(both.to_setting("s").is_err());

        let neither = SettingConfig {
            name: "X".to_string(),
            ..Default::default()
        };
        assert!(neither.to_setting("s").is_err());

        let enabled = SettingConfig {
            name: "X".to_string(),
            enabled: Some(false),
            ..Default::default()
        };
        assert_eq!(
            enabled.to_setting("s").unwrap().value,
            SettingValue::Enabled(false)
        );
    }

    #[test]
    fn test_use_default_conflicts_with_value() {
        let setting = SettingConfig {
            name: "X".to_string(),
            use_default: true,
            value: Some("1".to_string()),
            enabled: None,
        };
        assert!(matches!(
            setting.to_setting("policies[0].settings[0]"),
            Err(ConfigError::Validation { ref field, .. }) if field == "policies[0].settings[0]"
        ));
    }

    #[test]
    fn test_empty_policy_name_rejected() {
        let config = PolicySetConfig {
            name: "Set".to_string(),
            policies: vec![PolicyConfig::default()],
            ..Default::default()
        };
        assert!(matches!(
            config.to_desired(),
            Err(ConfigError::Validation { ref field, .. }) if field.contains("policies[0]")
        ));
    }

    #[test]
    fn test_object_filters_carry_server() {
        let policy = PolicyConfig {
            name: "P".to_string(),
            tag_filters: vec![ObjectFilterConfig {
                allowed: true,
                enabled: true,
                id: "tag-1".to_string(),
                server: "ddc01".to_string(),
            }],
            ..Default::default()
        };
        let filters = policy.filters();
        assert_eq!(
            filters[0].data,
            FilterData::Tag(ObjectRef {
                uuid: "tag-1".to_string(),
                server: "ddc01".to_string()
            })
        );
    }
}
