//! Pre-condition validation.
//!
//! Runs against the desired state and the freshly fetched remote catalogs
//! before any mutation is attempted. Every violation is collected so the
//! operator sees all of them in one run.

use super::diagnostics::{Diagnostic, Diagnostics};
use super::rename::check_policy_name;
use crate::config::Deployment;
use crate::model::{FilterData, FilterKind, PolicySet, DEFAULT_POLICY_SET_NAME};
use crate::remote::{
    DeliveryGroupRecord, NamedRecord, PolicySetRecord, ServiceVersion, SettingDefinition,
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("A policy set named '{name}' already exists ({id})")]
    DuplicatePolicySetName { name: String, id: String },

    #[error("Policy name '{name}' is used more than once")]
    DuplicatePolicyName { name: String },

    #[error("Setting '{setting}' is declared more than once on policy '{policy}'")]
    DuplicateSetting { policy: String, setting: String },

    #[error("Setting '{setting}' on policy '{policy}' is not a known setting")]
    UnknownSetting { policy: String, setting: String },

    #[error("Policy '{policy}' has {kinds} filters but no user setting")]
    FilterWithoutUserSetting { policy: String, kinds: String },

    #[error("Delivery group '{id}' does not exist")]
    UnknownDeliveryGroup { id: String },

    #[error("Tag '{id}' referenced by policy '{policy}' does not exist")]
    UnknownTag { policy: String, id: String },

    #[error("Scope '{scope}' does not exist")]
    UnknownScope { scope: String },

    #[error("Service version {found} does not support policy sets (minimum {required})")]
    UnsupportedVersion {
        found: ServiceVersion,
        required: ServiceVersion,
    },

    #[error("The default policy set cannot {action}")]
    DefaultPolicySet { action: String },

    #[error("Invalid policy name '{name}': {reason}")]
    InvalidPolicyName { name: String, reason: String },

    #[error("Policy identifier '{id}' cannot be used as a temporary name: {reason}")]
    InvalidPlaceholder { id: String, reason: String },
}

impl From<ValidationError> for Diagnostic {
    fn from(err: ValidationError) -> Self {
        let summary = match &err {
            ValidationError::UnsupportedVersion { .. } => "Unsupported service version",
            ValidationError::DefaultPolicySet { .. } => "Default policy set is immutable",
            ValidationError::InvalidPlaceholder { .. } => "Rename placeholder rejected",
            _ => "Invalid policy set configuration",
        };
        Diagnostic::error(summary, err.to_string())
    }
}

/// Remote facts the desired state is validated against.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext<'a> {
    pub deployment: Deployment,
    pub service_version: Option<ServiceVersion>,
    pub min_on_premises_version: Option<ServiceVersion>,
    pub setting_catalog: &'a [SettingDefinition],
    pub delivery_groups: &'a [DeliveryGroupRecord],
    pub tags: &'a [NamedRecord],
    pub scopes: &'a [NamedRecord],
    /// Every remote policy set, including the one being reconciled.
    pub policy_sets: &'a [PolicySetRecord],
    /// Remote snapshot of the bound policy set, if it exists.
    pub remote: Option<&'a PolicySet>,
    /// Remote policy identifiers that will be used as temporary names.
    pub placeholders: &'a [String],
}

/// Validate the desired policy set, returning every violation found.
pub fn validate(desired: &PolicySet, ctx: &ValidationContext<'_>) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_version(ctx, &mut errors);
    check_default_set(desired, ctx, &mut errors);
    check_set_name(desired, ctx, &mut errors);
    check_policies(desired, ctx, &mut errors);
    check_references(desired, ctx, &mut errors);

    for id in ctx.placeholders {
        if let Err(reason) = check_policy_name(id) {
            errors.push(ValidationError::InvalidPlaceholder {
                id: id.clone(),
                reason,
            });
        }
    }

    errors
}

/// Convenience wrapper returning the violations as diagnostics.
pub fn validate_diagnostics(desired: &PolicySet, ctx: &ValidationContext<'_>) -> Diagnostics {
    validate(desired, ctx).into_iter().map(Diagnostic::from).collect()
}

fn check_version(ctx: &ValidationContext<'_>, errors: &mut Vec<ValidationError>) {
    if ctx.deployment != Deployment::OnPremises {
        return;
    }
    if let (Some(found), Some(required)) = (ctx.service_version, ctx.min_on_premises_version) {
        if found < required {
            errors.push(ValidationError::UnsupportedVersion { found, required });
        }
    }
}

fn is_default(desired: &PolicySet, ctx: &ValidationContext<'_>) -> bool {
    desired.is_default() || ctx.remote.is_some_and(PolicySet::is_default)
}

fn check_default_set(
    desired: &PolicySet,
    ctx: &ValidationContext<'_>,
    errors: &mut Vec<ValidationError>,
) {
    if !is_default(desired, ctx) {
        return;
    }
    if !desired.scopes.is_empty() {
        errors.push(ValidationError::DefaultPolicySet {
            action: "have scopes".to_string(),
        });
    }
    if !desired.delivery_groups.is_empty() {
        errors.push(ValidationError::DefaultPolicySet {
            action: "have delivery group associations".to_string(),
        });
    }
    let current_name = ctx
        .remote
        .map(|r| r.name.as_str())
        .unwrap_or(DEFAULT_POLICY_SET_NAME);
    if desired.name != current_name {
        errors.push(ValidationError::DefaultPolicySet {
            action: "be renamed".to_string(),
        });
    }
}

fn check_set_name(
    desired: &PolicySet,
    ctx: &ValidationContext<'_>,
    errors: &mut Vec<ValidationError>,
) {
    let name = desired.name.to_lowercase();
    if let Some(other) = ctx
        .policy_sets
        .iter()
        .find(|s| s.policy_set_guid != desired.id && s.name.to_lowercase() == name)
    {
        errors.push(ValidationError::DuplicatePolicySetName {
            name: desired.name.clone(),
            id: other.policy_set_guid.clone(),
        });
    }
}

fn check_policies(
    desired: &PolicySet,
    ctx: &ValidationContext<'_>,
    errors: &mut Vec<ValidationError>,
) {
    let catalog: HashMap<String, bool> = ctx
        .setting_catalog
        .iter()
        .map(|d| (d.setting_name.to_lowercase(), d.is_user_setting))
        .collect();

    let mut seen_policies = HashSet::new();
    for policy in &desired.policies {
        if let Err(reason) = check_policy_name(&policy.name) {
            errors.push(ValidationError::InvalidPolicyName {
                name: policy.name.clone(),
                reason,
            });
        }
        if !seen_policies.insert(policy.key()) {
            errors.push(ValidationError::DuplicatePolicyName {
                name: policy.name.clone(),
            });
        }

        let mut seen_settings = HashSet::new();
        for setting in &policy.settings {
            if !seen_settings.insert(setting.key()) {
                errors.push(ValidationError::DuplicateSetting {
                    policy: policy.name.clone(),
                    setting: setting.name.clone(),
                });
            }
            if !catalog.contains_key(&setting.key()) {
                errors.push(ValidationError::UnknownSetting {
                    policy: policy.name.clone(),
                    setting: setting.name.clone(),
                });
            }
        }

        let mut restricted: Vec<FilterKind> = policy
            .filters
            .iter()
            .map(|f| f.kind())
            .filter(|k| k.requires_user_setting())
            .collect();
        restricted.sort();
        restricted.dedup();
        let has_user_setting = policy
            .settings
            .iter()
            .any(|s| catalog.get(&s.key()).copied().unwrap_or(false));
        if !restricted.is_empty() && !has_user_setting {
            errors.push(ValidationError::FilterWithoutUserSetting {
                policy: policy.name.clone(),
                kinds: restricted
                    .iter()
                    .map(FilterKind::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
    }
}

fn check_references(
    desired: &PolicySet,
    ctx: &ValidationContext<'_>,
    errors: &mut Vec<ValidationError>,
) {
    let groups: HashSet<&str> = ctx.delivery_groups.iter().map(|g| g.id.as_str()).collect();
    let tags: HashSet<&str> = ctx.tags.iter().map(|t| t.id.as_str()).collect();

    for id in &desired.delivery_groups {
        if !groups.contains(id.as_str()) {
            errors.push(ValidationError::UnknownDeliveryGroup { id: id.clone() });
        }
    }

    // scopes are sent as identifiers, so a matching name is not enough
    let scopes: HashSet<&str> = ctx.scopes.iter().map(|s| s.id.as_str()).collect();
    for scope in &desired.scopes {
        if !scopes.contains(scope.as_str()) {
            errors.push(ValidationError::UnknownScope {
                scope: scope.clone(),
            });
        }
    }

    for policy in &desired.policies {
        for filter in &policy.filters {
            match &filter.data {
                FilterData::DeliveryGroup(target) if !groups.contains(target.uuid.as_str()) => {
                    errors.push(ValidationError::UnknownDeliveryGroup {
                        id: target.uuid.clone(),
                    });
                }
                FilterData::Tag(target) if !tags.contains(target.uuid.as_str()) => {
                    errors.push(ValidationError::UnknownTag {
                        policy: policy.name.clone(),
                        id: target.uuid.clone(),
                    });
                }
                _ => {}
            }
        }
    }
}
