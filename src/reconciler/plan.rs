//! Reconciliation plan.
//!
//! A plan is computed purely from the bound desired state and the remote
//! snapshot. An empty plan means the remote state already converges.

use super::association::AssociationPlan;
use super::diff::{diff_policies, PolicyDiff};
use super::priority::predict_reorder;
use super::rename::placeholder_targets;
use crate::config::FilterStrategy;
use crate::model::PolicySet;
use crate::remote::PolicySetBody;
use serde::Serialize;
use std::fmt;

/// What happens to the policy set record itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySetAction {
    Create(PolicySetBody),
    Update(PolicySetBody),
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Remote identifier; `None` until the policy set is created.
    pub policy_set_id: Option<String>,
    pub name: String,
    pub action: PolicySetAction,
    pub policies: PolicyDiff,
    /// Remote policies moved to a temporary name before creates.
    pub placeholders: Vec<String>,
    /// Whether the desired order differs from the projected remote order.
    pub reorder: bool,
    pub associations: AssociationPlan,
    /// Desired policy names, highest priority first.
    pub desired_order: Vec<String>,
}

pub fn policy_set_body(set: &PolicySet) -> PolicySetBody {
    PolicySetBody {
        name: set.name.clone(),
        description: set.description.clone(),
        policy_set_type: set.policy_set_type.as_str().to_string(),
        scopes: set.scopes.iter().cloned().collect(),
    }
}

impl Plan {
    /// Compute the plan for a bound desired state.
    pub fn build(desired: &PolicySet, remote: Option<&PolicySet>, strategy: FilterStrategy) -> Self {
        let body = policy_set_body(desired);
        let action = match remote {
            None => PolicySetAction::Create(body),
            Some(r) if policy_set_body(r) != body => PolicySetAction::Update(body),
            Some(_) => PolicySetAction::Unchanged,
        };

        let remote_policies = remote.map(|r| r.policies.as_slice()).unwrap_or_default();
        let policies = diff_policies(&desired.policies, remote_policies, strategy);
        let placeholders = placeholder_targets(&policies);
        let reorder = predict_reorder(&desired.policies, remote_policies);

        let prior = remote.map(|r| r.delivery_groups.clone()).unwrap_or_default();
        let set_id = remote.map_or(desired.id.as_str(), |r| r.id.as_str());
        let associations = AssociationPlan::for_policy_set(set_id, &prior, &desired.delivery_groups);

        Self {
            policy_set_id: remote.map(|r| r.id.clone()),
            name: desired.name.clone(),
            action,
            policies,
            placeholders,
            reorder,
            associations,
            desired_order: desired.policy_names(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.action == PolicySetAction::Unchanged
            && self.policies.is_empty()
            && !self.reorder
            && self.associations.is_empty()
    }

    /// Flatten the plan into displayable changes.
    pub fn changes(&self) -> Vec<PlannedChange> {
        let mut changes = Vec::new();

        match &self.action {
            PolicySetAction::Create(_) => {
                changes.push(PlannedChange::new(ChangeKind::Create, "policy set", &self.name))
            }
            PolicySetAction::Update(_) => {
                changes.push(PlannedChange::new(ChangeKind::Update, "policy set", &self.name))
            }
            PolicySetAction::Unchanged => {}
        }

        for policy in &self.policies.to_create {
            changes.push(
                PlannedChange::new(ChangeKind::Create, "policy", &policy.name).with_detail(
                    format!(
                        "{} settings, {} filters",
                        policy.settings.len(),
                        policy.filters.len()
                    ),
                ),
            );
        }
        for rename in &self.policies.renamed {
            changes.push(
                PlannedChange::new(ChangeKind::Rename, "policy", &rename.from)
                    .with_detail(format!("-> {}", rename.to)),
            );
        }
        for update in &self.policies.to_update {
            let name = update
                .attributes
                .as_ref()
                .map(|a| a.policy_name.clone())
                .unwrap_or_else(|| update.policy_id.clone());
            changes.push(
                PlannedChange::new(ChangeKind::Update, "policy", name).with_detail(format!(
                    "settings +{} ~{} -{}, filters +{} -{}",
                    update.settings.create.len(),
                    update.settings.update.len(),
                    update.settings.delete.len(),
                    update.filters.create.len(),
                    update.filters.delete.len()
                )),
            );
        }
        for policy in &self.policies.to_delete {
            changes.push(PlannedChange::new(ChangeKind::Delete, "policy", &policy.name));
        }
        if self.reorder {
            changes.push(
                PlannedChange::new(ChangeKind::Reorder, "policies", &self.name)
                    .with_detail(self.desired_order.join(", ")),
            );
        }
        for group in &self.associations.to_remove {
            changes.push(
                PlannedChange::new(ChangeKind::Dissociate, "delivery group", group)
                    .with_detail("-> default policy set"),
            );
        }
        for group in &self.associations.to_add {
            changes.push(PlannedChange::new(ChangeKind::Associate, "delivery group", group));
        }

        changes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Rename,
    Delete,
    Reorder,
    Associate,
    Dissociate,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Rename => "rename",
            ChangeKind::Delete => "delete",
            ChangeKind::Reorder => "reorder",
            ChangeKind::Associate => "associate",
            ChangeKind::Dissociate => "dissociate",
        };
        f.write_str(s)
    }
}

/// One displayable line of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedChange {
    pub kind: ChangeKind,
    pub resource: String,
    pub target: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

impl PlannedChange {
    fn new(kind: ChangeKind, resource: &str, target: impl Into<String>) -> Self {
        Self {
            kind,
            resource: resource.to_string(),
            target: target.into(),
            detail: String::new(),
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}
