//! Batch request builder and partial-failure accounting.
//!
//! Logical mutations are translated into batch items carrying a reference
//! label, a method, a relative path, the per-batch header set and a
//! serialized body. Each [`BatchStep`] is submitted on its own and in a
//! fixed order; steps are never interleaved.

use super::diagnostics::Diagnostic;
use crate::model::{Filter, Setting};
use crate::remote::{
    AssociationBody, BatchHeader, BatchItem, BatchMethod, BatchOutcome, BatchRequest, PolicyBody,
};
use std::fmt;

/// A single logical remote mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreatePolicy {
        policy_set_id: String,
        policy: PolicyBody,
    },
    UpdatePolicy {
        policy_id: String,
        policy: PolicyBody,
    },
    /// Name-only patch used for collision-proof placeholders.
    RenamePolicy {
        policy_id: String,
        name: String,
    },
    DeletePolicy {
        policy_id: String,
    },
    CreateSetting {
        policy_id: String,
        setting: Setting,
    },
    UpdateSetting {
        setting: Setting,
    },
    DeleteSetting {
        setting_id: String,
    },
    CreateFilter {
        policy_id: String,
        filter: Filter,
    },
    DeleteFilter {
        filter_id: String,
    },
    /// Point a delivery group at a policy set.
    AssociatePolicySet {
        delivery_group_id: String,
        policy_set_id: String,
    },
}

impl Mutation {
    /// Short label used in batch item references.
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::CreatePolicy { .. } => "create-policy",
            Mutation::UpdatePolicy { .. } => "update-policy",
            Mutation::RenamePolicy { .. } => "rename-policy",
            Mutation::DeletePolicy { .. } => "delete-policy",
            Mutation::CreateSetting { .. } => "create-setting",
            Mutation::UpdateSetting { .. } => "update-setting",
            Mutation::DeleteSetting { .. } => "delete-setting",
            Mutation::CreateFilter { .. } => "create-filter",
            Mutation::DeleteFilter { .. } => "delete-filter",
            Mutation::AssociatePolicySet { .. } => "associate-delivery-group",
        }
    }

    pub fn method(&self) -> BatchMethod {
        match self {
            Mutation::CreatePolicy { .. }
            | Mutation::CreateSetting { .. }
            | Mutation::CreateFilter { .. } => BatchMethod::Post,
            Mutation::UpdatePolicy { .. }
            | Mutation::RenamePolicy { .. }
            | Mutation::UpdateSetting { .. }
            | Mutation::AssociatePolicySet { .. } => BatchMethod::Patch,
            Mutation::DeletePolicy { .. }
            | Mutation::DeleteSetting { .. }
            | Mutation::DeleteFilter { .. } => BatchMethod::Delete,
        }
    }

    pub fn relative_url(&self) -> String {
        match self {
            Mutation::CreatePolicy { policy_set_id, .. } => {
                format!("/policies?policySetId={}", policy_set_id)
            }
            Mutation::UpdatePolicy { policy_id, .. }
            | Mutation::RenamePolicy { policy_id, .. }
            | Mutation::DeletePolicy { policy_id } => format!("/policies/{}", policy_id),
            Mutation::CreateSetting { policy_id, .. } => {
                format!("/settings?policyId={}", policy_id)
            }
            Mutation::UpdateSetting { setting } => format!("/settings/{}", setting.id),
            Mutation::DeleteSetting { setting_id } => format!("/settings/{}", setting_id),
            Mutation::CreateFilter { policy_id, .. } => format!("/filters?policyId={}", policy_id),
            Mutation::DeleteFilter { filter_id } => format!("/filters/{}", filter_id),
            Mutation::AssociatePolicySet {
                delivery_group_id, ..
            } => format!("/delivery-groups/{}", delivery_group_id),
        }
    }

    pub fn body(&self) -> Result<Option<String>, serde_json::Error> {
        let body = match self {
            Mutation::CreatePolicy { policy, .. } | Mutation::UpdatePolicy { policy, .. } => {
                serde_json::to_string(policy)?
            }
            Mutation::RenamePolicy { name, .. } => {
                serde_json::to_string(&serde_json::json!({ "policyName": name }))?
            }
            Mutation::CreateSetting { setting, .. } | Mutation::UpdateSetting { setting } => {
                serde_json::to_string(&setting.to_payload())?
            }
            Mutation::CreateFilter { filter, .. } => serde_json::to_string(&filter.to_payload()?)?,
            Mutation::AssociatePolicySet { policy_set_id, .. } => {
                serde_json::to_string(&AssociationBody {
                    policy_set_guid: policy_set_id.clone(),
                })?
            }
            Mutation::DeletePolicy { .. }
            | Mutation::DeleteSetting { .. }
            | Mutation::DeleteFilter { .. } => return Ok(None),
        };
        Ok(Some(body))
    }
}

/// Translate mutations into one batch request.
pub fn build_batch(
    headers: &[BatchHeader],
    mutations: &[Mutation],
) -> Result<BatchRequest, serde_json::Error> {
    let items = mutations
        .iter()
        .enumerate()
        .map(|(i, m)| {
            Ok(BatchItem {
                reference: format!("{}-{}", m.label(), i),
                method: m.method(),
                relative_url: m.relative_url(),
                headers: headers.to_vec(),
                body: m.body()?,
            })
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;

    Ok(BatchRequest { items })
}

/// Independently submitted batch, in apply order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchStep {
    RenamePlaceholders,
    CreatePolicies,
    CreateSettings,
    CreateFilters,
    DeletePolicyChildren,
    DeletePolicies,
    DeleteFilters,
    DeleteSettings,
    UpdatePolicies,
    ReplaceFilters,
    RemoveAssociations,
    AddAssociations,
}

impl BatchStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStep::RenamePlaceholders => "rename placeholders",
            BatchStep::CreatePolicies => "create policies",
            BatchStep::CreateSettings => "create settings",
            BatchStep::CreateFilters => "create filters",
            BatchStep::DeletePolicyChildren => "delete policy children",
            BatchStep::DeletePolicies => "delete policies",
            BatchStep::DeleteFilters => "delete filters",
            BatchStep::DeleteSettings => "delete settings",
            BatchStep::UpdatePolicies => "update policies",
            BatchStep::ReplaceFilters => "replace filters",
            BatchStep::RemoveAssociations => "remove associations",
            BatchStep::AddAssociations => "add associations",
        }
    }
}

impl fmt::Display for BatchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Promote sub-operation failures to a step-level error.
///
/// `submitted` is the number of items sent. A batch with fewer successes
/// than that is a failed step even though the submission itself raised no
/// error, whatever total the service reports.
pub fn account(step: BatchStep, submitted: usize, outcome: &BatchOutcome) -> Result<(), Diagnostic> {
    let total = submitted.max(outcome.total);
    if outcome.success_count >= total {
        return Ok(());
    }

    let detail = outcome
        .failures
        .iter()
        .map(|f| format!("{} returned {}: {}", f.reference, f.code, f.message))
        .collect::<Vec<_>>()
        .join("; ");

    tracing::warn!(
        step = %step,
        succeeded = outcome.success_count,
        total,
        transaction_id = %outcome.transaction_id,
        "Batch partially failed"
    );

    Err(Diagnostic::error(
        format!("{}: {} of {} succeeded", step, outcome.success_count, total),
        detail,
    )
    .with_transaction(outcome.transaction_id.clone()))
}
