//! Remote snapshot mapping.
//!
//! Converts wire records into the domain model. Policies are ordered by
//! their remote priority so that list position is priority on both sides
//! of the diff.

use super::diagnostics::Diagnostic;
use super::session::Session;
use crate::model::{Filter, Policy, PolicySet, PolicySetType, Setting};
use crate::remote::{DeliveryGroupRecord, PolicyRecord, PolicySetRecord};

/// Convert one remote policy record.
pub fn policy_from_record(record: &PolicyRecord) -> Result<Policy, Diagnostic> {
    let settings = record
        .settings
        .iter()
        .map(|s| Setting::from_payload(&s.setting_guid, &s.payload))
        .collect();

    let filters = record
        .filters
        .iter()
        .map(|f| Filter::from_payload(&f.filter_guid, &f.payload))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            Diagnostic::error(
                format!("Unreadable filter on policy '{}'", record.policy_name),
                e.to_string(),
            )
        })?;

    Ok(Policy {
        id: record.policy_guid.clone(),
        name: record.policy_name.clone(),
        description: record.description.clone(),
        enabled: record.is_enabled,
        settings,
        filters,
    })
}

/// Convert policy records, ordered by ascending priority value (highest priority first).
pub fn policies_from_records(records: &[PolicyRecord]) -> Result<Vec<Policy>, Diagnostic> {
    let mut ordered: Vec<&PolicyRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.priority);
    ordered.into_iter().map(policy_from_record).collect()
}

/// Assemble a policy set snapshot from its record, its policies and the
/// delivery groups that currently reference it.
pub fn policy_set_from_records(
    record: &PolicySetRecord,
    policies: &[PolicyRecord],
    delivery_groups: &[DeliveryGroupRecord],
) -> Result<PolicySet, Diagnostic> {
    let policy_set_type = if record.policy_set_type.is_empty() {
        PolicySetType::default()
    } else {
        record.policy_set_type.parse::<PolicySetType>().map_err(|e| {
            Diagnostic::error(
                format!("Unreadable policy set '{}'", record.name),
                e,
            )
        })?
    };

    let delivery_groups = delivery_groups
        .iter()
        .filter(|g| g.policy_set_guid.as_deref() == Some(record.policy_set_guid.as_str()))
        .map(|g| g.id.clone())
        .collect();

    Ok(PolicySet {
        id: record.policy_set_guid.clone(),
        name: record.name.clone(),
        policy_set_type,
        description: record.description.clone(),
        scopes: record.scopes.iter().cloned().collect(),
        policies: policies_from_records(policies)?,
        delivery_groups,
    })
}

/// Fetch a fresh snapshot of one policy set.
///
/// Returns `Ok(None)` when the identifier no longer resolves remotely.
pub async fn fetch_policy_set(
    session: &Session<'_>,
    id: &str,
) -> Result<Option<PolicySet>, Diagnostic> {
    let record = match session
        .get_policy_set(id)
        .await
        .map_err(|e| Diagnostic::remote("Failed to read policy set", &e))?
    {
        Some(record) => record,
        None => return Ok(None),
    };

    let policies = session
        .list_policies(id)
        .await
        .map_err(|e| Diagnostic::remote("Failed to read policies", &e))?;
    let groups = session
        .list_delivery_groups()
        .await
        .map_err(|e| Diagnostic::remote("Failed to read delivery groups", &e))?;

    let snapshot = policy_set_from_records(&record, &policies, &groups)?;
    tracing::debug!(
        policy_set_id = %snapshot.id,
        policies = snapshot.policies.len(),
        delivery_groups = snapshot.delivery_groups.len(),
        "Fetched remote snapshot"
    );
    Ok(Some(snapshot))
}
