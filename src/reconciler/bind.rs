//! Identity binding.
//!
//! No local state is kept between runs, so desired items are bound to
//! remote identifiers before diffing: explicit identifiers win when they
//! still resolve, and everything else binds by case-insensitive name.

use super::diagnostics::{Diagnostic, Diagnostics};
use crate::model::PolicySet;
use crate::remote::PolicySetRecord;
use std::collections::HashSet;

/// Resolve the remote identifier of the desired policy set.
///
/// Returns `None` when the set does not exist yet. A stale explicit
/// identifier is reported and resolution falls back to the name.
pub fn resolve_policy_set_id(
    desired: &PolicySet,
    remote_sets: &[PolicySetRecord],
    warnings: &mut Diagnostics,
) -> Option<String> {
    if !desired.id.is_empty() {
        if remote_sets.iter().any(|s| s.policy_set_guid == desired.id) {
            return Some(desired.id.clone());
        }
        warnings.push(Diagnostic::warning(
            format!("Policy set '{}' not found by identifier", desired.name),
            format!(
                "identifier {} no longer exists; resolving by name",
                desired.id
            ),
        ));
    }

    let name = desired.name.to_lowercase();
    remote_sets
        .iter()
        .find(|s| s.name.to_lowercase() == name)
        .map(|s| s.policy_set_guid.clone())
}

/// Bind desired policies to remote identifiers, in place.
///
/// Explicit identifiers present remotely are kept. Explicit identifiers
/// that no longer resolve are cleared (the policy will be created) and
/// reported as warnings. Policies without an identifier then claim the
/// unclaimed remote policy with the same name, if any.
pub fn bind_policies(desired: &mut PolicySet, remote: Option<&PolicySet>) -> Diagnostics {
    let mut warnings = Diagnostics::new();
    let remote_policies = remote.map(|r| r.policies.as_slice()).unwrap_or_default();
    let remote_ids: HashSet<&str> = remote_policies.iter().map(|p| p.id.as_str()).collect();

    let mut claimed: HashSet<String> = HashSet::new();
    for policy in desired.policies.iter_mut().filter(|p| p.is_created()) {
        if remote_ids.contains(policy.id.as_str()) {
            claimed.insert(policy.id.clone());
        } else {
            warnings.push(Diagnostic::warning(
                format!("Policy '{}' not found by identifier", policy.name),
                format!("identifier {} no longer exists; it will be created", policy.id),
            ));
            policy.id.clear();
        }
    }

    for policy in desired.policies.iter_mut().filter(|p| !p.is_created()) {
        let key = policy.key();
        if let Some(existing) = remote_policies
            .iter()
            .find(|r| !claimed.contains(&r.id) && r.key() == key)
        {
            claimed.insert(existing.id.clone());
            policy.id = existing.id.clone();
        }
    }

    warnings
}
