//! Collision-avoiding renamer.
//!
//! The remote service enforces unique policy names at all times, so a swap
//! such as `A: X -> Y`, `B: Y -> X` cannot be applied directly. Before any
//! create or real rename, every renamed policy is moved to its own
//! identifier as a temporary name; the update pass then assigns the real
//! names.

use super::batch::Mutation;
use super::diff::PolicyDiff;
use std::collections::HashSet;

/// Longest policy name the service accepts.
pub const MAX_POLICY_NAME_LEN: usize = 64;

/// Characters the service rejects in policy names.
pub const INVALID_NAME_CHARS: &[char] = &[
    '\\', '/', ';', ':', '#', '.', '*', '?', '=', '<', '>', '|', '[', ']', '(', ')', '"', '\'',
];

/// Check a policy name against the service's naming rules.
pub fn check_policy_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("name cannot be empty".to_string());
    }
    if name.chars().count() > MAX_POLICY_NAME_LEN {
        return Err(format!(
            "name is longer than {} characters",
            MAX_POLICY_NAME_LEN
        ));
    }
    if let Some(c) = name.chars().find(|c| INVALID_NAME_CHARS.contains(c)) {
        return Err(format!("name contains invalid character '{}'", c));
    }
    Ok(())
}

/// Placeholder names are the policy identifiers themselves.
pub fn placeholder_name(policy_id: &str) -> &str {
    policy_id
}

/// Policies that must move to a placeholder name before creates run.
///
/// This is every renamed policy, plus any policy about to be deleted whose
/// current name is claimed by a policy about to be created.
pub fn placeholder_targets(diff: &PolicyDiff) -> Vec<String> {
    let created: HashSet<String> = diff.to_create.iter().map(|p| p.key()).collect();

    let mut targets: Vec<String> = diff.renamed.iter().map(|r| r.policy_id.clone()).collect();
    targets.extend(
        diff.to_delete
            .iter()
            .filter(|p| created.contains(&p.key()))
            .map(|p| p.id.clone()),
    );
    targets
}

/// Name-only patches moving each target to its placeholder.
pub fn placeholder_mutations(policy_ids: &[String]) -> Vec<Mutation> {
    policy_ids
        .iter()
        .map(|id| Mutation::RenamePolicy {
            policy_id: id.clone(),
            name: placeholder_name(id).to_string(),
        })
        .collect()
}
