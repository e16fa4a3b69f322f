//! Diff engine.
//!
//! Partitions desired policies against the remote snapshot into create,
//! update, delete and rename sets, and recursively diffs settings and
//! filters of updated policies. Every function here is pure: the same
//! inputs always yield the same partitions.

use crate::config::FilterStrategy;
use crate::model::{Filter, Policy, Setting};
use crate::remote::PolicyBody;
use std::collections::{HashMap, HashSet};

/// A policy whose name changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub policy_id: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingChanges {
    pub create: Vec<Setting>,
    /// Desired values carrying the remote identifier to patch.
    pub update: Vec<Setting>,
    /// Remote settings to remove.
    pub delete: Vec<Setting>,
}

impl SettingChanges {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChanges {
    /// Remote filters to remove.
    pub delete: Vec<Filter>,
    pub create: Vec<Filter>,
    /// Remote filters reused as-is.
    pub kept: Vec<Filter>,
}

impl FilterChanges {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.create.is_empty()
    }
}

/// Changes to one existing policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyUpdate {
    pub policy_id: String,
    /// Desired name, description and enabled flag; `None` when unchanged.
    pub attributes: Option<PolicyBody>,
    pub settings: SettingChanges,
    pub filters: FilterChanges,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDiff {
    pub to_create: Vec<Policy>,
    pub to_update: Vec<PolicyUpdate>,
    /// Remote policies absent from the desired set.
    pub to_delete: Vec<Policy>,
    pub renamed: Vec<Rename>,
}

impl PolicyDiff {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty()
            && self.to_update.is_empty()
            && self.to_delete.is_empty()
            && self.renamed.is_empty()
    }
}

pub fn policy_body(policy: &Policy) -> PolicyBody {
    PolicyBody {
        policy_name: policy.name.clone(),
        description: policy.description.clone(),
        is_enabled: policy.enabled,
    }
}

/// Diff settings by case-insensitive name.
pub fn diff_settings(desired: &[Setting], remote: &[Setting]) -> SettingChanges {
    let remote_by_key: HashMap<String, &Setting> = remote.iter().map(|s| (s.key(), s)).collect();
    let desired_keys: HashSet<String> = desired.iter().map(Setting::key).collect();

    let mut changes = SettingChanges::default();
    for setting in desired {
        match remote_by_key.get(&setting.key()) {
            None => changes.create.push(Setting::new(
                setting.name.clone(),
                setting.value.clone(),
            )),
            Some(existing) if existing.value != setting.value => {
                changes
                    .update
                    .push(Setting::new(setting.name.clone(), setting.value.clone()).with_id(existing.id.clone()));
            }
            Some(_) => {}
        }
    }

    changes.delete = remote
        .iter()
        .filter(|s| !desired_keys.contains(&s.key()))
        .cloned()
        .collect();

    changes
}

/// Pair desired filters with remote filters of identical content.
///
/// Returns, per desired filter, the index of the matched remote filter.
fn match_filters(desired: &[Filter], remote: &[Filter]) -> Vec<Option<usize>> {
    let mut used = vec![false; remote.len()];
    desired
        .iter()
        .map(|d| {
            let found = remote
                .iter()
                .enumerate()
                .position(|(i, r)| !used[i] && r.same_content(d));
            if let Some(i) = found {
                used[i] = true;
            }
            found
        })
        .collect()
}

/// Whether the two filter collections hold the same filters, ignoring order and identifiers.
pub fn filters_match(desired: &[Filter], remote: &[Filter]) -> bool {
    desired.len() == remote.len() && match_filters(desired, remote).iter().all(Option::is_some)
}

/// Diff filters of a policy that is being updated.
///
/// `Recreate` clears every remote filter and recreates the desired set;
/// `Preserve` keeps matching remote filters and their identifiers.
pub fn diff_filters(desired: &[Filter], remote: &[Filter], strategy: FilterStrategy) -> FilterChanges {
    match strategy {
        FilterStrategy::Recreate => FilterChanges {
            delete: remote.to_vec(),
            create: desired.iter().map(Filter::without_id).collect(),
            kept: Vec::new(),
        },
        FilterStrategy::Preserve => {
            let matches = match_filters(desired, remote);
            let matched: HashSet<usize> = matches.iter().flatten().copied().collect();

            FilterChanges {
                delete: remote
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !matched.contains(i))
                    .map(|(_, f)| f.clone())
                    .collect(),
                create: desired
                    .iter()
                    .zip(&matches)
                    .filter(|(_, m)| m.is_none())
                    .map(|(f, _)| f.without_id())
                    .collect(),
                kept: matches.iter().flatten().map(|&i| remote[i].clone()).collect(),
            }
        }
    }
}

/// Compute the update for a bound policy, or `None` when nothing differs.
pub fn diff_policy(desired: &Policy, remote: &Policy, strategy: FilterStrategy) -> Option<PolicyUpdate> {
    let attributes_changed = desired.name != remote.name
        || desired.description != remote.description
        || desired.enabled != remote.enabled;
    let settings = diff_settings(&desired.settings, &remote.settings);
    let filters_changed = !filters_match(&desired.filters, &remote.filters);

    if !attributes_changed && settings.is_empty() && !filters_changed {
        return None;
    }

    let filters = if filters_changed || strategy == FilterStrategy::Recreate {
        diff_filters(&desired.filters, &remote.filters, strategy)
    } else {
        FilterChanges {
            kept: remote.filters.clone(),
            ..Default::default()
        }
    };

    Some(PolicyUpdate {
        policy_id: remote.id.clone(),
        attributes: attributes_changed.then(|| policy_body(desired)),
        settings,
        filters,
    })
}

/// Partition desired policies against the remote snapshot.
///
/// Desired policies with an empty identifier are created; those whose
/// identifier resolves remotely are diffed; remote policies whose
/// identifier is absent from the desired set are deleted.
pub fn diff_policies(desired: &[Policy], remote: &[Policy], strategy: FilterStrategy) -> PolicyDiff {
    let remote_by_id: HashMap<&str, &Policy> =
        remote.iter().map(|p| (p.id.as_str(), p)).collect();
    let desired_ids: HashSet<&str> = desired
        .iter()
        .filter(|p| p.is_created())
        .map(|p| p.id.as_str())
        .collect();

    let mut diff = PolicyDiff::default();

    for policy in desired {
        match remote_by_id.get(policy.id.as_str()) {
            Some(existing) if policy.is_created() => {
                if policy.name != existing.name {
                    diff.renamed.push(Rename {
                        policy_id: existing.id.clone(),
                        from: existing.name.clone(),
                        to: policy.name.clone(),
                    });
                }
                if let Some(update) = diff_policy(policy, existing, strategy) {
                    diff.to_update.push(update);
                }
            }
            _ => diff.to_create.push(Policy {
                id: String::new(),
                ..policy.clone()
            }),
        }
    }

    diff.to_delete = remote
        .iter()
        .filter(|p| !desired_ids.contains(p.id.as_str()))
        .cloned()
        .collect();

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FilterData, SettingValue};

    fn ip(addr: &str) -> Filter {
        Filter::new(FilterData::ClientIp(addr.to_string()), true, true)
    }

    fn remote_policy(id: &str, name: &str) -> Policy {
        Policy::new(name)
            .with_id(id)
            .with_setting(Setting::new("IcaRtt", SettingValue::UseDefault).with_id(format!("{}-s", id)))
    }

    #[test]
    fn test_identical_inputs_yield_empty_diff() {
        let remote = vec![
            remote_policy("a", "A").with_filter(ip("10.0.0.1").with_id("f-1")),
            remote_policy("b", "B"),
        ];
        let diff = diff_policies(&remote, &remote, FilterStrategy::Recreate);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_partitions() {
        let remote = vec![remote_policy("a", "A"), remote_policy("b", "B")];
        let desired = vec![
            remote_policy("a", "A2"),
            Policy::new("New").with_setting(Setting::new("IcaRtt", SettingValue::UseDefault)),
        ];

        let diff = diff_policies(&desired, &remote, FilterStrategy::Recreate);

        assert_eq!(diff.to_create.len(), 1);
        assert_eq!(diff.to_create[0].name, "New");
        assert_eq!(diff.to_delete.len(), 1);
        assert_eq!(diff.to_delete[0].id, "b");
        assert_eq!(
            diff.renamed,
            vec![Rename {
                policy_id: "a".to_string(),
                from: "A".to_string(),
                to: "A2".to_string()
            }]
        );
        assert_eq!(diff.to_update.len(), 1);
        assert_eq!(
            diff.to_update[0].attributes.as_ref().unwrap().policy_name,
            "A2"
        );
    }

    #[test]
    fn test_unknown_identifier_becomes_create() {
        let desired = vec![Policy::new("Ghost").with_id("gone")];
        let diff = diff_policies(&desired, &[], FilterStrategy::Recreate);
        assert_eq!(diff.to_create.len(), 1);
        assert!(diff.to_create[0].id.is_empty());
    }

    #[test]
    fn test_setting_partitions() {
        let remote = vec![
            Setting::new("Keep", SettingValue::Enabled(true)).with_id("s-1"),
            Setting::new("Change", SettingValue::Value("1".into())).with_id("s-2"),
            Setting::new("Drop", SettingValue::UseDefault).with_id("s-3"),
        ];
        let desired = vec![
            Setting::new("keep", SettingValue::Enabled(true)),
            Setting::new("Change", SettingValue::Value("2".into())),
            Setting::new("Add", SettingValue::UseDefault),
        ];

        let changes = diff_settings(&desired, &remote);

        assert_eq!(changes.create.len(), 1);
        assert_eq!(changes.create[0].name, "Add");
        assert_eq!(changes.update.len(), 1);
        assert_eq!(changes.update[0].id, "s-2");
        assert_eq!(changes.update[0].value, SettingValue::Value("2".into()));
        assert_eq!(changes.delete.len(), 1);
        assert_eq!(changes.delete[0].id, "s-3");
    }

    #[test]
    fn test_use_default_flip_is_an_update() {
        let remote = vec![Setting::new("X", SettingValue::Value("1".into())).with_id("s-1")];
        let desired = vec![Setting::new("X", SettingValue::UseDefault)];
        let changes = diff_settings(&desired, &remote);
        assert_eq!(changes.update.len(), 1);
    }

    #[test]
    fn test_recreate_clears_all_filters_on_setting_change() {
        let remote = remote_policy("a", "A")
            .with_filter(ip("10.0.0.1").with_id("f-1"))
            .with_filter(ip("10.0.0.2").with_id("f-2"));
        let mut desired = remote.clone();
        desired.settings[0].value = SettingValue::Value("5".into());

        let update = diff_policy(&desired, &remote, FilterStrategy::Recreate).unwrap();
        assert_eq!(update.filters.delete.len(), 2);
        assert_eq!(update.filters.create.len(), 2);
        assert!(update.filters.create.iter().all(|f| f.id.is_empty()));
        assert!(update.attributes.is_none());
    }

    #[test]
    fn test_preserve_reuses_unchanged_filters() {
        let remote = remote_policy("a", "A")
            .with_filter(ip("10.0.0.1").with_id("f-1"))
            .with_filter(ip("10.0.0.2").with_id("f-2"));
        let desired = remote_policy("a", "A")
            .with_filter(ip("10.0.0.1"))
            .with_filter(ip("10.0.0.3"));

        let update = diff_policy(&desired, &remote, FilterStrategy::Preserve).unwrap();
        assert_eq!(update.filters.kept.len(), 1);
        assert_eq!(update.filters.kept[0].id, "f-1");
        assert_eq!(update.filters.delete.len(), 1);
        assert_eq!(update.filters.delete[0].id, "f-2");
        assert_eq!(update.filters.create.len(), 1);
    }

    #[test]
    fn test_preserve_leaves_filters_on_setting_change() {
        let remote = remote_policy("a", "A").with_filter(ip("10.0.0.1").with_id("f-1"));
        let mut desired = remote.clone();
        desired.enabled = false;

        let update = diff_policy(&desired, &remote, FilterStrategy::Preserve).unwrap();
        assert!(update.filters.is_empty());
        assert_eq!(update.filters.kept.len(), 1);
    }

    #[test]
    fn test_filters_match_ignores_order_and_ids() {
        let a = vec![ip("1").with_id("x"), ip("2").with_id("y")];
        let b = vec![ip("2"), ip("1")];
        assert!(filters_match(&b, &a));
        assert!(!filters_match(&b[..1], &a));
        assert!(!filters_match(&[ip("1"), ip("1")], &a));
    }
}
