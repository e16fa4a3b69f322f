//! Association reconciler.
//!
//! Every delivery group references exactly one policy set. Leaving a set
//! is expressed as re-associating with the default set; removals are
//! submitted before additions.

use super::batch::Mutation;
use crate::model::DEFAULT_POLICY_SET_ID;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationPlan {
    /// Delivery groups that leave this policy set.
    pub to_remove: Vec<String>,
    /// Delivery groups that join this policy set.
    pub to_add: Vec<String>,
}

impl AssociationPlan {
    pub fn compute(prior: &BTreeSet<String>, desired: &BTreeSet<String>) -> Self {
        Self {
            to_remove: prior.difference(desired).cloned().collect(),
            to_add: desired.difference(prior).cloned().collect(),
        }
    }

    /// Associations of the policy set `policy_set_id`. The default set
    /// holds every delivery group no other set claims, so it is never diffed.
    pub fn for_policy_set(policy_set_id: &str, prior: &BTreeSet<String>, desired: &BTreeSet<String>) -> Self {
        if policy_set_id == DEFAULT_POLICY_SET_ID {
            return Self::default();
        }
        Self::compute(prior, desired)
    }

    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }

    /// Patches pointing leaving delivery groups at the default policy set.
    pub fn removal_mutations(&self) -> Vec<Mutation> {
        self.to_remove
            .iter()
            .map(|dg| Mutation::AssociatePolicySet {
                delivery_group_id: dg.clone(),
                policy_set_id: DEFAULT_POLICY_SET_ID.to_string(),
            })
            .collect()
    }

    pub fn add_mutations(&self, policy_set_id: &str) -> Vec<Mutation> {
        self.to_add
            .iter()
            .map(|dg| Mutation::AssociatePolicySet {
                delivery_group_id: dg.clone(),
                policy_set_id: policy_set_id.to_string(),
            })
            .collect()
    }
}
