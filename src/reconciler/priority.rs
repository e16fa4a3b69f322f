//! Priority reconciler.
//!
//! Policy order is priority. After membership has been reconciled, the
//! desired name order is translated into identifiers using a fresh remote
//! snapshot and submitted as one rank request; the service replaces the
//! whole order atomically.

use crate::model::Policy;
use std::collections::HashMap;

/// Whether the remote order already matches the desired order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityState {
    Unordered,
    Ordered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankPlan {
    pub state: PriorityState,
    /// Full desired order as remote identifiers.
    pub order: Vec<String>,
    /// Desired names with no remote counterpart, skipped.
    pub skipped: Vec<String>,
}

impl RankPlan {
    pub fn needs_rank(&self) -> bool {
        self.state == PriorityState::Unordered
    }
}

/// Translate the desired order into identifiers against the current remote policies.
pub fn plan_rank(desired_names: &[String], remote: &[Policy]) -> RankPlan {
    let ids_by_name: HashMap<String, &str> =
        remote.iter().map(|p| (p.key(), p.id.as_str())).collect();

    let mut order = Vec::with_capacity(desired_names.len());
    let mut skipped = Vec::new();
    for name in desired_names {
        match ids_by_name.get(&name.to_lowercase()) {
            Some(id) => order.push(id.to_string()),
            None => skipped.push(name.clone()),
        }
    }

    let current: Vec<&str> = remote.iter().map(|p| p.id.as_str()).collect();
    let state = if order.iter().map(String::as_str).eq(current.iter().copied()) {
        PriorityState::Ordered
    } else {
        PriorityState::Unordered
    };

    RankPlan {
        state,
        order,
        skipped,
    }
}

/// Predict whether applying will require a rank request.
///
/// Surviving remote policies keep their relative order and new policies
/// are appended, so the prediction compares that projected order with the
/// desired one.
pub fn predict_reorder(desired: &[Policy], remote: &[Policy]) -> bool {
    let final_names: HashMap<&str, String> = desired
        .iter()
        .filter(|p| p.is_created())
        .map(|p| (p.id.as_str(), p.key()))
        .collect();

    let mut projected: Vec<String> = remote
        .iter()
        .filter_map(|p| final_names.get(p.id.as_str()).cloned())
        .collect();
    projected.extend(
        desired
            .iter()
            .filter(|p| !remote.iter().any(|r| r.id == p.id && p.is_created()))
            .map(Policy::key),
    );

    let wanted: Vec<String> = desired.iter().map(Policy::key).collect();
    projected != wanted
}
