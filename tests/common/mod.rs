//! Shared test utilities for policyset integration tests.
//!
//! Provides an in-memory `PolicyService` that behaves like the remote
//! orchestration service closely enough to exercise full reconciliation
//! runs: unique policy names, children blocking policy deletes, priority
//! ordering and per-item batch results.

#![allow(dead_code)]

use async_trait::async_trait;
use policyset::config::{Deployment, ReconcileConfig};
use policyset::model::{
    Filter, FilterPayload, Policy, PolicySet, Setting, SettingPayload, SettingValue,
    DEFAULT_POLICY_SET_ID, DEFAULT_POLICY_SET_NAME,
};
use policyset::reconciler::PolicySetReconciler;
use policyset::remote::{
    AssociationBody, BatchHeader, BatchItem, BatchMethod, BatchOutcome, BatchRequest,
    BatchResponseItem, DeliveryGroupRecord, FilterRecord, NamedRecord, PolicyBody, PolicyRecord,
    PolicyService, PolicySetBody, PolicySetRecord, RemoteError, ServiceVersion,
    SettingDefinition, SettingRecord,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

// =============================================================================
// Well-Known Test Constants
// =============================================================================

/// Non-user setting present in the default catalog.
pub const MACHINE_SETTING: &str = "IcaRtt";

/// User setting present in the default catalog.
pub const USER_SETTING: &str = "ClipboardRedirection";

/// Second user setting present in the default catalog.
pub const OTHER_USER_SETTING: &str = "AutoConnectDrives";

// =============================================================================
// Fake Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct StoredPolicy {
    pub id: String,
    pub set_id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub priority: i32,
    pub settings: Vec<SettingRecord>,
    pub filters: Vec<FilterRecord>,
}

impl StoredPolicy {
    fn to_record(&self) -> PolicyRecord {
        PolicyRecord {
            policy_guid: self.id.clone(),
            policy_name: self.name.clone(),
            description: self.description.clone(),
            is_enabled: self.enabled,
            priority: self.priority,
            settings: self.settings.clone(),
            filters: self.filters.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub sets: Vec<PolicySetRecord>,
    pub policies: Vec<StoredPolicy>,
    pub delivery_groups: Vec<DeliveryGroupRecord>,
    pub catalog: Vec<SettingDefinition>,
    pub tags: Vec<NamedRecord>,
    pub scopes: Vec<NamedRecord>,
    pub version: String,
    /// Every collaborator call, by method name.
    pub calls: Vec<String>,
    pub batches: Vec<BatchRequest>,
    pub ranks: Vec<(String, Vec<String>)>,
    /// Sub-operations rejected because a policy name was already taken.
    pub name_conflicts: usize,
    /// Item indices of the next batch that fail with 500.
    pub fail_next: Vec<usize>,
    pub reject_rank: bool,
    next_id: usize,
    next_tx: usize,
}

impl FakeState {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn name_taken(&self, set_id: &str, name: &str, except: Option<&str>) -> bool {
        let key = name.to_lowercase();
        self.policies.iter().any(|p| {
            p.set_id == set_id && p.name.to_lowercase() == key && Some(p.id.as_str()) != except
        })
    }

    fn policy_mut(&mut self, id: &str) -> Option<&mut StoredPolicy> {
        self.policies.iter_mut().find(|p| p.id == id)
    }

    fn apply_item(&mut self, item: &BatchItem) -> (u16, Option<String>) {
        let (path, query) = match item.relative_url.split_once('?') {
            Some((p, q)) => (p, q),
            None => (item.relative_url.as_str(), ""),
        };
        let params: HashMap<&str, &str> = query
            .split('&')
            .filter_map(|kv| kv.split_once('='))
            .collect();
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let body = item.body.as_deref().unwrap_or("");

        match (item.method, segments.as_slice()) {
            (BatchMethod::Post, ["policies"]) => {
                let Some(set_id) = params.get("policySetId").map(|s| s.to_string()) else {
                    return (400, Some("missing policySetId".into()));
                };
                let Ok(policy) = serde_json::from_str::<PolicyBody>(body) else {
                    return (400, Some("invalid policy body".into()));
                };
                if self.name_taken(&set_id, &policy.policy_name, None) {
                    self.name_conflicts += 1;
                    return (409, Some(format!("policy {} already exists", policy.policy_name)));
                }
                let priority = self
                    .policies
                    .iter()
                    .filter(|p| p.set_id == set_id)
                    .map(|p| p.priority)
                    .max()
                    .unwrap_or(0)
                    + 1;
                let id = self.id("p");
                self.policies.push(StoredPolicy {
                    id: id.clone(),
                    set_id,
                    name: policy.policy_name,
                    description: policy.description,
                    enabled: policy.is_enabled,
                    priority,
                    settings: Vec::new(),
                    filters: Vec::new(),
                });
                (201, Some(id))
            }
            (BatchMethod::Patch, ["policies", id]) => {
                let Ok(patch) = serde_json::from_str::<serde_json::Value>(body) else {
                    return (400, Some("invalid policy body".into()));
                };
                let Some(set_id) = self
                    .policies
                    .iter()
                    .find(|p| p.id == *id)
                    .map(|p| p.set_id.clone())
                else {
                    return (404, Some(format!("policy {} not found", id)));
                };
                if let Some(name) = patch["policyName"].as_str() {
                    if self.name_taken(&set_id, name, Some(*id)) {
                        self.name_conflicts += 1;
                        return (409, Some(format!("policy {} already exists", name)));
                    }
                }
                let Some(policy) = self.policy_mut(id) else {
                    return (404, None);
                };
                if let Some(name) = patch["policyName"].as_str() {
                    policy.name = name.to_string();
                }
                if let Some(description) = patch["description"].as_str() {
                    policy.description = description.to_string();
                }
                if let Some(enabled) = patch["isEnabled"].as_bool() {
                    policy.enabled = enabled;
                }
                (204, None)
            }
            (BatchMethod::Delete, ["policies", id]) => {
                let Some(index) = self.policies.iter().position(|p| p.id == *id) else {
                    return (404, Some(format!("policy {} not found", id)));
                };
                let policy = &self.policies[index];
                if !policy.settings.is_empty() || !policy.filters.is_empty() {
                    return (409, Some("policy still has settings or filters".into()));
                }
                self.policies.remove(index);
                (204, None)
            }
            (BatchMethod::Post, ["settings"]) => {
                let policy_id = params.get("policyId").copied().unwrap_or_default();
                let Ok(payload) = serde_json::from_str::<SettingPayload>(body) else {
                    return (400, Some("invalid setting body".into()));
                };
                let id = self.id("s");
                let Some(policy) = self.policy_mut(policy_id) else {
                    return (404, Some(format!("policy {} not found", policy_id)));
                };
                let key = payload.setting_name.to_lowercase();
                if policy
                    .settings
                    .iter()
                    .any(|s| s.payload.setting_name.to_lowercase() == key)
                {
                    return (409, Some(format!("setting {} already set", payload.setting_name)));
                }
                policy.settings.push(SettingRecord {
                    setting_guid: id.clone(),
                    payload,
                });
                (201, Some(id))
            }
            (BatchMethod::Patch, ["settings", id]) => {
                let Ok(payload) = serde_json::from_str::<SettingPayload>(body) else {
                    return (400, Some("invalid setting body".into()));
                };
                match self
                    .policies
                    .iter_mut()
                    .flat_map(|p| p.settings.iter_mut())
                    .find(|s| s.setting_guid == *id)
                {
                    Some(setting) => {
                        setting.payload = payload;
                        (204, None)
                    }
                    None => (404, Some(format!("setting {} not found", id))),
                }
            }
            (BatchMethod::Delete, ["settings", id]) => {
                for policy in &mut self.policies {
                    if let Some(i) = policy.settings.iter().position(|s| s.setting_guid == *id) {
                        policy.settings.remove(i);
                        return (204, None);
                    }
                }
                (404, Some(format!("setting {} not found", id)))
            }
            (BatchMethod::Post, ["filters"]) => {
                let policy_id = params.get("policyId").copied().unwrap_or_default();
                let Ok(payload) = serde_json::from_str::<FilterPayload>(body) else {
                    return (400, Some("invalid filter body".into()));
                };
                let id = self.id("f");
                match self.policy_mut(policy_id) {
                    Some(policy) => {
                        policy.filters.push(FilterRecord {
                            filter_guid: id.clone(),
                            payload,
                        });
                        (201, Some(id))
                    }
                    None => (404, Some(format!("policy {} not found", policy_id))),
                }
            }
            (BatchMethod::Delete, ["filters", id]) => {
                for policy in &mut self.policies {
                    if let Some(i) = policy.filters.iter().position(|f| f.filter_guid == *id) {
                        policy.filters.remove(i);
                        return (204, None);
                    }
                }
                (404, Some(format!("filter {} not found", id)))
            }
            (BatchMethod::Patch, ["delivery-groups", id]) => {
                let Ok(association) = serde_json::from_str::<AssociationBody>(body) else {
                    return (400, Some("invalid association body".into()));
                };
                match self.delivery_groups.iter_mut().find(|g| g.id == *id) {
                    Some(group) => {
                        group.policy_set_guid = Some(association.policy_set_guid);
                        (204, None)
                    }
                    None => (404, Some(format!("delivery group {} not found", id))),
                }
            }
            _ => (400, Some(format!("unsupported {} {}", item.method, item.relative_url))),
        }
    }
}

/// In-memory stand-in for the remote orchestration service.
pub struct FakePolicyService {
    deployment: Deployment,
    state: Mutex<FakeState>,
}

impl FakePolicyService {
    /// Cloud deployment holding only the default policy set and a small catalog.
    pub fn cloud() -> Self {
        Self::new(Deployment::Cloud, "7.45.0.10")
    }

    pub fn on_premises(version: &str) -> Self {
        Self::new(Deployment::OnPremises, version)
    }

    fn new(deployment: Deployment, version: &str) -> Self {
        let state = FakeState {
            sets: vec![PolicySetRecord {
                policy_set_guid: DEFAULT_POLICY_SET_ID.to_string(),
                name: DEFAULT_POLICY_SET_NAME.to_string(),
                policy_set_type: "SitePolicies".to_string(),
                description: String::new(),
                scopes: Vec::new(),
                is_assigned: true,
                policies: None,
            }],
            catalog: vec![
                definition(MACHINE_SETTING, false),
                definition(USER_SETTING, true),
                definition(OTHER_USER_SETTING, true),
            ],
            version: version.to_string(),
            ..Default::default()
        };
        Self {
            deployment,
            state: Mutex::new(state),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: &str) -> MutexGuard<'_, FakeState> {
        let mut state = self.state();
        state.calls.push(call.to_string());
        state
    }

    // -------------------------------------------------------------------------
    // Seeding
    // -------------------------------------------------------------------------

    pub fn seed_set(&self, name: &str) -> String {
        let mut state = self.state();
        let id = state.id("ps");
        state.sets.push(PolicySetRecord {
            policy_set_guid: id.clone(),
            name: name.to_string(),
            policy_set_type: "DeliveryGroupPolicies".to_string(),
            description: String::new(),
            scopes: Vec::new(),
            is_assigned: false,
            policies: None,
        });
        id
    }

    /// Add a policy at the lowest priority of `set_id`.
    pub fn seed_policy(&self, set_id: &str, policy: &Policy) -> String {
        let mut state = self.state();
        let id = state.id("p");
        let priority = state
            .policies
            .iter()
            .filter(|p| p.set_id == set_id)
            .count() as i32
            + 1;
        let mut settings = Vec::new();
        for setting in &policy.settings {
            let setting_id = state.id("s");
            settings.push(SettingRecord {
                setting_guid: setting_id,
                payload: setting.to_payload(),
            });
        }
        let mut filters = Vec::new();
        for filter in &policy.filters {
            let filter_id = state.id("f");
            filters.push(FilterRecord {
                filter_guid: filter_id,
                payload: filter.to_payload().unwrap(),
            });
        }
        state.policies.push(StoredPolicy {
            id: id.clone(),
            set_id: set_id.to_string(),
            name: policy.name.clone(),
            description: policy.description.clone(),
            enabled: policy.enabled,
            priority,
            settings,
            filters,
        });
        id
    }

    pub fn seed_delivery_group(&self, id: &str, policy_set_id: Option<&str>) {
        self.state().delivery_groups.push(DeliveryGroupRecord {
            id: id.to_string(),
            name: format!("Group {}", id),
            policy_set_guid: policy_set_id.map(str::to_string),
        });
    }

    pub fn seed_tag(&self, id: &str, name: &str) {
        self.state().tags.push(NamedRecord {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn seed_scope(&self, id: &str, name: &str) {
        self.state().scopes.push(NamedRecord {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn fail_next_batch_items(&self, indices: Vec<usize>) {
        self.state().fail_next = indices;
    }

    pub fn reject_rank(&self) {
        self.state().reject_rank = true;
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == call).count()
    }

    pub fn batches(&self) -> Vec<BatchRequest> {
        self.state().batches.clone()
    }

    pub fn ranks(&self) -> Vec<(String, Vec<String>)> {
        self.state().ranks.clone()
    }

    pub fn name_conflicts(&self) -> usize {
        self.state().name_conflicts
    }

    pub fn set_id(&self, name: &str) -> Option<String> {
        self.state()
            .sets
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.policy_set_guid.clone())
    }

    /// Policy names of a set in priority order.
    pub fn policy_names(&self, set_id: &str) -> Vec<String> {
        let state = self.state();
        let mut policies: Vec<&StoredPolicy> =
            state.policies.iter().filter(|p| p.set_id == set_id).collect();
        policies.sort_by_key(|p| p.priority);
        policies.into_iter().map(|p| p.name.clone()).collect()
    }

    pub fn policy(&self, id: &str) -> Option<StoredPolicy> {
        self.state().policies.iter().find(|p| p.id == id).cloned()
    }

    pub fn association(&self, delivery_group_id: &str) -> Option<String> {
        self.state()
            .delivery_groups
            .iter()
            .find(|g| g.id == delivery_group_id)
            .and_then(|g| g.policy_set_guid.clone())
    }
}

#[async_trait]
impl PolicyService for FakePolicyService {
    fn deployment(&self) -> Deployment {
        self.deployment
    }

    async fn service_version(&self) -> Result<ServiceVersion, RemoteError> {
        let state = self.record("service_version");
        ServiceVersion::parse(&state.version)
            .ok_or_else(|| RemoteError::InvalidResponse(format!("bad version {}", state.version)))
    }

    async fn list_policy_sets(&self) -> Result<Vec<PolicySetRecord>, RemoteError> {
        Ok(self.record("list_policy_sets").sets.clone())
    }

    async fn get_policy_set(&self, id: &str) -> Result<Option<PolicySetRecord>, RemoteError> {
        let state = self.record("get_policy_set");
        Ok(state.sets.iter().find(|s| s.policy_set_guid == id).cloned())
    }

    async fn list_policies(&self, policy_set_id: &str) -> Result<Vec<PolicyRecord>, RemoteError> {
        let state = self.record("list_policies");
        Ok(state
            .policies
            .iter()
            .filter(|p| p.set_id == policy_set_id)
            .map(StoredPolicy::to_record)
            .collect())
    }

    async fn list_setting_definitions(&self) -> Result<Vec<SettingDefinition>, RemoteError> {
        Ok(self.record("list_setting_definitions").catalog.clone())
    }

    async fn list_delivery_groups(&self) -> Result<Vec<DeliveryGroupRecord>, RemoteError> {
        Ok(self.record("list_delivery_groups").delivery_groups.clone())
    }

    async fn list_tags(&self) -> Result<Vec<NamedRecord>, RemoteError> {
        Ok(self.record("list_tags").tags.clone())
    }

    async fn list_scopes(&self) -> Result<Vec<NamedRecord>, RemoteError> {
        Ok(self.record("list_scopes").scopes.clone())
    }

    async fn create_policy_set(
        &self,
        body: &PolicySetBody,
    ) -> Result<PolicySetRecord, RemoteError> {
        let mut state = self.record("create_policy_set");
        let key = body.name.to_lowercase();
        if state.sets.iter().any(|s| s.name.to_lowercase() == key) {
            return Err(upstream(409, "policy set name already exists"));
        }
        let id = state.id("ps");
        let record = PolicySetRecord {
            policy_set_guid: id,
            name: body.name.clone(),
            policy_set_type: body.policy_set_type.clone(),
            description: body.description.clone(),
            scopes: body.scopes.clone(),
            is_assigned: false,
            policies: None,
        };
        state.sets.push(record.clone());
        Ok(record)
    }

    async fn update_policy_set(&self, id: &str, body: &PolicySetBody) -> Result<(), RemoteError> {
        let mut state = self.record("update_policy_set");
        let Some(set) = state.sets.iter_mut().find(|s| s.policy_set_guid == id) else {
            return Err(upstream(404, "policy set not found"));
        };
        set.name = body.name.clone();
        set.description = body.description.clone();
        set.policy_set_type = body.policy_set_type.clone();
        set.scopes = body.scopes.clone();
        Ok(())
    }

    async fn delete_policy_set(&self, id: &str) -> Result<(), RemoteError> {
        let mut state = self.record("delete_policy_set");
        if id == DEFAULT_POLICY_SET_ID {
            return Err(upstream(400, "the default policy set cannot be deleted"));
        }
        if state.policies.iter().any(|p| p.set_id == id) {
            return Err(upstream(409, "policy set still has policies"));
        }
        let before = state.sets.len();
        state.sets.retain(|s| s.policy_set_guid != id);
        if state.sets.len() == before {
            return Err(upstream(404, "policy set not found"));
        }
        Ok(())
    }

    async fn auth_headers(&self) -> Result<Vec<BatchHeader>, RemoteError> {
        drop(self.record("auth_headers"));
        Ok(vec![BatchHeader::new("Authorization", "Bearer test-token")])
    }

    async fn submit_batch(&self, request: &BatchRequest) -> Result<BatchOutcome, RemoteError> {
        let mut state = self.record("submit_batch");
        state.batches.push(request.clone());
        state.next_tx += 1;
        let transaction_id = format!("tx-{}", state.next_tx);
        let failing = std::mem::take(&mut state.fail_next);

        let items: Vec<BatchResponseItem> = request
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let (code, body) = if failing.contains(&i) {
                    (500, Some("injected failure".to_string()))
                } else {
                    state.apply_item(item)
                };
                BatchResponseItem {
                    reference: item.reference.clone(),
                    code,
                    body,
                }
            })
            .collect();

        Ok(BatchOutcome::from_response(&items, transaction_id))
    }

    async fn rank_policies(
        &self,
        policy_set_id: &str,
        policy_ids: &[String],
    ) -> Result<bool, RemoteError> {
        let mut state = self.record("rank_policies");
        state
            .ranks
            .push((policy_set_id.to_string(), policy_ids.to_vec()));
        if state.reject_rank {
            return Ok(false);
        }
        for (i, id) in policy_ids.iter().enumerate() {
            match state
                .policies
                .iter_mut()
                .find(|p| p.id == *id && p.set_id == policy_set_id)
            {
                Some(policy) => policy.priority = i as i32 + 1,
                None => return Err(upstream(400, "unknown policy in rank request")),
            }
        }
        Ok(true)
    }
}

fn upstream(status: u16, message: &str) -> RemoteError {
    RemoteError::Upstream {
        status,
        message: message.to_string(),
        transaction_id: Some(format!("tx-err-{}", status)),
    }
}

// =============================================================================
// Builders
// =============================================================================

pub fn definition(name: &str, is_user_setting: bool) -> SettingDefinition {
    SettingDefinition {
        setting_name: name.to_string(),
        is_user_setting,
    }
}

/// Policy carrying only the machine setting.
pub fn machine_policy(name: &str) -> Policy {
    Policy::new(name).with_setting(Setting::new(MACHINE_SETTING, SettingValue::UseDefault))
}

/// Policy carrying a user setting, so it may hold any filter.
pub fn user_policy(name: &str) -> Policy {
    Policy::new(name).with_setting(Setting::new(
        USER_SETTING,
        SettingValue::Enabled(true),
    ))
}

pub fn desired_set(name: &str, policies: Vec<Policy>) -> PolicySet {
    PolicySet {
        policies,
        ..PolicySet::new(name)
    }
}

pub fn reconciler(service: &Arc<FakePolicyService>) -> PolicySetReconciler {
    reconciler_with(service, ReconcileConfig::default())
}

pub fn reconciler_with(
    service: &Arc<FakePolicyService>,
    config: ReconcileConfig,
) -> PolicySetReconciler {
    PolicySetReconciler::new(service.clone(), config)
}

/// References of a recorded batch, in submission order.
pub fn references(request: &BatchRequest) -> Vec<String> {
    request.items.iter().map(|i| i.reference.clone()).collect()
}

/// Filter helper re-exported for tests that build desired filters.
pub fn client_name_filter(value: &str) -> Filter {
    Filter::new(
        policyset::model::FilterData::ClientName(value.to_string()),
        true,
        true,
    )
}
