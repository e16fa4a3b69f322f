//! Remote orchestration service abstraction.
//!
//! This module provides the `PolicyService` trait the reconciler talks to,
//! the wire types it exchanges, and `RestClient`, the HTTP implementation.
//! Transport retries and token acquisition live outside the engine; every
//! method here is a single request whose failure is surfaced verbatim.

use async_trait::async_trait;

pub mod client;
pub mod connection;
pub mod error;
pub mod types;

pub use client::RestClient;
pub use connection::ResolvedConnection;
pub use error::RemoteError;
pub use types::{
    AssociationBody, BatchHeader, BatchItem, BatchItemFailure, BatchMethod, BatchOutcome,
    BatchRequest, BatchResponseItem, DeliveryGroupRecord, FilterRecord, ItemList, NamedRecord,
    PolicyBody, PolicyRecord, PolicySetBody, PolicySetRecord, ServiceVersion, SettingDefinition,
    SettingRecord, SiteInfo,
};

use crate::config::Deployment;

/// Request/response contract of the remote orchestration service.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn PolicyService>`.
#[async_trait]
pub trait PolicyService: Send + Sync {
    /// Cloud or on-premises target.
    fn deployment(&self) -> Deployment;

    /// Product version of the connected site.
    async fn service_version(&self) -> Result<ServiceVersion, RemoteError>;

    // ========================================================================
    // Snapshot reads
    // ========================================================================

    /// `GET policy-sets`
    async fn list_policy_sets(&self) -> Result<Vec<PolicySetRecord>, RemoteError>;

    /// `GET policy-sets/{id}?withPolicies=true`
    ///
    /// Returns `Ok(None)` when the identifier no longer resolves.
    async fn get_policy_set(&self, id: &str) -> Result<Option<PolicySetRecord>, RemoteError>;

    /// `GET policies?policySetId={id}&withFilters=true&withSettings=true`
    async fn list_policies(&self, policy_set_id: &str) -> Result<Vec<PolicyRecord>, RemoteError>;

    /// Setting-definition catalog used to classify user settings.
    async fn list_setting_definitions(&self) -> Result<Vec<SettingDefinition>, RemoteError>;

    async fn list_delivery_groups(&self) -> Result<Vec<DeliveryGroupRecord>, RemoteError>;

    async fn list_tags(&self) -> Result<Vec<NamedRecord>, RemoteError>;

    async fn list_scopes(&self) -> Result<Vec<NamedRecord>, RemoteError>;

    // ========================================================================
    // Policy set CRUD
    // ========================================================================

    /// `POST policy-sets`
    async fn create_policy_set(&self, body: &PolicySetBody)
        -> Result<PolicySetRecord, RemoteError>;

    /// `PATCH policy-sets/{id}`
    async fn update_policy_set(&self, id: &str, body: &PolicySetBody) -> Result<(), RemoteError>;

    /// `DELETE policy-sets/{id}`
    async fn delete_policy_set(&self, id: &str) -> Result<(), RemoteError>;

    // ========================================================================
    // Batching and ordering
    // ========================================================================

    /// Header set every batch item carries, fetched once per batch.
    async fn auth_headers(&self) -> Result<Vec<BatchHeader>, RemoteError>;

    /// Submit a batch. Individual sub-operation failures are reported in the
    /// outcome and never abort siblings; `Err` means the batch itself failed.
    async fn submit_batch(&self, request: &BatchRequest) -> Result<BatchOutcome, RemoteError>;

    /// `POST policy-sets/{id}/rank`, replacing the entire policy order atomically.
    async fn rank_policies(
        &self,
        policy_set_id: &str,
        policy_ids: &[String],
    ) -> Result<bool, RemoteError>;
}
