//! Collaborator calls guarded by the caller's cancellation token.
//!
//! The token is checked immediately before each remote call and nowhere
//! else. A cancelled run stops at the next call boundary and leaves
//! whatever already succeeded in place.

use super::batch::{account, build_batch, BatchStep, Mutation};
use super::diagnostics::Diagnostic;
use crate::remote::{
    BatchOutcome, DeliveryGroupRecord, NamedRecord, PolicyRecord, PolicyService, PolicySetBody,
    PolicySetRecord, RemoteError, ServiceVersion, SettingDefinition,
};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct Session<'a> {
    service: &'a dyn PolicyService,
    cancel: &'a CancellationToken,
    log_bodies: bool,
}

impl<'a> Session<'a> {
    pub fn new(service: &'a dyn PolicyService, cancel: &'a CancellationToken) -> Self {
        Self {
            service,
            cancel,
            log_bodies: false,
        }
    }

    pub fn with_body_logging(mut self, enabled: bool) -> Self {
        self.log_bodies = enabled;
        self
    }

    pub fn service(&self) -> &dyn PolicyService {
        self.service
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.cancel.is_cancelled() {
            Err(RemoteError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub async fn service_version(&self) -> Result<ServiceVersion, RemoteError> {
        self.check()?;
        self.service.service_version().await
    }

    pub async fn list_policy_sets(&self) -> Result<Vec<PolicySetRecord>, RemoteError> {
        self.check()?;
        self.service.list_policy_sets().await
    }

    pub async fn get_policy_set(&self, id: &str) -> Result<Option<PolicySetRecord>, RemoteError> {
        self.check()?;
        self.service.get_policy_set(id).await
    }

    pub async fn list_policies(&self, policy_set_id: &str) -> Result<Vec<PolicyRecord>, RemoteError> {
        self.check()?;
        self.service.list_policies(policy_set_id).await
    }

    pub async fn list_setting_definitions(&self) -> Result<Vec<SettingDefinition>, RemoteError> {
        self.check()?;
        self.service.list_setting_definitions().await
    }

    pub async fn list_delivery_groups(&self) -> Result<Vec<DeliveryGroupRecord>, RemoteError> {
        self.check()?;
        self.service.list_delivery_groups().await
    }

    pub async fn list_tags(&self) -> Result<Vec<NamedRecord>, RemoteError> {
        self.check()?;
        self.service.list_tags().await
    }

    pub async fn list_scopes(&self) -> Result<Vec<NamedRecord>, RemoteError> {
        self.check()?;
        self.service.list_scopes().await
    }

    pub async fn create_policy_set(&self, body: &PolicySetBody) -> Result<PolicySetRecord, RemoteError> {
        self.check()?;
        self.service.create_policy_set(body).await
    }

    pub async fn update_policy_set(&self, id: &str, body: &PolicySetBody) -> Result<(), RemoteError> {
        self.check()?;
        self.service.update_policy_set(id, body).await
    }

    pub async fn delete_policy_set(&self, id: &str) -> Result<(), RemoteError> {
        self.check()?;
        self.service.delete_policy_set(id).await
    }

    pub async fn rank_policies(&self, policy_set_id: &str, ids: &[String]) -> Result<bool, RemoteError> {
        self.check()?;
        self.service.rank_policies(policy_set_id, ids).await
    }

    /// Build, submit and account for one batch.
    ///
    /// Empty mutation lists are never submitted. Transport errors and
    /// partial sub-operation failures both come back as an error diagnostic.
    pub async fn submit(
        &self,
        step: BatchStep,
        mutations: &[Mutation],
    ) -> Result<Option<BatchOutcome>, Diagnostic> {
        if mutations.is_empty() {
            return Ok(None);
        }

        self.check()
            .map_err(|e| Diagnostic::remote(format!("{}: not submitted", step), &e))?;
        let headers = self
            .service
            .auth_headers()
            .await
            .map_err(|e| Diagnostic::remote(format!("{}: failed to obtain session headers", step), &e))?;

        let request = build_batch(&headers, mutations).map_err(|e| {
            Diagnostic::error(format!("{}: failed to encode batch", step), e.to_string())
        })?;

        if self.log_bodies {
            for item in &request.items {
                tracing::debug!(
                    step = %step,
                    reference = %item.reference,
                    method = %item.method,
                    url = %item.relative_url,
                    body = item.body.as_deref().unwrap_or(""),
                    "Batch item"
                );
            }
        }

        let start = Instant::now();
        self.check()
            .map_err(|e| Diagnostic::remote(format!("{}: not submitted", step), &e))?;
        let outcome = self
            .service
            .submit_batch(&request)
            .await
            .map_err(|e| Diagnostic::remote(format!("{}: batch submission failed", step), &e))?;

        metrics::counter!("policyset_batch_items_total", "step" => step.to_string())
            .increment(outcome.total as u64);
        if !outcome.failures.is_empty() {
            metrics::counter!("policyset_batch_failures_total", "step" => step.to_string())
                .increment(outcome.failures.len() as u64);
        }

        tracing::info!(
            step = %step,
            items = outcome.total,
            succeeded = outcome.success_count,
            transaction_id = %outcome.transaction_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch submitted"
        );

        account(step, mutations.len(), &outcome)?;
        Ok(Some(outcome))
    }
}
