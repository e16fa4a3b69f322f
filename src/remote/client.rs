//! HTTP implementation of [`PolicyService`].

use super::{
    BatchHeader, BatchOutcome, BatchRequest, BatchResponseItem, DeliveryGroupRecord, ItemList,
    NamedRecord, PolicyRecord, PolicyService, PolicySetBody, PolicySetRecord, RemoteError,
    ResolvedConnection, ServiceVersion, SettingDefinition, SiteInfo,
};
use crate::config::Deployment;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Response header carrying the service's transaction identifier.
pub const TRANSACTION_ID_HEADER: &str = "x-transaction-id";

/// REST client for the orchestration service.
///
/// Handles the request/response contract only:
/// - Snapshot reads via GET on policy-sets, policies and catalogs
/// - Policy set CRUD via POST/PATCH/DELETE
/// - Batched sub-requests via POST /batch
/// - Priority ranking via POST /policy-sets/{id}/rank
pub struct RestClient {
    /// Resolved base URL, headers and timeout
    conn: ResolvedConnection,
    /// Shared HTTP client for connection pooling
    client: Arc<Client>,
}

impl RestClient {
    pub fn new(conn: ResolvedConnection, client: Arc<Client>) -> Self {
        Self { conn, client }
    }

    pub fn connection(&self) -> &ResolvedConnection {
        &self.conn
    }

    fn timeout_ms(&self) -> u64 {
        self.conn.timeout().as_millis() as u64
    }

    fn prepare(&self, builder: RequestBuilder) -> RequestBuilder {
        self.conn
            .headers()
            .iter()
            .fold(builder.timeout(self.conn.timeout()), |b, h| {
                b.header(h.name.as_str(), h.value.as_str())
            })
    }

    async fn send_raw(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        self.prepare(builder)
            .send()
            .await
            .map_err(|e| RemoteError::from_reqwest(e, self.timeout_ms()))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self.send_raw(builder).await?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, relative: &str) -> Result<T, RemoteError> {
        let url = self.conn.url(relative);
        tracing::debug!(url = %url, "GET");
        let response = self.send(self.client.get(&url)).await?;
        parse_json(response).await
    }

    async fn get_items<T: DeserializeOwned>(&self, relative: &str) -> Result<Vec<T>, RemoteError> {
        let list: ItemList<T> = self.get_json(relative).await?;
        Ok(list.items)
    }
}

fn transaction_id(response: &Response) -> Option<String> {
    response
        .headers()
        .get(TRANSACTION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let transaction_id = transaction_id(&response);
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RemoteError::Unauthorized {
            message,
            transaction_id,
        });
    }

    Err(RemoteError::Upstream {
        status: status.as_u16(),
        message,
        transaction_id,
    })
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let body = response.text().await.map_err(|e| {
        RemoteError::InvalidResponse(format!("Failed to read response body: {}", e))
    })?;
    serde_json::from_str(&body)
        .map_err(|e| RemoteError::InvalidResponse(format!("Failed to parse response: {}", e)))
}

#[async_trait]
impl PolicyService for RestClient {
    fn deployment(&self) -> Deployment {
        self.conn.deployment()
    }

    async fn service_version(&self) -> Result<ServiceVersion, RemoteError> {
        let site: SiteInfo = self.get_json("/site").await?;
        ServiceVersion::parse(&site.product_version).ok_or_else(|| {
            RemoteError::InvalidResponse(format!(
                "Unrecognized product version '{}'",
                site.product_version
            ))
        })
    }

    async fn list_policy_sets(&self) -> Result<Vec<PolicySetRecord>, RemoteError> {
        self.get_items("/policy-sets").await
    }

    async fn get_policy_set(&self, id: &str) -> Result<Option<PolicySetRecord>, RemoteError> {
        let url = self.conn.url(&format!("/policy-sets/{}", id));
        let response = self
            .send_raw(self.client.get(&url).query(&[("withPolicies", "true")]))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(policy_set_id = %id, "Policy set not found");
            return Ok(None);
        }

        let response = check_status(response).await?;
        parse_json(response).await.map(Some)
    }

    async fn list_policies(&self, policy_set_id: &str) -> Result<Vec<PolicyRecord>, RemoteError> {
        let url = self.conn.url("/policies");
        let response = self
            .send(self.client.get(&url).query(&[
                ("policySetId", policy_set_id),
                ("withFilters", "true"),
                ("withSettings", "true"),
            ]))
            .await?;
        let list: ItemList<PolicyRecord> = parse_json(response).await?;
        Ok(list.items)
    }

    async fn list_setting_definitions(&self) -> Result<Vec<SettingDefinition>, RemoteError> {
        self.get_items("/setting-definitions").await
    }

    async fn list_delivery_groups(&self) -> Result<Vec<DeliveryGroupRecord>, RemoteError> {
        self.get_items("/delivery-groups").await
    }

    async fn list_tags(&self) -> Result<Vec<NamedRecord>, RemoteError> {
        self.get_items("/tags").await
    }

    async fn list_scopes(&self) -> Result<Vec<NamedRecord>, RemoteError> {
        self.get_items("/scopes").await
    }

    async fn create_policy_set(
        &self,
        body: &PolicySetBody,
    ) -> Result<PolicySetRecord, RemoteError> {
        let url = self.conn.url("/policy-sets");
        let response = self.send(self.client.post(&url).json(body)).await?;
        parse_json(response).await
    }

    async fn update_policy_set(&self, id: &str, body: &PolicySetBody) -> Result<(), RemoteError> {
        let url = self.conn.url(&format!("/policy-sets/{}", id));
        self.send(self.client.patch(&url).json(body)).await?;
        Ok(())
    }

    async fn delete_policy_set(&self, id: &str) -> Result<(), RemoteError> {
        let url = self.conn.url(&format!("/policy-sets/{}", id));
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }

    async fn auth_headers(&self) -> Result<Vec<BatchHeader>, RemoteError> {
        Ok(self.conn.headers().to_vec())
    }

    async fn submit_batch(&self, request: &BatchRequest) -> Result<BatchOutcome, RemoteError> {
        let url = self.conn.url("/batch");
        let response = self.send(self.client.post(&url).json(request)).await?;
        let transaction_id = transaction_id(&response).unwrap_or_default();
        let list: ItemList<BatchResponseItem> = parse_json(response).await?;

        if list.items.len() != request.len() {
            return Err(RemoteError::InvalidResponse(format!(
                "Batch returned {} results for {} items (transaction {})",
                list.items.len(),
                request.len(),
                transaction_id
            )));
        }

        Ok(BatchOutcome::from_response(&list.items, transaction_id))
    }

    async fn rank_policies(
        &self,
        policy_set_id: &str,
        policy_ids: &[String],
    ) -> Result<bool, RemoteError> {
        let url = self.conn.url(&format!("/policy-sets/{}/rank", policy_set_id));
        let response = self.send(self.client.post(&url).json(policy_ids)).await?;
        parse_json(response).await
    }
}
