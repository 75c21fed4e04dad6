pub mod maintenance;
pub mod technician;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    ErrorBody, MaintenanceRequest, NewMaintenanceRequest, ProposalPayload, RequestUpdate,
    StatusPatch, TechnicianStats, WriteEnvelope,
};
use crate::services::image_service::normalize_record;
use crate::session::Session;

/// The backend that owns maintenance requests. Writes return the stored
/// record when the backend sends it back, `None` for a bare acknowledgement.
#[async_trait]
pub trait MaintenanceBackend: Send + Sync {
    async fn list_for_tenant(
        &self,
        session: &Session,
        user_id: i64,
    ) -> ClientResult<Vec<MaintenanceRequest>>;

    async fn list_for_technician(
        &self,
        session: &Session,
        technician_id: i64,
    ) -> ClientResult<Vec<MaintenanceRequest>>;

    async fn pending_for_technician(
        &self,
        session: &Session,
        technician_id: i64,
    ) -> ClientResult<Vec<MaintenanceRequest>>;

    async fn technician_stats(
        &self,
        session: &Session,
        technician_id: i64,
    ) -> ClientResult<TechnicianStats>;

    async fn create(
        &self,
        session: &Session,
        request: &NewMaintenanceRequest,
    ) -> ClientResult<Option<MaintenanceRequest>>;

    async fn propose(
        &self,
        session: &Session,
        id: i64,
        payload: &ProposalPayload,
    ) -> ClientResult<Option<MaintenanceRequest>>;

    async fn update(
        &self,
        session: &Session,
        id: i64,
        update: &RequestUpdate,
    ) -> ClientResult<Option<MaintenanceRequest>>;

    async fn patch(
        &self,
        session: &Session,
        id: i64,
        patch: &StatusPatch,
    ) -> ClientResult<Option<MaintenanceRequest>>;
}

/// HTTP implementation of [`MaintenanceBackend`].
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    static_base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        Self::with_urls(&config.api_base_url, &config.static_base_url)
    }

    pub fn with_urls(base_url: &str, static_base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            static_base_url: static_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the bearer token when the session has one.
    fn authorized(&self, builder: RequestBuilder, session: &Session) -> RequestBuilder {
        match session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> ClientResult<String> {
        let response = builder.send().await.map_err(|e| {
            tracing::error!("{} could not reach the backend: {:?}", what, e);
            e
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::error!("{} response could not be read: {:?}", what, e);
            e
        })?;

        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.summary())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

        match status {
            StatusCode::UNAUTHORIZED => {
                tracing::warn!("{} rejected the session: {}", what, message);
                Err(ClientError::Unauthorized)
            }
            StatusCode::FORBIDDEN => Err(ClientError::Forbidden),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(format!("{}: {}", what, message))),
            _ => {
                tracing::error!("{} failed: {} - {}", what, status, message);
                Err(ClientError::Http { status, message })
            }
        }
    }

    fn decode<T: DeserializeOwned>(body: &str, what: &str) -> ClientResult<T> {
        serde_json::from_str(body).map_err(|e| {
            tracing::error!("{} returned an unreadable body: {}", what, e);
            ClientError::Decode(format!("{}: {}", what, e))
        })
    }

    fn finish_record(&self, mut record: MaintenanceRequest) -> MaintenanceRequest {
        normalize_record(&mut record, &self.static_base_url);
        for violation in record.invariant_violations() {
            tracing::warn!(request_id = record.id, "Backend record violates invariant: {}", violation);
        }
        record
    }

    async fn get_list(
        &self,
        builder: RequestBuilder,
        session: &Session,
        what: &str,
    ) -> ClientResult<Vec<MaintenanceRequest>> {
        let body = self.send(self.authorized(builder, session), what).await?;
        let values: Vec<serde_json::Value> = Self::decode(&body, what)?;
        // One bad record must not take the whole view down.
        Ok(values
            .into_iter()
            .filter_map(|value| {
                let id = value.get("id").cloned();
                match serde_json::from_value::<MaintenanceRequest>(value) {
                    Ok(record) => Some(self.finish_record(record)),
                    Err(e) => {
                        tracing::warn!(request_id = ?id, "{}: skipping unreadable record: {}", what, e);
                        None
                    }
                }
            })
            .collect())
    }

    async fn write(
        &self,
        builder: RequestBuilder,
        session: &Session,
        what: &str,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        let body = self.send(self.authorized(builder, session), what).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let envelope: WriteEnvelope = Self::decode(&body, what)?;
        Ok(envelope.into_record().map(|r| self.finish_record(r)))
    }
}

#[async_trait]
impl MaintenanceBackend for ApiClient {
    async fn list_for_tenant(
        &self,
        session: &Session,
        user_id: i64,
    ) -> ClientResult<Vec<MaintenanceRequest>> {
        self.tenant_requests(session, user_id).await
    }

    async fn list_for_technician(
        &self,
        session: &Session,
        technician_id: i64,
    ) -> ClientResult<Vec<MaintenanceRequest>> {
        self.technician_requests(session, technician_id).await
    }

    async fn pending_for_technician(
        &self,
        session: &Session,
        technician_id: i64,
    ) -> ClientResult<Vec<MaintenanceRequest>> {
        self.technician_pending(session, technician_id).await
    }

    async fn technician_stats(
        &self,
        session: &Session,
        technician_id: i64,
    ) -> ClientResult<TechnicianStats> {
        self.stats(session, technician_id).await
    }

    async fn create(
        &self,
        session: &Session,
        request: &NewMaintenanceRequest,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        self.create_request(session, request).await
    }

    async fn propose(
        &self,
        session: &Session,
        id: i64,
        payload: &ProposalPayload,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        self.submit_proposal(session, id, payload).await
    }

    async fn update(
        &self,
        session: &Session,
        id: i64,
        update: &RequestUpdate,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        self.put_request(session, id, update).await
    }

    async fn patch(
        &self,
        session: &Session,
        id: i64,
        patch: &StatusPatch,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        self.patch_request(session, id, patch).await
    }
}
