//! Test doubles: an in-memory backend with the server's lifecycle rules and an
//! axum app standing in for the HTTP API.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use reqwest::StatusCode as HttpStatus;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::api::MaintenanceBackend;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    MaintenanceRequest, MaintenanceStatus, NewMaintenanceRequest, ProposalPayload, RequestUpdate,
    StatusPatch, TechnicianStats,
};
use crate::session::{Session, UserRole};

pub const TENANT_ID: i64 = 42;
pub const TECHNICIAN_ID: i64 = 5;

pub fn tenant_session() -> Session {
    Session::new("tenant-token")
        .with_user_id(TENANT_ID)
        .with_role(UserRole::Tenant)
}

pub fn technician_session() -> Session {
    Session::new("technician-token")
        .with_user_id(TECHNICIAN_ID)
        .with_technician_id(TECHNICIAN_ID)
        .with_role(UserRole::Technician)
}

pub fn fixture(id: i64, status: MaintenanceStatus) -> MaintenanceRequest {
    let mut record = MaintenanceRequest::new(id, "Leaking pipe under sink");
    record.user_id = Some(TENANT_ID);
    record.technician_id = Some(TECHNICIAN_ID);
    record.status = status;
    record.request_date = Some(Utc::now());
    if matches!(
        status,
        MaintenanceStatus::PendingConfirmation
            | MaintenanceStatus::Approved
            | MaintenanceStatus::InProgress
            | MaintenanceStatus::Completed
    ) {
        record.proposed_cost = Some(rust_decimal::Decimal::new(150, 0));
        record.proposed_duration = Some("2 days".to_string());
    }
    record.cost_confirmed = status.is_confirmed_stage();
    record
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListTenant(i64),
    ListTechnician(i64),
    PendingForTechnician(i64),
    Stats(i64),
    Create(NewMaintenanceRequest),
    Propose(i64, ProposalPayload),
    Update(i64, RequestUpdate),
    Patch(i64, StatusPatch),
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Call::Create(_) | Call::Propose(..) | Call::Update(..) | Call::Patch(..)
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Unauthorized,
    ServerError,
}

#[derive(Default)]
struct Store {
    records: BTreeMap<i64, MaintenanceRequest>,
    next_id: i64,
    calls: Vec<Call>,
    fail_next: Option<Failure>,
    fail_next_read: Option<Failure>,
    ack_only: bool,
}

/// Behaves like the backend: `/propose` moves the request to Pending
/// Confirmation by itself, confirming without a proposal is a 400.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<Store>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Store {
                next_id: 1,
                ..Default::default()
            }),
            gate: Mutex::new(None),
        }
    }

    pub fn with_records(records: Vec<MaintenanceRequest>) -> Self {
        let backend = Self::new();
        {
            let mut state = backend.state.lock().unwrap();
            for record in records {
                state.next_id = state.next_id.max(record.id + 1);
                state.records.insert(record.id, record);
            }
        }
        backend
    }

    pub fn record(&self, id: i64) -> Option<MaintenanceRequest> {
        self.state.lock().unwrap().records.get(&id).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn write_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn fail_next(&self, failure: Failure) {
        self.state.lock().unwrap().fail_next = Some(failure);
    }

    /// Only the next read fails; writes go through.
    pub fn fail_next_read(&self, failure: Failure) {
        self.state.lock().unwrap().fail_next_read = Some(failure);
    }

    /// Writes answer with a bare acknowledgement instead of the record.
    pub fn ack_only(&self) {
        self.state.lock().unwrap().ack_only = true;
    }

    /// Writes block until the returned handle is notified.
    pub fn hold_writes(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    /// Overwrites a record behind the client's back (another actor).
    pub fn put_record(&self, record: MaintenanceRequest) {
        self.state.lock().unwrap().records.insert(record.id, record);
    }

    fn begin(&self, call: Call) -> ClientResult<()> {
        let mut state = self.state.lock().unwrap();
        let failure = match state.fail_next.take() {
            Some(failure) => Some(failure),
            None if !call.is_write() => state.fail_next_read.take(),
            None => None,
        };
        state.calls.push(call);
        match failure {
            Some(Failure::Unauthorized) => Err(ClientError::Unauthorized),
            Some(Failure::ServerError) => Err(ClientError::Http {
                status: HttpStatus::INTERNAL_SERVER_ERROR,
                message: "Unexpected server error".to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn wait_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn modify(
        &self,
        id: i64,
        change: impl FnOnce(&mut MaintenanceRequest) -> ClientResult<()>,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        let mut state = self.state.lock().unwrap();
        let ack_only = state.ack_only;
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| ClientError::NotFound(format!("request {}", id)))?;
        change(record)?;
        Ok(if ack_only { None } else { Some(record.clone()) })
    }
}

#[async_trait]
impl MaintenanceBackend for InMemoryBackend {
    async fn list_for_tenant(
        &self,
        _session: &Session,
        user_id: i64,
    ) -> ClientResult<Vec<MaintenanceRequest>> {
        self.begin(Call::ListTenant(user_id))?;
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .values()
            .filter(|r| r.user_id == Some(user_id))
            .cloned()
            .collect())
    }

    async fn list_for_technician(
        &self,
        _session: &Session,
        technician_id: i64,
    ) -> ClientResult<Vec<MaintenanceRequest>> {
        self.begin(Call::ListTechnician(technician_id))?;
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .values()
            .filter(|r| r.technician_id == Some(technician_id))
            .cloned()
            .collect())
    }

    async fn pending_for_technician(
        &self,
        _session: &Session,
        technician_id: i64,
    ) -> ClientResult<Vec<MaintenanceRequest>> {
        self.begin(Call::PendingForTechnician(technician_id))?;
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .values()
            .filter(|r| {
                r.technician_id == Some(technician_id) && r.status == MaintenanceStatus::Pending
            })
            .cloned()
            .collect())
    }

    async fn technician_stats(
        &self,
        _session: &Session,
        technician_id: i64,
    ) -> ClientResult<TechnicianStats> {
        self.begin(Call::Stats(technician_id))?;
        let state = self.state.lock().unwrap();
        Ok(TechnicianStats::from_requests(
            state
                .records
                .values()
                .filter(|r| r.technician_id == Some(technician_id)),
        ))
    }

    async fn create(
        &self,
        _session: &Session,
        request: &NewMaintenanceRequest,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        self.begin(Call::Create(request.clone()))?;
        self.wait_gate().await;
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;

        let mut record = MaintenanceRequest::new(id, request.description.clone());
        record.user_id = Some(request.user_id);
        record.technician_id = request.technician_id;
        record.apartment_id = request.apartment_id;
        record.problem_type = request.problem_type.unwrap_or_default();
        record.status = request.status;
        record.request_date = Some(Utc::now());
        if let Some(photo) = &request.photo {
            record.images = vec![format!(
                "http://localhost:5000/static/maintenance/{}",
                photo.file_name
            )];
        }
        state.records.insert(id, record.clone());
        Ok(if state.ack_only { None } else { Some(record) })
    }

    async fn propose(
        &self,
        session: &Session,
        id: i64,
        payload: &ProposalPayload,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        self.begin(Call::Propose(id, payload.clone()))?;
        if session.token().is_none() {
            return Err(ClientError::Unauthorized);
        }
        self.wait_gate().await;
        self.modify(id, |record| {
            record.proposed_cost = Some(payload.proposed_cost);
            record.proposed_duration = Some(payload.proposed_duration.clone());
            record.status = MaintenanceStatus::PendingConfirmation;
            Ok(())
        })
    }

    async fn update(
        &self,
        _session: &Session,
        id: i64,
        update: &RequestUpdate,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        self.begin(Call::Update(id, update.clone()))?;
        self.wait_gate().await;
        self.modify(id, |record| {
            match update {
                RequestUpdate::Confirm(confirm) => {
                    if !record.has_proposal() {
                        return Err(ClientError::Http {
                            status: HttpStatus::BAD_REQUEST,
                            message: "No proposal to confirm".to_string(),
                        });
                    }
                    record.cost_confirmed = confirm.cost_confirmed;
                    record.status = confirm.status;
                    record.scheduled_date = Some(confirm.scheduled_date);
                    record.confirmation_date = Some(Utc::now());
                }
                RequestUpdate::Reject(reject) => {
                    record.cost_confirmed = reject.cost_confirmed;
                    record.status = reject.status;
                    record.proposed_cost = reject.proposed_cost;
                    record.proposed_duration = reject.proposed_duration.clone();
                    record.technician_id = reject.technician_id;
                    record.technician = None;
                    record.response = Some(reject.response.clone());
                }
            }
            Ok(())
        })
    }

    async fn patch(
        &self,
        _session: &Session,
        id: i64,
        patch: &StatusPatch,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        self.begin(Call::Patch(id, patch.clone()))?;
        self.wait_gate().await;
        self.modify(id, |record| {
            record.status = patch.status;
            if let Some(date) = patch.scheduled_date {
                record.scheduled_date = Some(date);
            }
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// HTTP fake
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Captured {
    pub method: &'static str,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
pub struct FakeApi {
    pub records: Vec<Value>,
    pub captured: Vec<Captured>,
}

pub type SharedFake = Arc<Mutex<FakeApi>>;

fn auth_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn capture(fake: &SharedFake, method: &'static str, path: String, headers: &HeaderMap, body: Value) {
    fake.lock().unwrap().captured.push(Captured {
        method,
        path,
        authorization: auth_header(headers),
        body,
    });
}

fn find(fake: &FakeApi, id: i64) -> Option<usize> {
    fake.records.iter().position(|r| r["id"] == json!(id))
}

fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Maintenance request not found"})),
    )
}

#[derive(Deserialize)]
struct ListQuery {
    user_id: Option<i64>,
}

async fn list_requests(
    State(fake): State<SharedFake>,
    Query(query): Query<ListQuery>,
) -> Json<Value> {
    let fake = fake.lock().unwrap();
    let records: Vec<Value> = fake
        .records
        .iter()
        .filter(|r| query.user_id.map_or(true, |id| r["user_id"] == json!(id)))
        .cloned()
        .collect();
    Json(Value::Array(records))
}

async fn create_request(
    State(fake): State<SharedFake>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let mut fields = serde_json::Map::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if name == "photo" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            fields.insert(name, json!(file_name));
        } else {
            let text = field.text().await.unwrap_or_default();
            fields.insert(name, json!(text));
        }
    }
    let body = Value::Object(fields);
    capture(&fake, "POST", "/api/maintenance-requests".into(), &headers, body.clone());

    let mut fake = fake.lock().unwrap();
    let id = fake.records.len() as i64 + 1;
    let images = match body.get("photo").and_then(Value::as_str) {
        Some(name) => json!([format!("maintenance/{}", name)]),
        None => Value::Null,
    };
    let record = json!({
        "id": id,
        "user_id": body["user_id"].as_str().and_then(|s| s.parse::<i64>().ok()),
        "technician_id": body.get("technician_id").and_then(Value::as_str).and_then(|s| s.parse::<i64>().ok()),
        "problem_type": "General",
        "description": body["description"],
        "status": body["status"],
        "request_date": "2024-05-01T10:30:00",
        "cost_confirmed": false,
        "images": images,
    });
    fake.records.push(record.clone());
    (
        StatusCode::CREATED,
        Json(json!({"message": "Maintenance request submitted successfully!", "request": record})),
    )
}

async fn put_request(
    State(fake): State<SharedFake>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    capture(&fake, "PUT", format!("/api/maintenance-requests/{}", id), &headers, body.clone());
    let mut fake = fake.lock().unwrap();
    let index = find(&fake, id).ok_or_else(not_found)?;
    if let (Some(record), Some(changes)) = (fake.records[index].as_object_mut(), body.as_object()) {
        for (key, value) in changes {
            record.insert(key.clone(), value.clone());
        }
    }
    // Mirrors the backend's generic update: acknowledgement only.
    Ok(Json(json!({"message": "Maintenance request updated successfully"})))
}

async fn propose(
    State(fake): State<SharedFake>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    capture(
        &fake,
        "PUT",
        format!("/api/maintenance-requests/{}/propose", id),
        &headers,
        body.clone(),
    );
    if auth_header(&headers).is_none() {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Token is missing!"})),
        ));
    }
    let mut fake = fake.lock().unwrap();
    let index = find(&fake, id).ok_or_else(not_found)?;
    let record = &mut fake.records[index];
    record["proposed_cost"] = body["proposed_cost"].clone();
    record["proposed_duration"] = body["proposed_duration"].clone();
    record["status"] = json!("Pending Confirmation");
    Ok(Json(record.clone()))
}

async fn patch_request(
    State(fake): State<SharedFake>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    capture(&fake, "PATCH", format!("/api/maintenance-requests/{}", id), &headers, body.clone());
    let mut fake = fake.lock().unwrap();
    let index = find(&fake, id).ok_or_else(not_found)?;
    let status = match body["status"].as_str() {
        Some("Completed") => "Resolved",
        Some(other) => other,
        None => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Unexpected server error", "details": "status missing"})),
            ))
        }
    };
    let record = &mut fake.records[index];
    record["status"] = json!(status);
    Ok(Json(json!({
        "message": "Maintenance request updated successfully",
        "request": record.clone()
    })))
}

async fn technician_requests(
    State(fake): State<SharedFake>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if auth_header(&headers).is_none() {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Token is missing!"})),
        ));
    }
    let fake = fake.lock().unwrap();
    let records: Vec<Value> = fake
        .records
        .iter()
        .filter(|r| r["technician_id"] == json!(id))
        .cloned()
        .collect();
    Ok(Json(Value::Array(records)))
}

async fn technician_stats(State(fake): State<SharedFake>, Path(id): Path<i64>) -> Json<Value> {
    let fake = fake.lock().unwrap();
    let mine: Vec<&Value> = fake
        .records
        .iter()
        .filter(|r| r["technician_id"] == json!(id))
        .collect();
    let count = |wanted: &[&str]| {
        mine.iter()
            .filter(|r| r["status"].as_str().is_some_and(|s| wanted.contains(&s)))
            .count()
    };
    Json(json!({
        "total": mine.len() - count(&["Rejected"]),
        "pending": count(&["Pending"]),
        "completed": count(&["Resolved", "Completed"]),
    }))
}

/// Serves the fake API on an ephemeral port. Returns the `/api` base URL.
pub async fn spawn_fake_api(records: Vec<Value>) -> (String, SharedFake) {
    let fake: SharedFake = Arc::new(Mutex::new(FakeApi {
        records,
        captured: Vec::new(),
    }));

    let app = Router::new()
        .route(
            "/api/maintenance-requests",
            get(list_requests).post(create_request),
        )
        .route(
            "/api/maintenance-requests/:id",
            axum::routing::put(put_request).patch(patch_request),
        )
        .route(
            "/api/maintenance-requests/:id/propose",
            axum::routing::put(propose),
        )
        .route("/api/technician/:id/requests", get(technician_requests))
        .route("/api/technician/:id/stats", get(technician_stats))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api", addr), fake)
}
