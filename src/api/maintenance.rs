use reqwest::multipart::{Form, Part};

use super::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    MaintenanceRequest, NewMaintenanceRequest, ProposalPayload, RequestUpdate, StatusPatch,
};
use crate::session::Session;

impl ApiClient {
    /// `GET /maintenance-requests?user_id=…`
    pub async fn tenant_requests(
        &self,
        session: &Session,
        user_id: i64,
    ) -> ClientResult<Vec<MaintenanceRequest>> {
        let builder = self
            .client
            .get(self.url("/maintenance-requests"))
            .query(&[("user_id", user_id)]);
        self.get_list(builder, session, "List maintenance requests")
            .await
    }

    /// `POST /maintenance-requests` as multipart form data.
    pub async fn create_request(
        &self,
        session: &Session,
        request: &NewMaintenanceRequest,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        let mut form = Form::new()
            .text("description", request.description.clone())
            .text("user_id", request.user_id.to_string())
            .text("status", request.status.as_str());

        if let Some(technician_id) = request.technician_id {
            form = form.text("technician_id", technician_id.to_string());
        }
        if let Some(apartment_id) = request.apartment_id {
            form = form.text("apartment_id", apartment_id.to_string());
        }
        if let Some(problem_type) = request.problem_type {
            form = form.text("problem_type", problem_type.as_str());
        }
        if let Some(photo) = &request.photo {
            let part = Part::bytes(photo.bytes.clone())
                .file_name(photo.file_name.clone())
                .mime_str(&photo.content_type)
                .map_err(|e| ClientError::Validation(format!("Invalid photo: {}", e)))?;
            form = form.part("photo", part);
        }

        let builder = self
            .client
            .post(self.url("/maintenance-requests"))
            .multipart(form);
        self.write(builder, session, "Create maintenance request")
            .await
    }

    /// `PUT /maintenance-requests/{id}/propose`; the backend requires a token here.
    pub async fn submit_proposal(
        &self,
        session: &Session,
        id: i64,
        payload: &ProposalPayload,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        session.bearer()?;
        let builder = self
            .client
            .put(self.url(&format!("/maintenance-requests/{}/propose", id)))
            .json(payload);
        self.write(builder, session, "Submit proposal").await
    }

    /// `PUT /maintenance-requests/{id}`
    pub async fn put_request(
        &self,
        session: &Session,
        id: i64,
        update: &RequestUpdate,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        let builder = self
            .client
            .put(self.url(&format!("/maintenance-requests/{}", id)))
            .json(update);
        self.write(builder, session, "Update maintenance request")
            .await
    }

    /// `PATCH /maintenance-requests/{id}`
    pub async fn patch_request(
        &self,
        session: &Session,
        id: i64,
        patch: &StatusPatch,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        let builder = self
            .client
            .patch(self.url(&format!("/maintenance-requests/{}", id)))
            .json(patch);
        self.write(builder, session, "Update request status").await
    }
}
