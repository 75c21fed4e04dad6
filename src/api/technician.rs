use super::ApiClient;
use crate::error::ClientResult;
use crate::models::{MaintenanceRequest, TechnicianStats};
use crate::session::Session;

impl ApiClient {
    /// `GET /technician/{id}/requests`
    pub async fn technician_requests(
        &self,
        session: &Session,
        technician_id: i64,
    ) -> ClientResult<Vec<MaintenanceRequest>> {
        let builder = self.client.get(
            self.url(&format!("/technician/{}/requests", technician_id)),
        );
        self.get_list(builder, session, "List technician requests")
            .await
    }

    /// `GET /technician/{id}/requests/pending`
    pub async fn technician_pending(
        &self,
        session: &Session,
        technician_id: i64,
    ) -> ClientResult<Vec<MaintenanceRequest>> {
        let builder = self.client.get(
            self.url(&format!("/technician/{}/requests/pending", technician_id)),
        );
        self.get_list(builder, session, "List pending technician requests")
            .await
    }

    /// `GET /technician/{id}/stats`
    pub async fn stats(
        &self,
        session: &Session,
        technician_id: i64,
    ) -> ClientResult<TechnicianStats> {
        let what = "Fetch technician stats";
        let builder = self
            .client
            .get(self.url(&format!("/technician/{}/stats", technician_id)));
        let body = self.send(self.authorized(builder, session), what).await?;
        Self::decode(&body, what)
    }
}
