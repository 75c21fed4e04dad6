use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::api::MaintenanceBackend;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    rejection_reason, ConfirmPayload, MaintenanceRequest, NewMaintenanceRequest, ProposalPayload,
    RejectPayload, RequestUpdate, StatusPatch, SubmissionDraft, TechnicianStats, Transition,
};
use crate::services::cache_service::{RequestCache, SnapshotScope};
use crate::services::image_service::validate_photo;
use crate::session::{is_technician, is_tenant, Session, UserRole};
use crate::utils::validators::{validate_proposed_cost, validate_proposed_duration};

/// Releases the request id when the mutation settles, however it ends.
struct InFlight<'a> {
    ids: &'a Mutex<HashSet<i64>>,
    id: i64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Drives maintenance requests through their lifecycle against a backend.
///
/// Every write goes through the same path: duplicate guard, local precondition
/// check against the last known record, one backend call, then the response
/// lands in the cache. A bare acknowledgement is reconciled from the reloaded
/// list the record belongs to.
pub struct LifecycleService<B> {
    backend: B,
    cache: RequestCache,
    in_flight: Mutex<HashSet<i64>>,
}

impl<B: MaintenanceBackend> LifecycleService<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: RequestCache::new(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    pub fn is_processing(&self, id: i64) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    fn claim(&self, id: i64) -> ClientResult<InFlight<'_>> {
        let mut ids = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(id) {
            tracing::debug!(request_id = id, "Mutation already in flight");
            return Err(ClientError::AlreadyInFlight(id));
        }
        Ok(InFlight {
            ids: &self.in_flight,
            id,
        })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Re-fetches the tenant's requests and reconciles them into the cache.
    pub async fn refresh_tenant(&self, session: &Session) -> ClientResult<Vec<MaintenanceRequest>> {
        let user_id = session.require_user_id()?;
        let ticket = self.cache.begin();
        let records = self.backend.list_for_tenant(session, user_id).await?;
        let scope = SnapshotScope::Tenant(user_id);
        let kept = self.cache.apply_snapshot(ticket, scope, records);
        if kept > 0 {
            tracing::debug!(user_id, kept, "Kept records written after the list was requested");
        }
        Ok(self.cache.records_in(scope))
    }

    pub async fn refresh_technician(
        &self,
        session: &Session,
    ) -> ClientResult<Vec<MaintenanceRequest>> {
        session.bearer()?;
        let technician_id = session.require_technician_id()?;
        let ticket = self.cache.begin();
        let records = self
            .backend
            .list_for_technician(session, technician_id)
            .await?;
        let scope = SnapshotScope::Technician(technician_id);
        self.cache.apply_snapshot(ticket, scope, records);
        Ok(self.cache.records_in(scope))
    }

    /// Freshly assigned work waiting for a direct accept or decline.
    pub async fn pending_assignments(
        &self,
        session: &Session,
    ) -> ClientResult<Vec<MaintenanceRequest>> {
        session.bearer()?;
        let technician_id = session.require_technician_id()?;
        let ticket = self.cache.begin();
        let records = self
            .backend
            .pending_for_technician(session, technician_id)
            .await?;
        Ok(records
            .into_iter()
            .map(|r| self.cache.apply_read(ticket, r))
            .collect())
    }

    pub async fn technician_stats(&self, session: &Session) -> ClientResult<TechnicianStats> {
        session.bearer()?;
        let technician_id = session.require_technician_id()?;
        self.backend.technician_stats(session, technician_id).await
    }

    /// Cached record. On a miss the session's own list is reloaded, the
    /// technician's for technicians and the tenant's for everyone else.
    pub async fn request(&self, session: &Session, id: i64) -> ClientResult<MaintenanceRequest> {
        match self.cache.get(id) {
            Some(record) => Ok(record),
            None => self.reload(session, id, is_technician(&session.role)).await,
        }
    }

    /// The backend has no single-record read, so the record is taken from
    /// its scoped list.
    async fn reload(
        &self,
        session: &Session,
        id: i64,
        as_technician: bool,
    ) -> ClientResult<MaintenanceRequest> {
        let records = if as_technician {
            self.refresh_technician(session).await?
        } else {
            self.refresh_tenant(session).await?
        };
        records
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| ClientError::NotFound(format!("Maintenance request {} not found", id)))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Posts the tenant's draft. The draft is cleared only once the backend
    /// accepted it; on any error it stays as typed.
    pub async fn submit(
        &self,
        session: &Session,
        draft: &mut SubmissionDraft,
    ) -> ClientResult<Option<MaintenanceRequest>> {
        draft.validate()?;
        let user_id = session.require_user_id()?;
        if let Some(photo) = &draft.photo {
            validate_photo(photo)?;
        }

        let op_id = Uuid::new_v4();
        let body = NewMaintenanceRequest::from_draft(user_id, draft);
        let created = self
            .backend
            .create(session, &body)
            .await
            .map_err(|e| {
                tracing::error!(%op_id, user_id, "Failed to submit request: {}", e);
                e
            })?;

        draft.clear();
        if let Some(record) = &created {
            tracing::info!(%op_id, request_id = record.id, "Maintenance request submitted");
            self.cache.apply_write(record.clone());
        }

        // The create already succeeded; a failed reload only leaves the list stale.
        if let Err(e) = self.refresh_tenant(session).await {
            tracing::warn!(%op_id, "Request submitted but the list could not be reloaded: {}", e);
        }
        Ok(created)
    }

    pub async fn propose(
        &self,
        session: &Session,
        id: i64,
        cost: Option<Decimal>,
        duration: &str,
    ) -> ClientResult<MaintenanceRequest> {
        let duration = duration.trim();
        let cost = match cost {
            Some(cost) if validate_proposed_cost(Some(cost)) => cost,
            _ => {
                return Err(ClientError::Validation(
                    "Proposed cost must be a positive amount".to_string(),
                ))
            }
        };
        if !validate_proposed_duration(duration) {
            return Err(ClientError::Validation(
                "Proposed duration is required".to_string(),
            ));
        }
        session.bearer()?;

        self.run(
            session,
            id,
            Transition::Propose {
                cost,
                duration: duration.to_string(),
            },
        )
        .await
    }

    /// Accepts the proposal. Without `scheduled_date` the existing schedule
    /// is kept, or the confirmation time used when there is none.
    pub async fn confirm(
        &self,
        session: &Session,
        id: i64,
        scheduled_date: Option<DateTime<Utc>>,
    ) -> ClientResult<MaintenanceRequest> {
        self.run(session, id, Transition::Confirm { scheduled_date })
            .await
    }

    pub async fn reject_proposal(
        &self,
        session: &Session,
        id: i64,
        reason: &str,
    ) -> ClientResult<MaintenanceRequest> {
        self.run(
            session,
            id,
            Transition::RejectProposal {
                reason: rejection_reason(reason),
            },
        )
        .await
    }

    pub async fn start(&self, session: &Session, id: i64) -> ClientResult<MaintenanceRequest> {
        self.run(session, id, Transition::Start).await
    }

    pub async fn complete(&self, session: &Session, id: i64) -> ClientResult<MaintenanceRequest> {
        self.run(session, id, Transition::Complete).await
    }

    pub async fn accept_direct(
        &self,
        session: &Session,
        id: i64,
    ) -> ClientResult<MaintenanceRequest> {
        self.run(session, id, Transition::AcceptDirect).await
    }

    pub async fn decline_direct(
        &self,
        session: &Session,
        id: i64,
    ) -> ClientResult<MaintenanceRequest> {
        self.run(session, id, Transition::DeclineDirect).await
    }

    fn check_actor(session: &Session, transition: &Transition) -> ClientResult<()> {
        let role = session.role;
        let allowed = role == UserRole::Unknown
            || if transition.by_technician() {
                is_technician(&role)
            } else {
                is_tenant(&role) || role == UserRole::Owner
            };
        if allowed {
            Ok(())
        } else {
            tracing::warn!(?role, action = transition.name(), "Action not available for role");
            Err(ClientError::Forbidden)
        }
    }

    async fn run(
        &self,
        session: &Session,
        id: i64,
        transition: Transition,
    ) -> ClientResult<MaintenanceRequest> {
        Self::check_actor(session, &transition)?;
        let _guard = self.claim(id)?;

        // A cached record that refuses the transition may just be stale.
        let current = match self.cache.get(id) {
            Some(cached) if transition.check(&cached).is_ok() => cached,
            cached => {
                if let Some(stale) = &cached {
                    tracing::debug!(
                        request_id = id,
                        action = transition.name(),
                        cached = %stale.status,
                        "Cached record refuses the transition, reloading"
                    );
                }
                let fresh = self.reload(session, id, transition.by_technician()).await?;
                transition.check(&fresh)?;
                fresh
            }
        };

        let op_id = Uuid::new_v4();
        let now = Utc::now();
        tracing::debug!(
            %op_id,
            request_id = id,
            action = transition.name(),
            from = %current.status,
            "Dispatching transition"
        );

        let written = match &transition {
            Transition::Propose { cost, duration } => {
                let payload = ProposalPayload {
                    proposed_cost: *cost,
                    proposed_duration: duration.clone(),
                };
                self.backend.propose(session, id, &payload).await
            }
            Transition::Confirm { scheduled_date } => {
                let date = scheduled_date.or(current.scheduled_date).unwrap_or(now);
                let update = RequestUpdate::Confirm(ConfirmPayload::new(date));
                self.backend.update(session, id, &update).await
            }
            Transition::RejectProposal { reason } => {
                let update = RequestUpdate::Reject(RejectPayload::new(reason.clone()));
                self.backend.update(session, id, &update).await
            }
            Transition::Start => {
                self.backend
                    .patch(session, id, &StatusPatch::started(now))
                    .await
            }
            Transition::Complete => {
                self.backend
                    .patch(session, id, &StatusPatch::completed(now))
                    .await
            }
            Transition::AcceptDirect | Transition::DeclineDirect => {
                let patch = StatusPatch::status(transition.target_status());
                self.backend.patch(session, id, &patch).await
            }
        };
        let written = written.map_err(|e| {
            tracing::error!(%op_id, request_id = id, action = transition.name(), "Transition failed: {}", e);
            e
        })?;

        let record = match written {
            Some(record) => record,
            None => {
                tracing::debug!(%op_id, request_id = id, "Write acknowledged without record, reloading");
                match self.reload(session, id, transition.by_technician()).await {
                    Ok(record) => record,
                    Err(e) => {
                        // The write went through; fall back to the expected result.
                        tracing::warn!(
                            %op_id,
                            request_id = id,
                            "Write acknowledged but the record could not be reloaded: {}",
                            e
                        );
                        transition.apply(&current, now)?
                    }
                }
            }
        };
        if record.status != transition.target_status() {
            tracing::warn!(
                %op_id,
                request_id = id,
                expected = %transition.target_status(),
                actual = %record.status,
                "Backend stored a different status than the transition targets"
            );
        }

        self.cache.apply_write(record.clone());
        tracing::info!(
            %op_id,
            request_id = id,
            action = transition.name(),
            status = %record.status,
            "Maintenance request updated"
        );
        Ok(record)
    }
}
