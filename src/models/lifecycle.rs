use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{ClientError, ClientResult};
use crate::models::{MaintenanceRequest, MaintenanceStatus};

pub const NO_REASON_PROVIDED: &str = "No reason provided";

/// Rejection reason as stored in `response`; blank input gets the default.
pub fn rejection_reason(input: &str) -> String {
    let reason = input.trim();
    if reason.is_empty() {
        NO_REASON_PROVIDED.to_string()
    } else {
        reason.to_string()
    }
}

/// Every status change a tenant or technician can drive.
///
/// `Start` (after a confirmed proposal) and `AcceptDirect` (technician takes a
/// freshly assigned request without proposing) both lead to In Progress and are
/// kept apart on purpose: they have different preconditions.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Propose { cost: Decimal, duration: String },
    Confirm { scheduled_date: Option<DateTime<Utc>> },
    RejectProposal { reason: String },
    Start,
    Complete,
    AcceptDirect,
    DeclineDirect,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Propose { .. } => "propose",
            Transition::Confirm { .. } => "confirm",
            Transition::RejectProposal { .. } => "reject",
            Transition::Start => "start",
            Transition::Complete => "complete",
            Transition::AcceptDirect => "accept",
            Transition::DeclineDirect => "decline",
        }
    }

    pub fn allowed_from(&self) -> &'static [MaintenanceStatus] {
        use MaintenanceStatus::*;
        match self {
            Transition::Propose { .. } => &[Pending, PendingConfirmation],
            Transition::Confirm { .. } | Transition::RejectProposal { .. } => {
                &[PendingConfirmation]
            }
            Transition::Start => &[Approved],
            Transition::Complete => &[InProgress],
            Transition::AcceptDirect | Transition::DeclineDirect => &[Pending],
        }
    }

    pub fn target_status(&self) -> MaintenanceStatus {
        match self {
            Transition::Propose { .. } => MaintenanceStatus::PendingConfirmation,
            Transition::Confirm { .. } => MaintenanceStatus::Approved,
            Transition::RejectProposal { .. } => MaintenanceStatus::Pending,
            Transition::Start | Transition::AcceptDirect => MaintenanceStatus::InProgress,
            Transition::Complete => MaintenanceStatus::Completed,
            Transition::DeclineDirect => MaintenanceStatus::Rejected,
        }
    }

    /// Confirm and reject belong to the tenant, everything else to the technician.
    pub fn by_technician(&self) -> bool {
        !matches!(
            self,
            Transition::Confirm { .. } | Transition::RejectProposal { .. }
        )
    }

    pub fn requires_proposal(&self) -> bool {
        matches!(
            self,
            Transition::Confirm { .. } | Transition::RejectProposal { .. }
        )
    }

    /// Local precondition check against the last known state of the record.
    pub fn check(&self, record: &MaintenanceRequest) -> ClientResult<()> {
        if !self.allowed_from().contains(&record.status) {
            return Err(ClientError::InvalidTransition {
                action: self.name(),
                status: record.status,
            });
        }
        if self.requires_proposal() && !record.has_proposal() {
            return Err(ClientError::MissingProposal);
        }
        Ok(())
    }

    /// The record as the backend is expected to store it after this transition.
    pub fn apply(
        &self,
        record: &MaintenanceRequest,
        now: DateTime<Utc>,
    ) -> ClientResult<MaintenanceRequest> {
        self.check(record)?;

        let mut next = record.clone();
        next.status = self.target_status();
        match self {
            Transition::Propose { cost, duration } => {
                next.proposed_cost = Some(*cost);
                next.proposed_duration = Some(duration.clone());
            }
            Transition::Confirm { scheduled_date } => {
                next.cost_confirmed = true;
                next.scheduled_date = scheduled_date.or(record.scheduled_date).or(Some(now));
                next.confirmation_date = Some(now);
            }
            Transition::RejectProposal { reason } => {
                next.cost_confirmed = false;
                next.proposed_cost = None;
                next.proposed_duration = None;
                next.technician_id = None;
                next.technician = None;
                next.response = Some(rejection_reason(reason));
            }
            Transition::Start
            | Transition::Complete
            | Transition::AcceptDirect
            | Transition::DeclineDirect => {}
        }
        Ok(next)
    }
}
