use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{MaintenanceRequest, MaintenanceStatus, ProblemType};
use crate::utils::validators::{sanitize_string, validate_description};

/// Photo picked by the tenant, validated before upload.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Tenant-side form state for a new request. Cleared after a successful
/// submission, left untouched on failure so the tenant can retry.
#[derive(Debug, Clone, Default, Validate)]
pub struct SubmissionDraft {
    #[validate(custom(function = "validate_description"))]
    pub description: String,
    pub photo: Option<PhotoUpload>,
    pub technician_id: Option<i64>,
    pub apartment_id: Option<i64>,
    pub problem_type: Option<ProblemType>,
}

impl SubmissionDraft {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
            && self.photo.is_none()
            && self.technician_id.is_none()
            && self.apartment_id.is_none()
            && self.problem_type.is_none()
    }
}

/// Multipart body of `POST /maintenance-requests`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMaintenanceRequest {
    pub user_id: i64,
    pub description: String,
    pub status: MaintenanceStatus,
    pub technician_id: Option<i64>,
    pub apartment_id: Option<i64>,
    pub problem_type: Option<ProblemType>,
    pub photo: Option<PhotoUpload>,
}

impl NewMaintenanceRequest {
    pub fn from_draft(user_id: i64, draft: &SubmissionDraft) -> Self {
        Self {
            user_id,
            description: sanitize_string(&draft.description),
            status: MaintenanceStatus::Pending,
            technician_id: draft.technician_id,
            apartment_id: draft.apartment_id,
            problem_type: draft.problem_type,
            photo: draft.photo.clone(),
        }
    }
}

/// Body of `PUT /maintenance-requests/{id}/propose`. The backend moves the
/// request to Pending Confirmation on its own.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProposalPayload {
    #[serde(with = "rust_decimal::serde::float")]
    pub proposed_cost: Decimal,
    pub proposed_duration: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConfirmPayload {
    pub cost_confirmed: bool,
    pub status: MaintenanceStatus,
    pub scheduled_date: DateTime<Utc>,
}

impl ConfirmPayload {
    pub fn new(scheduled_date: DateTime<Utc>) -> Self {
        Self {
            cost_confirmed: true,
            status: MaintenanceStatus::Approved,
            scheduled_date,
        }
    }
}

/// Cleared fields are sent as explicit nulls so the backend drops them.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RejectPayload {
    pub cost_confirmed: bool,
    pub status: MaintenanceStatus,
    pub proposed_cost: Option<Decimal>,
    pub proposed_duration: Option<String>,
    pub technician_id: Option<i64>,
    pub response: String,
}

impl RejectPayload {
    pub fn new(reason: String) -> Self {
        Self {
            cost_confirmed: false,
            status: MaintenanceStatus::Pending,
            proposed_cost: None,
            proposed_duration: None,
            technician_id: None,
            response: reason,
        }
    }
}

/// Body of the generic `PUT /maintenance-requests/{id}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RequestUpdate {
    Confirm(ConfirmPayload),
    Reject(RejectPayload),
}

/// Body of `PATCH /maintenance-requests/{id}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusPatch {
    pub status: MaintenanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
}

impl StatusPatch {
    pub fn status(status: MaintenanceStatus) -> Self {
        Self {
            status,
            scheduled_date: None,
            start_date: None,
            completed_date: None,
        }
    }

    pub fn started(at: DateTime<Utc>) -> Self {
        Self {
            start_date: Some(at),
            ..Self::status(MaintenanceStatus::InProgress)
        }
    }

    pub fn completed(at: DateTime<Utc>) -> Self {
        Self {
            completed_date: Some(at),
            ..Self::status(MaintenanceStatus::Completed)
        }
    }
}

/// Write responses come wrapped (`{"message", "request"}`), bare, or as a
/// plain acknowledgement without the record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WriteEnvelope {
    Wrapped {
        request: MaintenanceRequest,
        #[serde(default)]
        message: Option<String>,
    },
    Bare(MaintenanceRequest),
    Ack {
        #[serde(default)]
        message: Option<String>,
    },
}

impl WriteEnvelope {
    pub fn into_record(self) -> Option<MaintenanceRequest> {
        match self {
            WriteEnvelope::Wrapped { request, .. } => Some(request),
            WriteEnvelope::Bare(request) => Some(request),
            WriteEnvelope::Ack { .. } => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn summary(&self) -> Option<String> {
        let head = self.error.clone().or_else(|| self.message.clone())?;
        Some(match &self.details {
            Some(details) => format!("{} ({})", head, details),
            None => head,
        })
    }
}
