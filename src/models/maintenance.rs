use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::serde_helpers::{flag, lenient_datetime, null_default, string_or_number};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MaintenanceStatus {
    Pending,
    #[serde(rename = "Pending Confirmation")]
    PendingConfirmation,
    Approved,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(alias = "Resolved")]
    Completed,
    Rejected,
    /// Accepted from the backend and filterable, never produced by a transition.
    Cancelled,
}

impl Default for MaintenanceStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl MaintenanceStatus {
    pub const ALL: [MaintenanceStatus; 7] = [
        Self::Pending,
        Self::PendingConfirmation,
        Self::Approved,
        Self::InProgress,
        Self::Completed,
        Self::Rejected,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::PendingConfirmation => "Pending Confirmation",
            Self::Approved => "Approved",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Rejected => "Rejected",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }

    /// Statuses in which a confirmed cost is legitimate.
    pub fn is_confirmed_stage(&self) -> bool {
        matches!(self, Self::Approved | Self::InProgress | Self::Completed)
    }
}

impl fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaintenanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "pending confirmation" => Ok(Self::PendingConfirmation),
            "approved" => Ok(Self::Approved),
            "in progress" => Ok(Self::InProgress),
            "completed" | "resolved" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum ProblemType {
    Plumbing,
    Electrical,
    Hvac,
    Appliance,
    General,
}

impl Default for ProblemType {
    fn default() -> Self {
        Self::General
    }
}

impl ProblemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plumbing => "plumbing",
            Self::Electrical => "electrical",
            Self::Hvac => "hvac",
            Self::Appliance => "appliance",
            Self::General => "general",
        }
    }

    /// Case-insensitive; anything unrecognised is filed as general.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "plumbing" => Self::Plumbing,
            "electrical" => Self::Electrical,
            "hvac" => Self::Hvac,
            "appliance" => Self::Appliance,
            _ => Self::General,
        }
    }
}

impl From<Option<String>> for ProblemType {
    fn from(raw: Option<String>) -> Self {
        raw.as_deref().map(Self::parse).unwrap_or_default()
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelatedUser {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelatedApartment {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub unit_number: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceRequest {
    pub id: i64,
    #[serde(default)]
    pub apartment_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub technician_id: Option<i64>,
    #[serde(default)]
    pub problem_type: ProblemType,
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub priority: Priority,
    #[serde(default, deserialize_with = "null_default")]
    pub status: MaintenanceStatus,
    #[serde(default)]
    pub proposed_cost: Option<Decimal>,
    #[serde(default)]
    pub proposed_duration: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub cost_confirmed: bool,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub request_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub confirmation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub response: Option<String>,
    /// Raw entries on decode; the API client rewrites them to absolute URLs.
    #[serde(
        default,
        deserialize_with = "crate::services::image_service::deserialize_image_list"
    )]
    pub images: Vec<String>,
    #[serde(default)]
    pub user: Option<RelatedUser>,
    #[serde(default)]
    pub technician: Option<RelatedUser>,
    #[serde(default)]
    pub apartment: Option<RelatedApartment>,
}

impl MaintenanceRequest {
    pub fn new(id: i64, description: impl Into<String>) -> Self {
        Self {
            id,
            apartment_id: None,
            user_id: None,
            technician_id: None,
            problem_type: ProblemType::General,
            description: description.into(),
            priority: Priority::Medium,
            status: MaintenanceStatus::Pending,
            proposed_cost: None,
            proposed_duration: None,
            cost_confirmed: false,
            request_date: None,
            scheduled_date: None,
            confirmation_date: None,
            response: None,
            images: Vec::new(),
            user: None,
            technician: None,
            apartment: None,
        }
    }

    pub fn has_proposal(&self) -> bool {
        self.proposed_cost.is_some()
            && self
                .proposed_duration
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty())
    }

    pub fn apartment_number(&self) -> String {
        self.apartment
            .as_ref()
            .and_then(|a| a.unit_number.clone())
            .or_else(|| self.apartment_id.map(|id| id.to_string()))
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn invariant_violations(&self) -> Vec<&'static str> {
        let mut violations = Vec::new();
        if self.cost_confirmed && !self.status.is_confirmed_stage() {
            violations.push("cost confirmed outside Approved/In Progress/Completed");
        }
        if self.status == MaintenanceStatus::Pending
            && (self.proposed_cost.is_some() || self.proposed_duration.is_some())
        {
            violations.push("pending request carries a proposal");
        }
        violations
    }
}
