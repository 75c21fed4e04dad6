use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::models::{MaintenanceRequest, MaintenanceStatus, Priority, ProblemType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    /// Approved or In Progress.
    Active,
    Only(MaintenanceStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: MaintenanceStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => matches!(
                status,
                MaintenanceStatus::Approved | MaintenanceStatus::InProgress
            ),
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            _ => s.parse().map(StatusFilter::Only),
        }
    }
}

/// Filters over an already fetched snapshot. `None` means "All".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFilter {
    pub status: StatusFilter,
    pub priority: Option<Priority>,
    pub problem_type: Option<ProblemType>,
    pub search: String,
    pub requested_from: Option<DateTime<Utc>>,
    pub requested_to: Option<DateTime<Utc>>,
}

impl RequestFilter {
    pub fn has_active_filters(&self) -> bool {
        *self != Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn matches(&self, request: &MaintenanceRequest) -> bool {
        self.status.matches(request.status)
            && self.priority.map_or(true, |p| p == request.priority)
            && self.problem_type.map_or(true, |t| t == request.problem_type)
            && self.matches_search(request)
            && self.matches_dates(request)
    }

    fn matches_search(&self, request: &MaintenanceRequest) -> bool {
        let query = self.search.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        request.problem_type.as_str().contains(&query)
            || request.description.to_lowercase().contains(&query)
            || request.apartment_number().to_lowercase().contains(&query)
    }

    fn matches_dates(&self, request: &MaintenanceRequest) -> bool {
        if self.requested_from.is_none() && self.requested_to.is_none() {
            return true;
        }
        // Undated requests cannot satisfy a date range.
        let Some(date) = request.request_date else {
            return false;
        };
        self.requested_from.map_or(true, |from| date >= from)
            && self.requested_to.map_or(true, |to| date <= to)
    }

    pub fn apply<'a>(&self, requests: &'a [MaintenanceRequest]) -> Vec<&'a MaintenanceRequest> {
        requests.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Technician dashboard: rejected and cancelled work is hidden before any
/// other filter runs.
pub fn technician_view<'a>(
    requests: &'a [MaintenanceRequest],
    filter: &RequestFilter,
) -> Vec<&'a MaintenanceRequest> {
    requests
        .iter()
        .filter(|r| {
            !matches!(
                r.status,
                MaintenanceStatus::Rejected | MaintenanceStatus::Cancelled
            )
        })
        .filter(|r| filter.matches(r))
        .collect()
}
