use serde::{Deserialize, Serialize};

use crate::models::{MaintenanceRequest, MaintenanceStatus};

/// Workload counters shown on the technician dashboard.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TechnicianStats {
    /// Everything assigned except rejected requests.
    pub total: u32,
    pub pending: u32,
    pub completed: u32,
}

impl TechnicianStats {
    pub fn from_requests<'a>(requests: impl IntoIterator<Item = &'a MaintenanceRequest>) -> Self {
        requests
            .into_iter()
            .fold(Self::default(), |mut stats, request| {
                match request.status {
                    MaintenanceStatus::Rejected => return stats,
                    MaintenanceStatus::Pending => stats.pending += 1,
                    MaintenanceStatus::Completed => stats.completed += 1,
                    _ => {}
                }
                stats.total += 1;
                stats
            })
    }
}
