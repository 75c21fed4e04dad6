use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::MaintenanceRequest;

/// Issued when a read or write starts; orders it against other calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Which records a list snapshot is authoritative for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotScope {
    Tenant(i64),
    Technician(i64),
}

impl SnapshotScope {
    pub fn contains(&self, record: &MaintenanceRequest) -> bool {
        match self {
            SnapshotScope::Tenant(user_id) => record.user_id == Some(*user_id),
            SnapshotScope::Technician(technician_id) => {
                record.technician_id == Some(*technician_id)
            }
        }
    }
}

#[derive(Debug)]
struct Entry {
    record: MaintenanceRequest,
    written_at: Option<u64>,
}

#[derive(Debug, Default)]
struct Inner {
    generation: u64,
    entries: HashMap<i64, Entry>,
}

impl Inner {
    fn next(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

/// Single source of truth for the records this client has seen.
///
/// Write responses always win. A list snapshot only overwrites a record when
/// the snapshot was issued after the last write to that record completed, so
/// a slow read can never roll back a fresher write.
#[derive(Debug, Default)]
pub struct RequestCache {
    inner: Mutex<Inner>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self) -> Ticket {
        Ticket(self.lock().next())
    }

    pub fn apply_write(&self, record: MaintenanceRequest) {
        let mut inner = self.lock();
        let stamp = inner.next();
        inner.entries.insert(
            record.id,
            Entry {
                record,
                written_at: Some(stamp),
            },
        );
    }

    /// Applies a list read issued at `ticket`. Returns how many cached
    /// records were kept because a later write superseded the snapshot.
    pub fn apply_snapshot(
        &self,
        ticket: Ticket,
        scope: SnapshotScope,
        records: Vec<MaintenanceRequest>,
    ) -> usize {
        let mut inner = self.lock();
        let is_fresher = |entry: &Entry| entry.written_at.is_some_and(|w| w > ticket.0);
        let mut kept = 0;

        let incoming: Vec<i64> = records.iter().map(|r| r.id).collect();
        inner.entries.retain(|id, entry| {
            if incoming.contains(id) || !scope.contains(&entry.record) {
                return true;
            }
            if is_fresher(entry) {
                kept += 1;
                true
            } else {
                false
            }
        });

        for record in records {
            let superseded = inner.entries.get(&record.id).is_some_and(|e| is_fresher(e));
            if superseded {
                tracing::debug!(
                    request_id = record.id,
                    "Snapshot older than last write, keeping cached record"
                );
                kept += 1;
                continue;
            }
            inner.entries.insert(
                record.id,
                Entry {
                    record,
                    written_at: None,
                },
            );
        }
        kept
    }

    /// Single-record read issued at `ticket`. Returns the record the cache
    /// holds afterwards, which is the cached one if a write landed first.
    pub fn apply_read(&self, ticket: Ticket, record: MaintenanceRequest) -> MaintenanceRequest {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get(&record.id) {
            if entry.written_at.is_some_and(|w| w > ticket.0) {
                return entry.record.clone();
            }
        }
        inner.entries.insert(
            record.id,
            Entry {
                record: record.clone(),
                written_at: None,
            },
        );
        record
    }

    pub fn get(&self, id: i64) -> Option<MaintenanceRequest> {
        self.lock().entries.get(&id).map(|e| e.record.clone())
    }

    pub fn records(&self) -> Vec<MaintenanceRequest> {
        let mut records: Vec<_> = self.lock().entries.values().map(|e| e.record.clone()).collect();
        records.sort_by_key(|r| r.id);
        records
    }

    pub fn records_in(&self, scope: SnapshotScope) -> Vec<MaintenanceRequest> {
        self.records()
            .into_iter()
            .filter(|r| scope.contains(r))
            .collect()
    }

    pub fn evict(&self, id: i64) -> Option<MaintenanceRequest> {
        self.lock().entries.remove(&id).map(|e| e.record)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
