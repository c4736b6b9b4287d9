use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::store::Store;

/// Kinds of asynchronous storage work surfaced to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    DriveConnect,
    DriveDisconnect,
    FileLoad,
    FileSave,
    FileTreeLoad,
    FileCreate,
}

/// Marker for one in-flight storage call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRecord {
    pub kind: OperationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Bookkeeping of in-flight storage operations.
///
/// This is not a lock: it only records what is running so observers can
/// render loading state and callers can refuse conflicting work.
#[derive(Clone, Default)]
pub struct OperationTracker {
    records: Store<Vec<OperationRecord>>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(
        &self,
        kind: OperationKind,
        resource_id: Option<&str>,
        display_name: Option<&str>,
    ) {
        debug!("operation start: {:?} {:?}", kind, resource_id);
        let record = OperationRecord {
            kind,
            resource_id: resource_id.map(str::to_string),
            display_name: display_name.map(str::to_string),
        };
        self.records.update(|records| records.push(record));
    }

    /// Remove every record of `kind`. With a resource id only records for
    /// that resource go; without one, all records of the kind go.
    pub fn end(&self, kind: OperationKind, resource_id: Option<&str>) {
        debug!("operation end: {:?} {:?}", kind, resource_id);
        self.records.update(|records| {
            records.retain(|r| {
                !(r.kind == kind
                    && resource_id.map_or(true, |id| r.resource_id.as_deref() == Some(id)))
            })
        });
    }

    pub fn clear(&self) {
        self.records.set(Vec::new());
    }

    pub fn snapshot(&self) -> Vec<OperationRecord> {
        self.records.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<OperationRecord>> {
        self.records.subscribe()
    }

    /// Whether a record of `kind` is active, optionally for one resource
    pub fn is_busy(&self, kind: OperationKind, resource_id: Option<&str>) -> bool {
        self.records.with(|records| {
            records.iter().any(|r| {
                r.kind == kind
                    && resource_id.map_or(true, |id| r.resource_id.as_deref() == Some(id))
            })
        })
    }

    /// Whether anything at all is running against `resource_id`
    pub fn is_resource_busy(&self, resource_id: &str) -> bool {
        self.records.with(|records| {
            records
                .iter()
                .any(|r| r.resource_id.as_deref() == Some(resource_id))
        })
    }

    /// Start a record that ends when the returned guard is dropped
    pub fn track(
        &self,
        kind: OperationKind,
        resource_id: Option<String>,
        display_name: Option<String>,
    ) -> OperationGuard {
        self.start(kind, resource_id.as_deref(), display_name.as_deref());
        OperationGuard {
            tracker: self.clone(),
            kind,
            resource_id,
        }
    }

    /// Like [`track`](Self::track), but only when no record of `kind` for
    /// `resource_id` is active. The check and the start happen under one
    /// write, so two callers can never both get a guard.
    pub fn try_track(
        &self,
        kind: OperationKind,
        resource_id: String,
        display_name: Option<String>,
    ) -> Option<OperationGuard> {
        let started = self.records.update_if(|records| {
            let busy = records.iter().any(|r| {
                r.kind == kind && r.resource_id.as_deref() == Some(resource_id.as_str())
            });
            if busy {
                return false;
            }
            records.push(OperationRecord {
                kind,
                resource_id: Some(resource_id.clone()),
                display_name,
            });
            true
        });
        if !started {
            debug!("operation busy: {:?} {:?}", kind, resource_id);
            return None;
        }
        debug!("operation start: {:?} {:?}", kind, resource_id);
        Some(OperationGuard {
            tracker: self.clone(),
            kind,
            resource_id: Some(resource_id),
        })
    }
}

/// Ends its operation record on drop, on success and failure alike
#[must_use = "the operation ends as soon as the guard is dropped"]
pub struct OperationGuard {
    tracker: OperationTracker,
    kind: OperationKind,
    resource_id: Option<String>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.tracker.end(self.kind, self.resource_id.as_deref());
    }
}
