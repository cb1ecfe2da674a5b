//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>`. The trends updater subscribes
//! to completed runs; operational alerts (`error` runs, archive corruption)
//! go out on the same bus, separate from the ticket stream.

use chrono::{DateTime, Utc};
use pqa_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// A run was committed with `pass` or `fail`.
pub const ANALYSIS_COMPLETED: &str = "analysis.completed";
/// A run was committed with `error`. Operational alert.
pub const ANALYSIS_ERRORED: &str = "analysis.errored";
/// Stored archive bytes no longer match their hash. Operational alert.
pub const ARCHIVE_INTEGRITY_FAILED: &str = "archive.integrity_failed";
/// A ticket was opened for a failed run.
pub const REMEDIATION_DISPATCHED: &str = "remediation.dispatched";
/// Every attempt to open a ticket failed.
pub const REMEDIATION_FAILED: &str = "remediation.failed";

// ---------------------------------------------------------------------------
// PqaEvent
// ---------------------------------------------------------------------------

/// A domain event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PqaEvent {
    /// Dot-separated event name, e.g. `"analysis.completed"`.
    pub event_type: String,
    pub device_id: Option<DbId>,
    pub file_type: Option<String>,
    pub run_id: Option<Uuid>,
    /// Event-specific data.
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl PqaEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            device_id: None,
            file_type: None,
            run_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the analysis target.
    pub fn with_target(mut self, device_id: DbId, file_type: impl Into<String>) -> Self {
        self.device_id = Some(device_id);
        self.file_type = Some(file_type.into());
        self
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Whether this event is meant for the hosting team rather than end users.
    pub fn is_operational_alert(&self) -> bool {
        matches!(
            self.event_type.as_str(),
            ANALYSIS_ERRORED | ARCHIVE_INTEGRITY_FAILED
        )
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<PqaEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped when nobody listens.
    pub fn publish(&self, event: PqaEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PqaEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
