//! Device-level remote sync indicator.

use chrono::Utc;
use tokio::sync::watch;

use crate::domain::{EventBus, SyncStatus, VitalsEvent};

/// Holds the current [`SyncStatus`] and announces changes on the bus.
#[derive(Debug)]
pub struct SyncIndicator {
    status: watch::Sender<SyncStatus>,
    event_bus: EventBus,
}

impl SyncIndicator {
    /// Creates an indicator starting at `initial`.
    #[must_use]
    pub fn new(initial: SyncStatus, event_bus: EventBus) -> Self {
        let (status, _) = watch::channel(initial);
        Self { status, event_bus }
    }

    /// Current status.
    #[must_use]
    pub fn get(&self) -> SyncStatus {
        *self.status.borrow()
    }

    /// Watches status changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Sets the status, publishing [`VitalsEvent::SyncStatusChanged`] only
    /// when it actually changes.
    pub fn set(&self, next: SyncStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            tracing::debug!(status = ?next, "sync status changed");
            let _ = self.event_bus.publish(VitalsEvent::SyncStatusChanged {
                status: next,
                timestamp: Utc::now(),
            });
        }
    }
}
