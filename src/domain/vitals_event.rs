//! Notifications emitted after state changes.
//!
//! Every mutation of the event log, every recompute and every change of
//! the remote sync state publishes a [`VitalsEvent`] through the
//! [`super::EventBus`]. WebSocket clients receive them filtered by
//! [`Topic`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{DogEvent, EventId, StatsSnapshot, UrgencyLevel};

/// Where a log change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Logged on this device.
    Local,
    /// Pushed by the remote store from another device.
    Remote,
}

/// Device-level remote sync indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No remote mirror is configured.
    #[default]
    Local,
    /// A remote call is in flight.
    Syncing,
    /// The last remote call succeeded.
    Synced,
    /// The last remote call failed; local state is still authoritative.
    Error,
}

/// Subscription topic for WebSocket clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Event log changes.
    Events,
    /// Recomputed gauges.
    Stats,
    /// Sync indicator changes.
    Sync,
}

/// Notification emitted after every state change.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum VitalsEvent {
    /// An event entered the log.
    EventLogged {
        /// The logged event.
        event: DogEvent,
        /// Where it came from.
        origin: Origin,
    },

    /// An event left the log.
    EventRemoved {
        /// Id of the removed event.
        event_id: EventId,
        /// Where the removal came from.
        origin: Origin,
    },

    /// The whole log was replaced by a remote fetch.
    LogReplaced {
        /// Number of events after the replacement.
        count: usize,
        /// Replacement time.
        timestamp: DateTime<Utc>,
    },

    /// The gauges were recomputed or overridden.
    StatsUpdated {
        /// New gauges.
        stats: StatsSnapshot,
        /// Alert level for the new urgency.
        level: UrgencyLevel,
        /// Computation time.
        timestamp: DateTime<Utc>,
    },

    /// The remote sync indicator changed.
    SyncStatusChanged {
        /// New status.
        status: SyncStatus,
        /// Time of the change.
        timestamp: DateTime<Utc>,
    },
}

impl VitalsEvent {
    /// Returns the subscription topic this event belongs to.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::EventLogged { .. } | Self::EventRemoved { .. } | Self::LogReplaced { .. } => {
                Topic::Events
            }
            Self::StatsUpdated { .. } => Topic::Stats,
            Self::SyncStatusChanged { .. } => Topic::Sync,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::EventLogged { .. } => "event_logged",
            Self::EventRemoved { .. } => "event_removed",
            Self::LogReplaced { .. } => "log_replaced",
            Self::StatsUpdated { .. } => "stats_updated",
            Self::SyncStatusChanged { .. } => "sync_status_changed",
        }
    }
}
