//! Vitals and sync DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{StatsSnapshot, SyncStatus, UrgencyLevel};

/// Response body for `GET /stats` and `POST /stats/break`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Current gauges.
    pub stats: StatsSnapshot,
    /// Alert level for the urgency gauge.
    pub level: UrgencyLevel,
    /// Whether the "take a break" shortcut should be offered.
    pub offer_break: bool,
}

impl From<StatsSnapshot> for StatsResponse {
    fn from(stats: StatsSnapshot) -> Self {
        let level = stats.urgency_level();
        Self {
            stats,
            level,
            offer_break: level.offers_break(),
        }
    }
}

/// Optional body for `POST /stats/break`.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BreakRequest {
    /// Member taking the dog out.
    #[serde(default, alias = "logged_by")]
    pub logged_by: Option<String>,
}

/// Response body for `GET /sync/status`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    /// Device-level sync indicator.
    pub status: SyncStatus,
    /// Whether a remote mirror is configured.
    pub remote_configured: bool,
}

/// Response body for `POST /sync/refresh`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// Log size after the refresh.
    pub count: usize,
    /// Sync indicator after the refresh.
    pub status: SyncStatus,
}
