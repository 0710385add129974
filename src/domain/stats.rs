//! Derived vitals snapshot.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The four bounded gauges shown on the dashboard.
///
/// Never persisted: always reconstructable from the life-stage, the event
/// log and the current time via [`super::VitalsEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatsSnapshot {
    /// Fullness, 0–100.
    pub tummy: u8,
    /// Hydration, 0–100.
    pub tank: u8,
    /// Energy, 0–100.
    pub energy: u8,
    /// Potty urgency, 0–1 with two decimals.
    pub urgency: f64,
}

impl StatsSnapshot {
    /// Values assumed when no qualifying event is inside the window.
    pub const BASELINE: Self = Self {
        tummy: 20,
        tank: 15,
        energy: 30,
        urgency: 0.8,
    };

    /// Maps urgency onto the dashboard's alert levels.
    #[must_use]
    pub fn urgency_level(&self) -> UrgencyLevel {
        UrgencyLevel::from_urgency(self.urgency)
    }

    /// Applies the "take a break" override: urgency to zero and ten
    /// points off energy.
    #[must_use]
    pub fn after_break(self, prior_energy: u8) -> Self {
        Self {
            urgency: 0.0,
            energy: prior_energy.saturating_sub(10),
            ..self
        }
    }
}

/// Alert level derived from urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    /// Nothing to do.
    Calm,
    /// Above 0.7: offer a break.
    BreakSuggested,
    /// Above 0.75.
    ActionRecommended,
    /// Above 0.8.
    Critical,
}

impl UrgencyLevel {
    /// Classifies a raw urgency value.
    #[must_use]
    pub fn from_urgency(urgency: f64) -> Self {
        if urgency > 0.8 {
            Self::Critical
        } else if urgency > 0.75 {
            Self::ActionRecommended
        } else if urgency > 0.7 {
            Self::BreakSuggested
        } else {
            Self::Calm
        }
    }

    /// Returns `true` if the dashboard should offer the break shortcut.
    #[must_use]
    pub const fn offers_break(&self) -> bool {
        !matches!(self, Self::Calm)
    }
}
