//! Logged dog-care events.
//!
//! A [`DogEvent`] is an immutable fact: once created its `id` and
//! `timestamp` never change. Correcting an event means deleting it and
//! logging a new one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EventId, PackCode};
use crate::error::TailTalkError;

/// Kind of care event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Urination.
    Pee,
    /// Defecation.
    Poop,
    /// A meal.
    Food,
    /// Drinking water.
    Water,
    /// A walk or potty break outside.
    Walk,
    /// A health observation, including stool scans.
    HealthCheck,
}

impl EventType {
    /// All event types in display order.
    pub const ALL: [Self; 6] = [
        Self::Pee,
        Self::Poop,
        Self::Food,
        Self::Water,
        Self::Walk,
        Self::HealthCheck,
    ];

    /// Returns the wire name of the event type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pee => "pee",
            Self::Poop => "poop",
            Self::Food => "food",
            Self::Water => "water",
            Self::Walk => "walk",
            Self::HealthCheck => "health_check",
        }
    }

    /// Returns `true` for pee and poop, the events that relieve urgency.
    #[must_use]
    pub const fn is_potty(&self) -> bool {
        matches!(self, Self::Pee | Self::Poop)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = TailTalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TailTalkError::InvalidRequest(format!("unknown event type: {s}")))
    }
}

/// Open-ended details attached to an event.
///
/// Every field is optional; which ones are meaningful depends on the
/// event type (e.g. `consistency` for poop, `duration` for walks).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Free-form amount, e.g. `"1 cup"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Stool consistency, 1 (hard) to 5 (liquid).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency: Option<u8>,
    /// `small`, `medium` or `large`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    /// Walk duration, e.g. `"20 mins"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Set on events that should count as relieving potty urgency.
    #[serde(
        default,
        alias = "urgency_reset",
        skip_serializing_if = "Option::is_none"
    )]
    pub urgency_reset: Option<bool>,
    /// Set when the event indicates a possible health concern.
    #[serde(default, alias = "health_flag", skip_serializing_if = "Option::is_none")]
    pub health_flag: Option<bool>,
}

impl EventMetadata {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::InvalidRequest`] if `consistency` is
    /// outside 1–5.
    pub fn validate(&self) -> Result<(), TailTalkError> {
        if let Some(c) = self.consistency
            && !(1..=5).contains(&c)
        {
            return Err(TailTalkError::InvalidRequest(format!(
                "consistency must be 1-5, got {c}"
            )));
        }
        Ok(())
    }
}

/// An immutable, logged care event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DogEvent {
    /// Unique id within the event log.
    pub id: EventId,
    /// What happened.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// The text the human entered or said.
    #[serde(default)]
    pub raw_text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Type-specific details.
    #[serde(default)]
    pub metadata: EventMetadata,
    /// Display name of the pack member who logged it.
    #[serde(default, alias = "logged_by", skip_serializing_if = "Option::is_none")]
    pub logged_by: Option<String>,
    /// Pack the event belongs to.
    #[serde(default, alias = "pack_id", skip_serializing_if = "Option::is_none")]
    pub pack_id: Option<PackCode>,
}

/// An event that has not been assigned an id or timestamp yet.
///
/// Both may be supplied when replaying an event from elsewhere; when
/// absent the [`super::EventStore`] assigns a fresh id and the current time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// What happened.
    pub event_type: EventType,
    /// The text the human entered or said.
    pub raw_text: String,
    /// Type-specific details.
    pub metadata: EventMetadata,
    /// Display name of the pack member logging it.
    pub logged_by: Option<String>,
    /// Pack the event belongs to.
    pub pack_id: Option<PackCode>,
    /// Pre-assigned id, if any.
    pub id: Option<EventId>,
    /// Pre-assigned timestamp in epoch milliseconds, if any.
    pub timestamp: Option<i64>,
}

impl NewEvent {
    /// Creates an event of the given type with empty metadata.
    #[must_use]
    pub fn new(event_type: EventType, raw_text: impl Into<String>) -> Self {
        Self {
            event_type,
            raw_text: raw_text.into(),
            metadata: EventMetadata::default(),
            logged_by: None,
            pack_id: None,
            id: None,
            timestamp: None,
        }
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Pins the event to a timestamp instead of "now".
    #[must_use]
    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Records who logged the event.
    #[must_use]
    pub fn logged_by(mut self, name: impl Into<String>) -> Self {
        self.logged_by = Some(name.into());
        self
    }

    /// Materializes the event, filling in id and timestamp when unset.
    #[must_use]
    pub fn into_event(self, now_ms: i64) -> DogEvent {
        DogEvent {
            id: self.id.unwrap_or_default(),
            event_type: self.event_type,
            raw_text: self.raw_text,
            timestamp: self.timestamp.unwrap_or(now_ms),
            metadata: self.metadata,
            logged_by: self.logged_by,
            pack_id: self.pack_id,
        }
    }
}
