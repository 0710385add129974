//! Event log DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{DogEvent, EventId, EventMetadata, EventType, NewEvent};
use crate::error::TailTalkError;

/// Request body for `POST /events`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// What the human typed or said.
    #[serde(default)]
    pub raw_text: String,
    /// Type-specific details.
    #[serde(default)]
    pub metadata: EventMetadata,
    /// Member logging the event.
    #[serde(default, alias = "logged_by")]
    pub logged_by: Option<String>,
    /// Epoch milliseconds; defaults to now.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Client-assigned id; defaults to a fresh UUID.
    #[serde(default)]
    pub id: Option<EventId>,
}

impl From<CreateEventRequest> for NewEvent {
    fn from(req: CreateEventRequest) -> Self {
        let mut new = Self::new(req.event_type, req.raw_text).with_metadata(req.metadata);
        new.logged_by = req.logged_by;
        new.timestamp = req.timestamp;
        new.id = req.id;
        new
    }
}

/// Query parameters for `GET /events`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventListQuery {
    /// Only events of this type (`pee`, `poop`, `food`, `water`, `walk`,
    /// `health_check`).
    #[serde(rename = "type")]
    pub event_type: Option<String>,
}

impl EventListQuery {
    /// Parses the type filter.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::InvalidRequest`] for unknown types.
    pub fn filter(&self) -> Result<Option<EventType>, TailTalkError> {
        self.event_type
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<EventType>)
            .transpose()
    }
}

/// Response body for `GET /events`.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventListResponse {
    /// Events, most recent first.
    pub data: Vec<DogEvent>,
    /// Number of events returned.
    pub total: usize,
}
