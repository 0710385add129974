//! Remote rows and change notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DogEvent, DogProfile, EventId, EventMetadata, EventType, PackCode};
use crate::error::TailTalkError;

/// A row of the `events` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRow {
    /// Event id.
    pub id: String,
    /// Pack code, if the event belongs to a pack.
    pub pack_id: Option<String>,
    /// Event type wire name.
    pub event_type: String,
    /// Free text.
    pub raw_text: String,
    /// Epoch milliseconds.
    pub ts: i64,
    /// JSONB metadata.
    pub metadata: serde_json::Value,
    /// Member display name.
    pub logged_by: Option<String>,
}

impl From<&DogEvent> for EventRow {
    fn from(event: &DogEvent) -> Self {
        Self {
            id: event.id.to_string(),
            pack_id: event.pack_id.as_ref().map(ToString::to_string),
            event_type: event.event_type.as_str().to_string(),
            raw_text: event.raw_text.clone(),
            ts: event.timestamp,
            metadata: serde_json::to_value(&event.metadata).unwrap_or_default(),
            logged_by: event.logged_by.clone(),
        }
    }
}

impl TryFrom<EventRow> for DogEvent {
    type Error = TailTalkError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let event_type: EventType = row.event_type.parse()?;
        let metadata: EventMetadata = if row.metadata.is_null() {
            EventMetadata::default()
        } else {
            serde_json::from_value(row.metadata)
                .map_err(|e| TailTalkError::RemoteSyncFailure(format!("bad metadata: {e}")))?
        };
        let pack_id = row.pack_id.as_deref().map(PackCode::parse).transpose()?;
        Ok(Self {
            id: EventId::from(row.id),
            event_type,
            raw_text: row.raw_text,
            timestamp: row.ts,
            metadata,
            logged_by: row.logged_by,
            pack_id,
        })
    }
}

/// A published pack: the shared dog profile keyed by code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackRecord {
    /// Pack code.
    pub code: PackCode,
    /// Shared dog profile.
    pub profile: DogProfile,
    /// Last publish time.
    pub updated_at: DateTime<Utc>,
}

/// Change pushed by the remote store.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    /// A row was inserted.
    Inserted(DogEvent),
    /// A row was deleted.
    Deleted(EventId),
}

/// Row operation reported on the `tailtalk_events` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum NotifyOp {
    Insert,
    Delete,
}

/// Payload of the `tailtalk_events` notification channel.
///
/// Only the key travels; inserted rows are read back by id since
/// `NOTIFY` payloads are capped at 8000 bytes.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NotifyPayload {
    pub(crate) op: NotifyOp,
    pub(crate) id: String,
    pub(crate) pack_id: Option<String>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::NewEvent;

    #[test]
    fn row_conversion_preserves_event() {
        let mut new = NewEvent::new(EventType::Poop, "soft");
        new.metadata.consistency = Some(4);
        new.pack_id = PackCode::parse("K7RM2Q").ok();
        let event = new.logged_by("Sam").into_event(77);

        let row = EventRow::from(&event);
        assert_eq!(row.event_type, "poop");
        assert_eq!(row.metadata["consistency"], 4);

        let Ok(back) = DogEvent::try_from(row) else {
            panic!("conversion failed");
        };
        assert_eq!(back, event);
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let row = EventRow {
            id: "x".to_string(),
            pack_id: None,
            event_type: "nap".to_string(),
            raw_text: String::new(),
            ts: 0,
            metadata: serde_json::Value::Null,
            logged_by: None,
        };
        assert!(DogEvent::try_from(row).is_err());
    }

    #[test]
    fn notify_payload_carries_only_the_key() {
        let insert = serde_json::json!({ "op": "INSERT", "id": "r-9", "pack_id": "K7RM2Q" });
        let Ok(payload) = serde_json::from_value::<NotifyPayload>(insert) else {
            panic!("insert payload did not parse");
        };
        assert_eq!(payload.op, NotifyOp::Insert);
        assert_eq!(payload.id, "r-9");
        assert_eq!(payload.pack_id.as_deref(), Some("K7RM2Q"));

        let delete = serde_json::json!({ "op": "DELETE", "id": "r-9", "pack_id": null });
        let Ok(payload) = serde_json::from_value::<NotifyPayload>(delete) else {
            panic!("delete payload did not parse");
        };
        assert_eq!(payload.op, NotifyOp::Delete);
        assert_eq!(payload.pack_id, None);

        let full_row = serde_json::json!({ "op": "INSERT", "record": { "id": "r-9" } });
        assert!(serde_json::from_value::<NotifyPayload>(full_row).is_err());
    }
}
