//! Authoritative in-memory event log.
//!
//! [`EventStore`] keeps the log behind a single [`tokio::sync::RwLock`], so
//! every mutation is serialized and readers always see a complete log,
//! never one that is half-way through an insert or a reconcile.

use std::collections::HashSet;

use tokio::sync::RwLock;

use super::{DogEvent, EventId, EventType, NewEvent};
use crate::error::TailTalkError;

/// Event log with an at-most-one-entry-per-id invariant.
///
/// Entries are kept most-recent-first. The ordering is for display only;
/// nothing downstream depends on it.
#[derive(Debug, Default)]
pub struct EventStore {
    events: RwLock<Vec<DogEvent>>,
}

impl EventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs a new event, assigning an id and `now_ms` as timestamp when
    /// the caller did not supply them.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::InvalidRequest`] if the caller supplied an
    /// id that is already in the log.
    pub async fn append(&self, new: NewEvent, now_ms: i64) -> Result<DogEvent, TailTalkError> {
        let event = new.into_event(now_ms);
        let mut log = self.events.write().await;
        if log.iter().any(|e| e.id == event.id) {
            return Err(TailTalkError::InvalidRequest(format!(
                "event {} already exists",
                event.id
            )));
        }
        insert_sorted(&mut log, event.clone());
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "event appended");
        Ok(event)
    }

    /// Deletes the event with the given id, returning it.
    ///
    /// Removing an id that is not present is a no-op and returns `None`.
    pub async fn remove(&self, id: &EventId) -> Option<DogEvent> {
        let mut log = self.events.write().await;
        let pos = log.iter().position(|e| &e.id == id)?;
        let removed = log.remove(pos);
        tracing::debug!(event_id = %id, "event removed");
        Some(removed)
    }

    /// Merges an event observed on another device.
    ///
    /// Idempotent: returns `false` and leaves the log untouched if an event
    /// with the same id is already present.
    pub async fn ingest_remote(&self, event: DogEvent) -> bool {
        let mut log = self.events.write().await;
        if log.iter().any(|e| e.id == event.id) {
            tracing::trace!(event_id = %event.id, "duplicate remote event discarded");
            return false;
        }
        insert_sorted(&mut log, event);
        true
    }

    /// Replaces the whole log with a freshly fetched remote set.
    ///
    /// This is an overwrite, not a merge. Duplicate ids inside `snapshot`
    /// keep their first occurrence. Returns the new log length.
    pub async fn reconcile_full(&self, snapshot: Vec<DogEvent>) -> usize {
        let mut seen = HashSet::with_capacity(snapshot.len());
        let mut fresh: Vec<DogEvent> = snapshot
            .into_iter()
            .filter(|e| seen.insert(e.id.clone()))
            .collect();
        fresh.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut log = self.events.write().await;
        *log = fresh;
        tracing::debug!(len = log.len(), "event log replaced");
        log.len()
    }

    /// Returns a consistent copy of the full log, most-recent-first.
    pub async fn snapshot(&self) -> Vec<DogEvent> {
        self.events.read().await.clone()
    }

    /// Returns the log filtered to one event type, most-recent-first.
    pub async fn list(&self, filter: Option<EventType>) -> Vec<DogEvent> {
        let log = self.events.read().await;
        log.iter()
            .filter(|e| filter.is_none_or(|t| e.event_type == t))
            .cloned()
            .collect()
    }

    /// Returns the event with the given id, if present.
    pub async fn get(&self, id: &EventId) -> Option<DogEvent> {
        self.events.read().await.iter().find(|e| &e.id == id).cloned()
    }

    /// Returns `true` if an event with the given id is present.
    pub async fn contains(&self, id: &EventId) -> bool {
        self.events.read().await.iter().any(|e| &e.id == id)
    }

    /// Drops every event (cache reset).
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }

    /// Returns the number of events in the log.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns `true` if the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

/// Inserts keeping descending timestamp order; ties go after existing
/// entries with the same timestamp.
fn insert_sorted(log: &mut Vec<DogEvent>, event: DogEvent) {
    let pos = log.partition_point(|e| e.timestamp >= event.timestamp);
    log.insert(pos, event);
}
