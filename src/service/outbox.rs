//! Per-event remote mirror bookkeeping.
//!
//! Every local append or delete is committed to the [`crate::domain::EventStore`]
//! first and recorded here as a [`PendingWrite`]. The write stays in the
//! outbox until the remote store confirms it, so a full reconcile that
//! lands before the confirmation can replay it instead of losing it.
//!
//! Each tracked write carries a generation number. A reconcile notes the
//! generation before it fetches; writes tracked after that point are
//! replayed whatever their state, because the fetched snapshot may
//! predate them even when the remote store already confirmed them.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::Mutex;
use utoipa::ToSchema;

use crate::domain::{DogEvent, EventId};

/// Remote state of one local write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MirrorState {
    /// Sent, or about to be, with no answer yet.
    Pending,
    /// The remote store accepted it.
    Synced,
    /// The remote call failed or timed out. Retried on the next refresh.
    Failed,
}

/// A local write waiting for the remote store.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    /// The event was appended locally.
    Insert(DogEvent),
    /// The event was deleted locally.
    Delete(EventId),
}

impl PendingWrite {
    /// Id of the affected event.
    #[must_use]
    pub fn id(&self) -> &EventId {
        match self {
            Self::Insert(event) => &event.id,
            Self::Delete(id) => id,
        }
    }
}

/// Position in the outbox's write history. See [`Outbox::generation`].
pub type Generation = u64;

#[derive(Debug)]
struct Entry {
    write: PendingWrite,
    state: MirrorState,
    generation: Generation,
}

#[derive(Debug, Default)]
struct Entries {
    by_id: HashMap<EventId, Entry>,
    next: Generation,
}

/// Tracks local writes until the remote store confirms them.
#[derive(Debug, Default)]
pub struct Outbox {
    entries: Mutex<Entries>,
}

impl Outbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a write as pending, replacing any earlier write for the
    /// same event.
    pub async fn track(&self, write: PendingWrite) {
        let id = write.id().clone();
        let mut entries = self.entries.lock().await;
        let generation = entries.next;
        entries.next += 1;
        entries.by_id.insert(
            id,
            Entry {
                write,
                state: MirrorState::Pending,
                generation,
            },
        );
    }

    /// Generation the next tracked write will get.
    pub async fn generation(&self) -> Generation {
        self.entries.lock().await.next
    }

    /// Marks the write as confirmed, unless it was superseded in the
    /// meantime.
    pub async fn mark_synced(&self, write: &PendingWrite) {
        if let Some(entry) = self.entries.lock().await.by_id.get_mut(write.id())
            && &entry.write == write
        {
            entry.state = MirrorState::Synced;
        }
    }

    /// Confirms a pending insert after the remote store echoed the event
    /// back through its change feed.
    pub async fn confirm_insert(&self, id: &EventId) {
        if let Some(entry) = self.entries.lock().await.by_id.get_mut(id)
            && matches!(entry.write, PendingWrite::Insert(_))
        {
            entry.state = MirrorState::Synced;
        }
    }

    /// Marks the write as failed, unless it was superseded in the meantime.
    pub async fn mark_failed(&self, write: &PendingWrite) {
        if let Some(entry) = self.entries.lock().await.by_id.get_mut(write.id())
            && &entry.write == write
        {
            entry.state = MirrorState::Failed;
        }
    }

    /// Mirror state of the latest write for `id`.
    pub async fn state(&self, id: &EventId) -> Option<MirrorState> {
        self.entries.lock().await.by_id.get(id).map(|e| e.state)
    }

    /// Writes a snapshot taken at generation `since` may be missing:
    /// everything unconfirmed plus everything tracked at or after `since`.
    pub async fn replay_since(&self, since: Generation) -> Vec<PendingWrite> {
        let entries = self.entries.lock().await;
        let mut writes: Vec<(Generation, PendingWrite)> = entries
            .by_id
            .values()
            .filter(|e| e.state != MirrorState::Synced || e.generation >= since)
            .map(|e| (e.generation, e.write.clone()))
            .collect();
        writes.sort_by_key(|(generation, _)| *generation);
        writes.into_iter().map(|(_, write)| write).collect()
    }

    /// Failed writes, flipped back to pending for a retry.
    pub async fn take_failed(&self) -> Vec<PendingWrite> {
        let mut entries = self.entries.lock().await;
        entries
            .by_id
            .values_mut()
            .filter(|e| e.state == MirrorState::Failed)
            .map(|e| {
                e.state = MirrorState::Pending;
                e.write.clone()
            })
            .collect()
    }

    /// Drops confirmed entries tracked before `since`. A snapshot fetched
    /// after that point already reflects them.
    pub async fn prune_synced(&self, since: Generation) {
        self.entries
            .lock()
            .await
            .by_id
            .retain(|_, e| e.state != MirrorState::Synced || e.generation >= since);
    }

    /// Forgets everything.
    pub async fn clear(&self) {
        self.entries.lock().await.by_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventType, NewEvent};

    fn insert(ts: i64) -> PendingWrite {
        PendingWrite::Insert(NewEvent::new(EventType::Food, "kibble").into_event(ts))
    }

    #[tokio::test]
    async fn writes_move_through_states() {
        let outbox = Outbox::new();
        let write = insert(1);
        let id = write.id().clone();

        outbox.track(write.clone()).await;
        assert_eq!(outbox.state(&id).await, Some(MirrorState::Pending));
        assert_eq!(outbox.replay_since(1).await, vec![write.clone()]);

        outbox.mark_failed(&write).await;
        assert_eq!(outbox.state(&id).await, Some(MirrorState::Failed));
        assert_eq!(outbox.take_failed().await, vec![write]);
        assert_eq!(outbox.state(&id).await, Some(MirrorState::Pending));

        outbox.confirm_insert(&id).await;
        assert!(outbox.replay_since(1).await.is_empty());
        outbox.prune_synced(1).await;
        assert_eq!(outbox.state(&id).await, None);
    }

    #[tokio::test]
    async fn stale_failure_does_not_clobber_newer_write() {
        let outbox = Outbox::new();
        let write = insert(1);
        let id = write.id().clone();
        outbox.track(write.clone()).await;
        outbox.track(PendingWrite::Delete(id.clone())).await;

        outbox.mark_failed(&write).await;
        outbox.mark_synced(&write).await;
        outbox.confirm_insert(&id).await;
        assert_eq!(outbox.state(&id).await, Some(MirrorState::Pending));
        assert_eq!(outbox.replay_since(2).await, vec![PendingWrite::Delete(id)]);
    }

    #[tokio::test]
    async fn confirmed_writes_after_the_snapshot_are_still_replayed() {
        let outbox = Outbox::new();
        let early = insert(1);
        outbox.track(early.clone()).await;
        outbox.mark_synced(&early).await;

        let since = outbox.generation().await;
        let late = insert(2);
        outbox.track(late.clone()).await;
        outbox.mark_synced(&late).await;

        assert_eq!(outbox.replay_since(since).await, vec![late.clone()]);
        outbox.prune_synced(since).await;
        assert_eq!(outbox.state(early.id()).await, None);
        assert_eq!(outbox.state(late.id()).await, Some(MirrorState::Synced));

        let next = outbox.generation().await;
        outbox.prune_synced(next).await;
        assert_eq!(outbox.state(late.id()).await, None);
    }
}
