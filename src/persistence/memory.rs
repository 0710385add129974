//! In-memory remote store.
//!
//! Behaves like the PostgreSQL mirror, including change notifications for
//! every insert and delete, and can be told to fail so callers can
//! exercise their degraded paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast, mpsc};

use super::models::{PackRecord, RemoteChange};
use super::{GroupRegistry, RemoteEventStore};
use crate::domain::{DogEvent, EventId, PackCode};
use crate::error::TailTalkError;

/// Remote store kept in process memory.
#[derive(Debug)]
pub struct MemoryRemote {
    events: Mutex<Vec<DogEvent>>,
    packs: Mutex<HashMap<PackCode, PackRecord>>,
    changes: Mutex<broadcast::Sender<RemoteChange>>,
    failing: AtomicBool,
}

impl MemoryRemote {
    /// Creates an empty, healthy store.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            events: Mutex::new(Vec::new()),
            packs: Mutex::new(HashMap::new()),
            changes: Mutex::new(changes),
            failing: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Adds a row as if another device had written it, notifying
    /// subscribers.
    pub async fn push_from_peer(&self, event: DogEvent) {
        self.events.lock().await.push(event.clone());
        self.notify(RemoteChange::Inserted(event)).await;
    }

    /// Deletes a row as if another device had removed it.
    pub async fn delete_from_peer(&self, id: &EventId) {
        self.events.lock().await.retain(|e| &e.id != id);
        self.notify(RemoteChange::Deleted(id.clone())).await;
    }

    /// Ends every open change feed, as a dropped database connection
    /// would. Later subscriptions get a fresh feed.
    pub async fn close_feeds(&self) {
        let (fresh, _) = broadcast::channel(256);
        *self.changes.lock().await = fresh;
    }

    async fn notify(&self, change: RemoteChange) {
        let _ = self.changes.lock().await.send(change);
    }

    /// Returns a copy of the stored rows.
    pub async fn stored_events(&self) -> Vec<DogEvent> {
        self.events.lock().await.clone()
    }

    fn check(&self) -> Result<(), TailTalkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TailTalkError::RemoteSyncFailure("remote unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

fn in_pack(event: &DogEvent, pack: Option<&PackCode>) -> bool {
    pack.is_none_or(|p| event.pack_id.as_ref() == Some(p))
}

#[async_trait]
impl RemoteEventStore for MemoryRemote {
    async fn list_events(&self, pack: Option<&PackCode>) -> Result<Vec<DogEvent>, TailTalkError> {
        self.check()?;
        let mut events: Vec<DogEvent> = self
            .events
            .lock()
            .await
            .iter()
            .filter(|e| in_pack(e, pack))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(events)
    }

    async fn insert_event(&self, event: &DogEvent) -> Result<(), TailTalkError> {
        self.check()?;
        let mut events = self.events.lock().await;
        if events.iter().any(|e| e.id == event.id) {
            return Ok(());
        }
        events.push(event.clone());
        drop(events);
        self.notify(RemoteChange::Inserted(event.clone())).await;
        Ok(())
    }

    async fn delete_event(&self, id: &EventId) -> Result<(), TailTalkError> {
        self.check()?;
        let mut events = self.events.lock().await;
        let before = events.len();
        events.retain(|e| &e.id != id);
        let removed = events.len() != before;
        drop(events);
        if removed {
            self.notify(RemoteChange::Deleted(id.clone())).await;
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        pack: Option<&PackCode>,
    ) -> Result<mpsc::Receiver<RemoteChange>, TailTalkError> {
        self.check()?;
        let mut changes = self.changes.lock().await.subscribe();
        let (tx, rx) = mpsc::channel(64);
        let pack = pack.cloned();
        tokio::spawn(async move {
            loop {
                let change = match changes.recv().await {
                    Ok(c) => c,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "memory remote subscriber lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if let RemoteChange::Inserted(event) = &change
                    && !in_pack(event, pack.as_ref())
                {
                    continue;
                }
                if tx.send(change).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

#[async_trait]
impl GroupRegistry for MemoryRemote {
    async fn upsert_pack(&self, record: &PackRecord) -> Result<(), TailTalkError> {
        self.check()?;
        self.packs
            .lock()
            .await
            .insert(record.code.clone(), record.clone());
        Ok(())
    }

    async fn fetch_pack(&self, code: &PackCode) -> Result<Option<PackRecord>, TailTalkError> {
        self.check()?;
        Ok(self.packs.lock().await.get(code).cloned())
    }
}
