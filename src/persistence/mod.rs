//! Persistence layer: remote mirror, pack registry and local key-value
//! storage.
//!
//! The remote side is expressed as two traits, [`RemoteEventStore`] and
//! [`GroupRegistry`], with a PostgreSQL implementation for production and
//! an in-memory one for tests and offline runs. [`LocalStore`] is the
//! device's durable key-value storage for the profile and member list.

pub mod local_store;
pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{DogEvent, EventId, PackCode};
use crate::error::TailTalkError;

pub use local_store::{FileStore, LocalStore, MemoryStore};
pub use memory::MemoryRemote;
pub use models::{PackRecord, RemoteChange};
pub use postgres::PostgresRemote;

/// Hosted store that mirrors the event log across devices.
#[async_trait]
pub trait RemoteEventStore: Send + Sync + fmt::Debug {
    /// Lists events, newest first, restricted to `pack` when given.
    async fn list_events(&self, pack: Option<&PackCode>) -> Result<Vec<DogEvent>, TailTalkError>;

    /// Inserts an event. Inserting an id that already exists succeeds
    /// without changing the stored row.
    async fn insert_event(&self, event: &DogEvent) -> Result<(), TailTalkError>;

    /// Deletes an event by id. Deleting a missing id succeeds.
    async fn delete_event(&self, id: &EventId) -> Result<(), TailTalkError>;

    /// Streams insert/delete notifications for `pack`, including the ones
    /// caused by this device.
    async fn subscribe(
        &self,
        pack: Option<&PackCode>,
    ) -> Result<mpsc::Receiver<RemoteChange>, TailTalkError>;
}

/// Hosted registry of published packs.
#[async_trait]
pub trait GroupRegistry: Send + Sync + fmt::Debug {
    /// Creates or replaces the record keyed by its code.
    async fn upsert_pack(&self, record: &PackRecord) -> Result<(), TailTalkError>;

    /// Fetches the record for `code`, or `None` if it was never published.
    async fn fetch_pack(&self, code: &PackCode) -> Result<Option<PackRecord>, TailTalkError>;
}
