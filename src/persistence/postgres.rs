//! PostgreSQL implementation of the remote mirror and pack registry.
//!
//! Change notifications come from a trigger on `events` that calls
//! `pg_notify('tailtalk_events', …)` with the row key only; see
//! `migrations/`. Inserted rows are read back before being forwarded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::mpsc;

use super::models::{EventRow, NotifyOp, NotifyPayload, PackRecord, RemoteChange};
use super::{GroupRegistry, RemoteEventStore};
use crate::domain::{DogEvent, DogProfile, EventId, PackCode};
use crate::error::TailTalkError;

/// Notification channel fed by the `events` trigger.
pub const NOTIFY_CHANNEL: &str = "tailtalk_events";

const SUBSCRIPTION_BUFFER: usize = 256;

/// PostgreSQL-backed remote store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresRemote {
    pool: PgPool,
}

impl PostgresRemote {
    /// Creates a new remote store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn fetch_event(pool: &PgPool, id: &str) -> Result<Option<DogEvent>, TailTalkError> {
    let row = sqlx::query_as::<_, EventRow>(
        "SELECT id, pack_id, event_type, raw_text, ts, metadata, logged_by FROM events WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(DogEvent::try_from).transpose()
}

/// Turns a notification into a change. `None` when an inserted row is
/// already gone again.
async fn resolve(pool: &PgPool, payload: NotifyPayload) -> Result<Option<RemoteChange>, TailTalkError> {
    match payload.op {
        NotifyOp::Delete => Ok(Some(RemoteChange::Deleted(EventId::from(payload.id)))),
        NotifyOp::Insert => Ok(fetch_event(pool, &payload.id)
            .await?
            .map(RemoteChange::Inserted)),
    }
}

#[async_trait]
impl RemoteEventStore for PostgresRemote {
    async fn list_events(&self, pack: Option<&PackCode>) -> Result<Vec<DogEvent>, TailTalkError> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT id, pack_id, event_type, raw_text, ts, metadata, logged_by FROM events \
             WHERE ($1::text IS NULL OR pack_id = $1) ORDER BY ts DESC",
        )
        .bind(pack.map(PackCode::as_str))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                DogEvent::try_from(row)
                    .map_err(|e| tracing::warn!(event_id = %id, error = %e, "skipping unreadable remote row"))
                    .ok()
            })
            .collect())
    }

    async fn insert_event(&self, event: &DogEvent) -> Result<(), TailTalkError> {
        let row = EventRow::from(event);
        sqlx::query(
            "INSERT INTO events (id, pack_id, event_type, raw_text, ts, metadata, logged_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (id) DO NOTHING",
        )
        .bind(&row.id)
        .bind(&row.pack_id)
        .bind(&row.event_type)
        .bind(&row.raw_text)
        .bind(row.ts)
        .bind(&row.metadata)
        .bind(&row.logged_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_event(&self, id: &EventId) -> Result<(), TailTalkError> {
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        pack: Option<&PackCode>,
    ) -> Result<mpsc::Receiver<RemoteChange>, TailTalkError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(NOTIFY_CHANNEL).await?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let pack = pack.cloned();
        let pool = self.pool.clone();
        tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::warn!(error = %e, "remote change listener stopped");
                        break;
                    }
                };
                let payload = match serde_json::from_str::<NotifyPayload>(notification.payload()) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring malformed change notification");
                        continue;
                    }
                };
                if let Some(code) = &pack
                    && payload.pack_id.as_deref() != Some(code.as_str())
                {
                    continue;
                }
                let id = payload.id.clone();
                match resolve(&pool, payload).await {
                    Ok(Some(change)) => {
                        if tx.send(change).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => tracing::debug!(event_id = %id, "notified row already deleted"),
                    Err(e) => tracing::warn!(event_id = %id, error = %e, "ignoring unreadable change"),
                }
            }
        });

        Ok(rx)
    }
}

#[async_trait]
impl GroupRegistry for PostgresRemote {
    async fn upsert_pack(&self, record: &PackRecord) -> Result<(), TailTalkError> {
        let profile = serde_json::to_value(&record.profile)
            .map_err(|e| TailTalkError::Internal(e.to_string()))?;
        sqlx::query(
            "INSERT INTO packs (code, profile, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (code) DO UPDATE SET profile = EXCLUDED.profile, updated_at = EXCLUDED.updated_at",
        )
        .bind(record.code.as_str())
        .bind(profile)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_pack(&self, code: &PackCode) -> Result<Option<PackRecord>, TailTalkError> {
        let row = sqlx::query_as::<_, (String, serde_json::Value, DateTime<Utc>)>(
            "SELECT code, profile, updated_at FROM packs WHERE code = $1",
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some((code, profile, updated_at)) = row else {
            return Ok(None);
        };
        let profile: DogProfile = serde_json::from_value(profile)
            .map_err(|e| TailTalkError::RemoteSyncFailure(format!("bad pack profile: {e}")))?;
        Ok(Some(PackRecord {
            code: PackCode::parse(&code)?,
            profile,
            updated_at,
        }))
    }
}
