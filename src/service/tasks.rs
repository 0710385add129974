//! Background tasks driving the service: the recompute ticker and the
//! remote change pump.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::DogService;

/// Recomputes the gauges every `period` so they decay with no new events.
///
/// The first tick fires one full period after the call.
pub fn spawn_ticker(service: Arc<DogService>, period: Duration) -> JoinHandle<()> {
    let period = period.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            service.recompute().await;
        }
    })
}

/// Feeds the remote change stream into the service.
///
/// When the stream ends the service is marked as out of sync.
/// Returns `None` when there is no remote mirror or the subscription
/// cannot be opened; the latter is logged and leaves the service usable
/// with manual refreshes.
pub async fn spawn_remote_listener(service: Arc<DogService>) -> Option<JoinHandle<()>> {
    let mut changes = match service.subscribe_remote().await {
        Ok(Some(rx)) => rx,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(error = %e, "remote change feed unavailable");
            return None;
        }
    };
    tracing::info!("listening for remote changes");
    Some(tokio::spawn(async move {
        while let Some(change) = changes.recv().await {
            service.apply_remote_change(change).await;
        }
        service.mark_feed_lost();
    }))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{EventBus, EventType, NewEvent, Origin, SyncStatus, VitalsEvent};
    use crate::persistence::{MemoryRemote, MemoryStore, RemoteEventStore};
    use crate::service::{Clock, ManualClock};

    const NOW: i64 = 1_750_000_000_000;

    #[tokio::test(start_paused = true)]
    async fn ticker_recomputes_each_period() {
        let clock = Arc::new(ManualClock::new(NOW));
        let service = Arc::new(DogService::new(
            EventBus::new(16),
            Arc::new(MemoryStore::new()),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let _ = service
            .append_event(NewEvent::new(EventType::Food, "").at(NOW))
            .await;
        let mut rx = service.event_bus().subscribe();

        let handle = spawn_ticker(Arc::clone(&service), Duration::from_secs(60));
        assert!(
            tokio::time::timeout(Duration::from_secs(59), rx.recv())
                .await
                .is_err()
        );

        clock.advance(Duration::from_secs(4 * 3600));
        let Ok(Ok(VitalsEvent::StatsUpdated { stats, .. })) =
            tokio::time::timeout(Duration::from_secs(2), rx.recv()).await
        else {
            panic!("expected a tick");
        };
        assert_eq!(stats.tummy, 40);
        handle.abort();
    }

    #[tokio::test]
    async fn listener_ingests_peer_events() {
        let remote = Arc::new(MemoryRemote::new());
        let service = Arc::new(
            DogService::new(
                EventBus::new(16),
                Arc::new(MemoryStore::new()),
                Arc::new(ManualClock::new(NOW)),
            )
            .with_remote(Arc::clone(&remote) as Arc<dyn RemoteEventStore>),
        );
        let mut rx = service.event_bus().subscribe();
        let Some(handle) = spawn_remote_listener(Arc::clone(&service)).await else {
            panic!("listener not started");
        };

        let peer = NewEvent::new(EventType::Walk, "peer walk").into_event(NOW);
        remote.push_from_peer(peer.clone()).await;

        let Ok(Ok(VitalsEvent::EventLogged { event, origin })) =
            tokio::time::timeout(Duration::from_secs(5), rx.recv()).await
        else {
            panic!("expected remote event");
        };
        assert_eq!(event.id, peer.id);
        assert_eq!(origin, Origin::Remote);
        handle.abort();
    }

    #[tokio::test]
    async fn closed_feed_marks_sync_error() {
        let remote = Arc::new(MemoryRemote::new());
        let service = Arc::new(
            DogService::new(
                EventBus::new(16),
                Arc::new(MemoryStore::new()),
                Arc::new(ManualClock::new(NOW)),
            )
            .with_remote(Arc::clone(&remote) as Arc<dyn RemoteEventStore>),
        );
        assert!(matches!(service.refresh().await, Ok(0)));
        assert_eq!(service.sync_status(), SyncStatus::Synced);
        let Some(handle) = spawn_remote_listener(Arc::clone(&service)).await else {
            panic!("listener not started");
        };

        remote.close_feeds().await;
        let Ok(Ok(())) = tokio::time::timeout(Duration::from_secs(5), handle).await else {
            panic!("listener kept running");
        };
        assert_eq!(service.sync_status(), SyncStatus::Error);
    }

    #[tokio::test]
    async fn no_listener_without_remote() {
        let service = Arc::new(DogService::new(
            EventBus::new(4),
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(NOW)),
        ));
        assert!(spawn_remote_listener(service).await.is_none());
    }
}
