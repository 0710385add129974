//! Dog service: the application state container.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use utoipa::ToSchema;

use super::clock::Clock;
use super::outbox::{MirrorState, Outbox, PendingWrite};
use super::sync::SyncIndicator;
use crate::domain::{
    DogEvent, DogProfile, EventBus, EventId, EventMetadata, EventStore, EventType, LifeStage,
    NewEvent, Origin, PackCode, StatsSnapshot, SyncStatus, UserProfile, VitalsEngine,
    VitalsEvent, VitalsTuning,
};
use crate::error::TailTalkError;
use crate::intake::{GenerativeIntake, StoolAnalysis, fallback_reply};
use crate::persistence::local_store::{PROFILE_KEY, USERS_KEY, load_json, save_json};
use crate::persistence::{GroupRegistry, LocalStore, PackRecord, RemoteChange, RemoteEventStore};

/// Timeout applied to remote and generative calls unless configured.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw text of the walk logged by [`DogService::take_break`].
pub const BREAK_RAW_TEXT: &str = "Potty break (auto-logged)";

/// Runs `fut` with a deadline, mapping expiry through `on_timeout`.
async fn bounded<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, TailTalkError>>,
    on_timeout: fn(String) -> TailTalkError,
) -> Result<T, TailTalkError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| on_timeout(format!("timed out after {}s", timeout.as_secs())))?
}

/// Work for the mirror worker.
#[derive(Debug)]
enum MirrorJob {
    Write(PendingWrite),
    Flush(oneshot::Sender<()>),
}

/// Sends local writes to the remote store.
#[derive(Debug, Clone)]
struct MirrorWriter {
    remote: Arc<dyn RemoteEventStore>,
    outbox: Arc<Outbox>,
    sync: Arc<SyncIndicator>,
    timeout: Duration,
}

impl MirrorWriter {
    /// Drains the queue one job at a time until every sender is gone.
    async fn run(self, mut jobs: mpsc::UnboundedReceiver<MirrorJob>) {
        while let Some(job) = jobs.recv().await {
            match job {
                MirrorJob::Write(write) => self.push(write).await,
                MirrorJob::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        tracing::debug!("mirror worker stopped");
    }

    async fn push(&self, write: PendingWrite) {
        self.sync.set(SyncStatus::Syncing);
        let result = match &write {
            PendingWrite::Insert(event) => {
                bounded(self.timeout, self.remote.insert_event(event), TailTalkError::RemoteSyncFailure)
                    .await
            }
            PendingWrite::Delete(id) => {
                bounded(self.timeout, self.remote.delete_event(id), TailTalkError::RemoteSyncFailure)
                    .await
            }
        };
        match result {
            Ok(()) => {
                self.outbox.mark_synced(&write).await;
                self.sync.set(SyncStatus::Synced);
            }
            Err(e) => {
                tracing::warn!(event_id = %write.id(), error = %e, "remote mirror write failed");
                self.outbox.mark_failed(&write).await;
                self.sync.set(SyncStatus::Error);
            }
        }
    }
}

/// Remote mirror. Writes go through a single queue so the remote store
/// sees them in the order they were made locally.
#[derive(Debug)]
struct Mirror {
    writer: MirrorWriter,
    queue: mpsc::UnboundedSender<MirrorJob>,
    idle: Mutex<Option<mpsc::UnboundedReceiver<MirrorJob>>>,
}

impl Mirror {
    fn new(writer: MirrorWriter) -> Self {
        let (queue, jobs) = mpsc::unbounded_channel();
        Self {
            writer,
            queue,
            idle: Mutex::new(Some(jobs)),
        }
    }

    /// Queues a job, starting the worker on first use.
    async fn send(&self, job: MirrorJob) {
        if let Some(jobs) = self.idle.lock().await.take() {
            tokio::spawn(self.writer.clone().run(jobs));
        }
        if self.queue.send(job).is_err() {
            tracing::warn!("mirror worker is gone; write dropped");
        }
    }
}

/// Result of a voice command.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoiceOutcome {
    /// The logged event.
    pub event: DogEvent,
    /// The dog's reply, if one could be produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

/// Result of a stool scan.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScanOutcome {
    /// What the image service saw.
    pub analysis: StoolAnalysis,
    /// The `health_check` event logged for it.
    pub event: DogEvent,
}

/// Owns the event log, the profile and the current gauges.
///
/// Every mutation goes through a method here: the log is changed first,
/// the gauges are recomputed, a [`VitalsEvent`] is published, and local
/// writes are handed to the remote mirror in the background. Remote
/// failures never roll back local state; they show up in
/// [`DogService::sync_status`] and per event in [`DogService::mirror_state`].
#[derive(Debug)]
pub struct DogService {
    store: EventStore,
    engine: VitalsEngine,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    local: Arc<dyn LocalStore>,
    mirror: Option<Mirror>,
    registry: Option<Arc<dyn GroupRegistry>>,
    intake: Option<Arc<dyn GenerativeIntake>>,
    profile: RwLock<Option<DogProfile>>,
    stats: RwLock<StatsSnapshot>,
    outbox: Arc<Outbox>,
    sync: Arc<SyncIndicator>,
    mutation: Mutex<()>,
    remote_timeout: Duration,
}

impl DogService {
    /// Creates a local-only service with default tuning.
    #[must_use]
    pub fn new(event_bus: EventBus, local: Arc<dyn LocalStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: EventStore::new(),
            engine: VitalsEngine::default(),
            sync: Arc::new(SyncIndicator::new(SyncStatus::Local, event_bus.clone())),
            event_bus,
            clock,
            local,
            mirror: None,
            registry: None,
            intake: None,
            profile: RwLock::new(None),
            stats: RwLock::new(StatsSnapshot::BASELINE),
            outbox: Arc::new(Outbox::new()),
            mutation: Mutex::new(()),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    /// Replaces the engine tuning.
    #[must_use]
    pub fn with_tuning(mut self, tuning: VitalsTuning) -> Self {
        self.engine = VitalsEngine::new(tuning);
        self
    }

    /// Mirrors the log to `remote`.
    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn RemoteEventStore>) -> Self {
        self.mirror = Some(Mirror::new(MirrorWriter {
            remote,
            outbox: Arc::clone(&self.outbox),
            sync: Arc::clone(&self.sync),
            timeout: self.remote_timeout,
        }));
        self
    }

    /// Publishes and resolves packs through `registry`.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn GroupRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Enables voice commands, stool scans and avatar replies.
    #[must_use]
    pub fn with_intake(mut self, intake: Arc<dyn GenerativeIntake>) -> Self {
        self.intake = Some(intake);
        self
    }

    /// Sets the deadline for every remote and generative call.
    #[must_use]
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        if let Some(mirror) = &mut self.mirror {
            mirror.writer.timeout = timeout;
        }
        self
    }

    /// Returns the event bus.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns `true` if a remote mirror is configured.
    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.mirror.is_some()
    }

    /// Loads the persisted profile and computes the initial gauges.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::Storage`] if the stored profile cannot be
    /// read.
    pub async fn load(&self) -> Result<Option<DogProfile>, TailTalkError> {
        let profile: Option<DogProfile> = load_json(self.local.as_ref(), PROFILE_KEY).await?;
        if let Some(p) = &profile {
            tracing::info!(dog = %p.name, life_stage = %p.life_stage, "profile loaded");
        }
        *self.profile.write().await = profile.clone();
        self.recompute().await;
        Ok(profile)
    }

    // --- event log ---

    /// Logs an event locally and mirrors it in the background.
    ///
    /// The event is stamped with the profile's pack unless the caller set
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::InvalidRequest`] if the metadata is out of
    /// range or the caller supplied an id that is already logged.
    pub async fn append_event(&self, mut new: NewEvent) -> Result<DogEvent, TailTalkError> {
        new.metadata.validate()?;
        if new.pack_id.is_none() {
            new.pack_id = self.pack_code().await;
        }
        let event = {
            let _guard = self.mutation.lock().await;
            let event = self.store.append(new, self.clock.now_ms()).await?;
            self.queue_mirror(PendingWrite::Insert(event.clone())).await;
            event
        };
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "event logged");

        let _ = self.event_bus.publish(VitalsEvent::EventLogged {
            event: event.clone(),
            origin: Origin::Local,
        });
        self.recompute().await;
        Ok(event)
    }

    /// Deletes an event locally and mirrors the deletion.
    ///
    /// Deleting an id that is not in the log does nothing and returns
    /// `None`.
    pub async fn remove_event(&self, id: &EventId) -> Option<DogEvent> {
        let removed = {
            let _guard = self.mutation.lock().await;
            let removed = self.store.remove(id).await?;
            self.queue_mirror(PendingWrite::Delete(id.clone())).await;
            removed
        };
        tracing::info!(event_id = %id, event_type = %removed.event_type, "event removed");

        let _ = self.event_bus.publish(VitalsEvent::EventRemoved {
            event_id: id.clone(),
            origin: Origin::Local,
        });
        self.recompute().await;
        Some(removed)
    }

    /// Merges an event seen on another device. Returns `false` for
    /// duplicates, which leave the log untouched.
    pub async fn ingest_remote(&self, event: DogEvent) -> bool {
        let ingested = {
            let _guard = self.mutation.lock().await;
            self.outbox.confirm_insert(&event.id).await;
            self.store.ingest_remote(event.clone()).await
        };
        if !ingested {
            return false;
        }
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "remote event ingested");
        let _ = self.event_bus.publish(VitalsEvent::EventLogged {
            event,
            origin: Origin::Remote,
        });
        self.recompute().await;
        true
    }

    /// Applies a deletion made on another device.
    pub async fn remove_remote(&self, id: &EventId) -> bool {
        let removed = {
            let _guard = self.mutation.lock().await;
            self.store.remove(id).await
        };
        if removed.is_none() {
            return false;
        }
        tracing::debug!(event_id = %id, "remote deletion applied");
        let _ = self.event_bus.publish(VitalsEvent::EventRemoved {
            event_id: id.clone(),
            origin: Origin::Remote,
        });
        self.recompute().await;
        true
    }

    /// Routes one change from the remote feed.
    ///
    /// Inserts for another pack are ignored.
    pub async fn apply_remote_change(&self, change: RemoteChange) {
        match change {
            RemoteChange::Inserted(event) => {
                let pack = self.pack_code().await;
                if pack.is_some() && event.pack_id != pack {
                    tracing::trace!(event_id = %event.id, "remote event for another pack ignored");
                    return;
                }
                self.ingest_remote(event).await;
            }
            RemoteChange::Deleted(id) => {
                self.remove_remote(&id).await;
            }
        }
    }

    /// Replaces the log with the remote store's copy.
    ///
    /// Local writes the remote store has not confirmed, and every local
    /// write made after the fetch started, are replayed on top of the
    /// fetched set. A refresh therefore never drops a local append or
    /// resurrects a local delete. Local mutations wait while the merged
    /// log is installed. Failed writes are then retried.
    /// Without a remote mirror this only returns the current log size.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::RemoteSyncFailure`] if the fetch fails or
    /// times out; the local log is left as it was.
    pub async fn refresh(&self) -> Result<usize, TailTalkError> {
        let Some(mirror) = &self.mirror else {
            return Ok(self.store.len().await);
        };
        let pack = self.pack_code().await;

        self.sync.set(SyncStatus::Syncing);
        let since = self.outbox.generation().await;
        let fetched = match bounded(
            self.remote_timeout,
            mirror.writer.remote.list_events(pack.as_ref()),
            TailTalkError::RemoteSyncFailure,
        )
        .await
        {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "remote refresh failed");
                self.sync.set(SyncStatus::Error);
                return Err(e);
            }
        };
        let fetched_len = fetched.len();

        let guard = self.mutation.lock().await;
        let pending = self.outbox.replay_since(since).await;
        let deleted: HashSet<&EventId> = pending
            .iter()
            .filter_map(|w| match w {
                PendingWrite::Delete(id) => Some(id),
                PendingWrite::Insert(_) => None,
            })
            .collect();
        let mut merged: Vec<DogEvent> = fetched
            .into_iter()
            .filter(|e| !deleted.contains(&e.id))
            .collect();
        merged.extend(pending.iter().filter_map(|w| match w {
            PendingWrite::Insert(event) => Some(event.clone()),
            PendingWrite::Delete(_) => None,
        }));

        let count = self.store.reconcile_full(merged).await;
        self.outbox.prune_synced(since).await;
        drop(guard);
        tracing::info!(fetched = fetched_len, replayed = pending.len(), count, "event log reconciled");

        let _ = self.event_bus.publish(VitalsEvent::LogReplaced {
            count,
            timestamp: self.timestamp(),
        });
        self.sync.set(SyncStatus::Synced);
        self.recompute().await;

        for write in self.outbox.take_failed().await {
            mirror.send(MirrorJob::Write(write)).await;
        }
        Ok(count)
    }

    /// Lists events most-recent-first, optionally of one type.
    pub async fn events(&self, filter: Option<EventType>) -> Vec<DogEvent> {
        self.store.list(filter).await
    }

    /// Returns one event.
    pub async fn event(&self, id: &EventId) -> Option<DogEvent> {
        self.store.get(id).await
    }

    /// Remote state of the latest local write for `id`, while tracked.
    pub async fn mirror_state(&self, id: &EventId) -> Option<MirrorState> {
        self.outbox.state(id).await
    }

    /// Waits until every mirror write queued so far has been answered.
    pub async fn flush_mirrors(&self) {
        let Some(mirror) = &self.mirror else {
            return;
        };
        let (done, flushed) = oneshot::channel();
        mirror.send(MirrorJob::Flush(done)).await;
        let _ = flushed.await;
    }

    async fn queue_mirror(&self, write: PendingWrite) {
        let Some(mirror) = &self.mirror else {
            return;
        };
        self.outbox.track(write.clone()).await;
        mirror.send(MirrorJob::Write(write)).await;
    }

    // --- vitals ---

    /// Recomputes the gauges from the whole log at the clock's "now".
    ///
    /// Also clears a pending break override.
    pub async fn recompute(&self) -> StatsSnapshot {
        let mut current = self.stats.write().await;
        let events = self.store.snapshot().await;
        let stage = self.life_stage().await;
        let stats = self.engine.compute(&events, stage, self.clock.now_ms());
        *current = stats;
        drop(current);

        tracing::debug!(
            tummy = stats.tummy,
            tank = stats.tank,
            energy = stats.energy,
            urgency = stats.urgency,
            events = events.len(),
            "vitals recomputed"
        );
        self.publish_stats(stats);
        stats
    }

    /// Current gauges.
    pub async fn stats(&self) -> StatsSnapshot {
        *self.stats.read().await
    }

    /// Logs a potty walk and applies the break override.
    ///
    /// After the walk is logged and the gauges recomputed, urgency is set
    /// to exactly zero and energy to ten below its value before the call.
    /// The override holds until the next recompute.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`DogService::append_event`].
    pub async fn take_break(&self, logged_by: Option<String>) -> Result<StatsSnapshot, TailTalkError> {
        let prior = self.stats().await;

        let metadata = EventMetadata {
            urgency_reset: Some(true),
            ..EventMetadata::default()
        };
        let mut walk = NewEvent::new(EventType::Walk, BREAK_RAW_TEXT).with_metadata(metadata);
        walk.logged_by = logged_by;
        self.append_event(walk).await?;

        let mut current = self.stats.write().await;
        let overridden = current.after_break(prior.energy);
        *current = overridden;
        drop(current);

        tracing::info!(prior_energy = prior.energy, energy = overridden.energy, "break taken");
        self.publish_stats(overridden);
        Ok(overridden)
    }

    fn publish_stats(&self, stats: StatsSnapshot) {
        let _ = self.event_bus.publish(VitalsEvent::StatsUpdated {
            stats,
            level: stats.urgency_level(),
            timestamp: self.timestamp(),
        });
    }

    fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.now_ms()).unwrap_or_else(Utc::now)
    }

    // --- profile & members ---

    /// Current profile.
    pub async fn profile(&self) -> Option<DogProfile> {
        self.profile.read().await.clone()
    }

    /// Current profile, or [`TailTalkError::ProfileMissing`].
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::ProfileMissing`] before onboarding.
    pub async fn require_profile(&self) -> Result<DogProfile, TailTalkError> {
        self.profile().await.ok_or(TailTalkError::ProfileMissing)
    }

    async fn life_stage(&self) -> LifeStage {
        self.profile
            .read()
            .await
            .as_ref()
            .map(|p| p.life_stage)
            .unwrap_or_default()
    }

    async fn pack_code(&self) -> Option<PackCode> {
        self.profile.read().await.as_ref().and_then(|p| p.pack_id.clone())
    }

    /// Creates or updates the profile.
    ///
    /// The pack code cannot change once set; an update without one keeps
    /// the existing code. A shared profile is republished to the pack
    /// registry on a best-effort basis.
    ///
    /// A profile without an avatar keeps the current one while breed and
    /// life stage are unchanged; otherwise a portrait is generated when an
    /// intake service is configured. Generation failures leave the avatar
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::InvalidProfile`] for blank fields or a
    /// changed pack code, and [`TailTalkError::Storage`] if it cannot be
    /// persisted.
    pub async fn set_profile(&self, mut profile: DogProfile) -> Result<DogProfile, TailTalkError> {
        profile.validate()?;
        if let Some(existing) = self.pack_code().await {
            match &profile.pack_id {
                None => profile.pack_id = Some(existing),
                Some(code) if *code != existing => {
                    return Err(TailTalkError::InvalidProfile(format!(
                        "pack code is fixed to {existing}"
                    )));
                }
                Some(_) => {}
            }
        }
        if profile.avatar_url.is_none() {
            profile.avatar_url = self.avatar_for(&profile).await;
        }

        self.store_profile(profile.clone()).await?;
        tracing::info!(dog = %profile.name, life_stage = %profile.life_stage, "profile saved");

        if let (Some(registry), Some(code)) = (&self.registry, &profile.pack_id) {
            let record = PackRecord {
                code: code.clone(),
                profile: profile.clone(),
                updated_at: Utc::now(),
            };
            if let Err(e) = bounded(
                self.remote_timeout,
                registry.upsert_pack(&record),
                TailTalkError::RemoteSyncFailure,
            )
            .await
            {
                tracing::warn!(pack = %code, error = %e, "pack record not republished");
            }
        }

        self.recompute().await;
        Ok(profile)
    }

    async fn avatar_for(&self, profile: &DogProfile) -> Option<String> {
        if let Some(current) = self.profile.read().await.as_ref()
            && current.breed == profile.breed
            && current.life_stage == profile.life_stage
            && current.avatar_url.is_some()
        {
            return current.avatar_url.clone();
        }
        let intake = self.intake.as_ref()?;
        match bounded(
            self.remote_timeout,
            intake.generate_avatar(&profile.breed, profile.life_stage),
            TailTalkError::Internal,
        )
        .await
        {
            Ok(avatar) => avatar,
            Err(e) => {
                tracing::warn!(breed = %profile.breed, error = %e, "avatar not generated");
                None
            }
        }
    }

    async fn store_profile(&self, profile: DogProfile) -> Result<(), TailTalkError> {
        save_json(self.local.as_ref(), PROFILE_KEY, &profile).await?;
        *self.profile.write().await = Some(profile);
        Ok(())
    }

    /// Forgets the profile and empties the log on this device.
    ///
    /// Nothing is deleted remotely.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::Storage`] if the stored profile cannot be
    /// removed.
    pub async fn reset(&self) -> Result<(), TailTalkError> {
        self.local.delete(PROFILE_KEY).await?;
        *self.profile.write().await = None;
        {
            let _guard = self.mutation.lock().await;
            self.store.clear().await;
            self.outbox.clear().await;
        }
        tracing::info!("local profile and event log reset");

        let _ = self.event_bus.publish(VitalsEvent::LogReplaced {
            count: 0,
            timestamp: self.timestamp(),
        });
        self.recompute().await;
        Ok(())
    }

    /// Household members stored on this device.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::Storage`] if the stored list is unreadable.
    pub async fn users(&self) -> Result<Vec<UserProfile>, TailTalkError> {
        Ok(load_json(self.local.as_ref(), USERS_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Replaces the member list.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::InvalidRequest`] for blank names or
    /// duplicate ids.
    pub async fn set_users(&self, users: Vec<UserProfile>) -> Result<Vec<UserProfile>, TailTalkError> {
        let mut ids = HashSet::new();
        for user in &users {
            if user.name.trim().is_empty() {
                return Err(TailTalkError::InvalidRequest("member name is required".to_string()));
            }
            if !ids.insert(user.id.as_str()) {
                return Err(TailTalkError::InvalidRequest(format!(
                    "duplicate member id: {}",
                    user.id
                )));
            }
        }
        save_json(self.local.as_ref(), USERS_KEY, &users).await?;
        Ok(users)
    }

    // --- packs ---

    /// Code to join with: the invitation `link` code if given, otherwise
    /// the one cached in the profile.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::InvalidPackCode`] for a malformed link code.
    pub async fn effective_code(&self, link: Option<&str>) -> Result<Option<PackCode>, TailTalkError> {
        let cached = self.pack_code().await;
        PackCode::select(link, cached.as_ref())
    }

    /// Shares the profile under a fresh pack code.
    ///
    /// Returns the existing code if the profile already has one.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::ProfileMissing`] before onboarding and
    /// [`TailTalkError::RemoteSyncFailure`] if the record cannot be
    /// published; the profile is only updated after publishing succeeds.
    pub async fn create_pack(&self) -> Result<PackCode, TailTalkError> {
        let mut profile = self.require_profile().await?;
        if let Some(code) = &profile.pack_id {
            return Ok(code.clone());
        }

        let code = PackCode::generate();
        profile.pack_id = Some(code.clone());
        if let Some(registry) = &self.registry {
            let record = PackRecord {
                code: code.clone(),
                profile: profile.clone(),
                updated_at: Utc::now(),
            };
            bounded(
                self.remote_timeout,
                registry.upsert_pack(&record),
                TailTalkError::RemoteSyncFailure,
            )
            .await
            .inspect_err(|e| tracing::warn!(pack = %code, error = %e, "pack not published"))?;
        }
        self.store_profile(profile).await?;
        tracing::info!(pack = %code, "pack created");
        Ok(code)
    }

    /// Looks up a published pack.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::GroupNotFound`] for unknown codes and
    /// [`TailTalkError::RemoteSyncFailure`] if the registry is unreachable
    /// or not configured.
    pub async fn resolve_pack(&self, code: &PackCode) -> Result<PackRecord, TailTalkError> {
        let registry = self.registry.as_ref().ok_or_else(|| {
            TailTalkError::RemoteSyncFailure("no pack registry configured".to_string())
        })?;
        bounded(
            self.remote_timeout,
            registry.fetch_pack(code),
            TailTalkError::RemoteSyncFailure,
        )
        .await?
        .ok_or_else(|| TailTalkError::GroupNotFound(code.to_string()))
    }

    /// Joins a pack and adopts its shared profile.
    ///
    /// The code comes from [`DogService::effective_code`]. After adopting
    /// the profile the log is refreshed from the remote store; a failed
    /// refresh is logged and does not undo the join.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::InvalidPackCode`] if no usable code is
    /// available, plus the errors of [`DogService::resolve_pack`].
    pub async fn join_pack(&self, link: Option<&str>) -> Result<DogProfile, TailTalkError> {
        let code = self
            .effective_code(link)
            .await?
            .ok_or_else(|| TailTalkError::InvalidPackCode("no pack code given".to_string()))?;
        let record = self.resolve_pack(&code).await?;

        let mut profile = record.profile;
        profile.pack_id = Some(code.clone());
        self.store_profile(profile.clone()).await?;
        tracing::info!(pack = %code, dog = %profile.name, "pack joined");
        self.recompute().await;

        if let Err(e) = self.refresh().await {
            tracing::warn!(pack = %code, error = %e, "log not refreshed after join");
        }
        Ok(profile)
    }

    // --- intake ---

    /// Parses an utterance, logs the event and asks the dog for a reply.
    ///
    /// A failed reply only drops the reply; the event stays logged.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::VoiceParseFailure`] if no generative
    /// service is configured or the utterance cannot be parsed; nothing is
    /// logged in that case.
    pub async fn voice_command(
        &self,
        text: &str,
        logged_by: Option<String>,
    ) -> Result<VoiceOutcome, TailTalkError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TailTalkError::VoiceParseFailure("nothing was said".to_string()));
        }
        let intake = self.intake.as_ref().ok_or_else(|| {
            TailTalkError::VoiceParseFailure("no voice service configured".to_string())
        })?;
        let profile = self.profile().await;
        let dog_name = profile.as_ref().map_or("the dog", |p| p.name.as_str());

        let parsed = bounded(
            self.remote_timeout,
            intake.parse_utterance(text, dog_name),
            TailTalkError::VoiceParseFailure,
        )
        .await?;

        let mut new = NewEvent::new(parsed.event_type, text).with_metadata(parsed.metadata);
        new.logged_by = logged_by;
        let event = self.append_event(new).await?;

        let reply = match &profile {
            Some(p) => match bounded(
                self.remote_timeout,
                intake.avatar_reply(&describe(&event), p),
                TailTalkError::Internal,
            )
            .await
            {
                Ok(reply) => Some(reply),
                Err(e) => {
                    tracing::warn!(error = %e, "avatar reply dropped");
                    None
                }
            },
            None => None,
        };
        Ok(VoiceOutcome { event, reply })
    }

    /// Analyzes a stool photo and logs a `health_check` event for it.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::ImageAnalysisFailure`] if no generative
    /// service is configured or the analysis fails; nothing is logged in
    /// that case.
    pub async fn scan_stool(
        &self,
        image_base64: &str,
        mime_type: &str,
        logged_by: Option<String>,
    ) -> Result<ScanOutcome, TailTalkError> {
        if image_base64.trim().is_empty() {
            return Err(TailTalkError::ImageAnalysisFailure("empty image".to_string()));
        }
        let intake = self.intake.as_ref().ok_or_else(|| {
            TailTalkError::ImageAnalysisFailure("no image service configured".to_string())
        })?;
        let analysis = bounded(
            self.remote_timeout,
            intake.analyze_stool(image_base64, mime_type),
            TailTalkError::ImageAnalysisFailure,
        )
        .await?;

        let metadata = EventMetadata {
            consistency: Some(analysis.consistency_score.clamp(1, 5)),
            health_flag: Some(analysis.health_flag),
            ..EventMetadata::default()
        };
        let mut new = NewEvent::new(
            EventType::HealthCheck,
            format!("Stool scan: {}", analysis.analysis_text),
        )
        .with_metadata(metadata);
        new.logged_by = logged_by;
        let event = self.append_event(new).await?;
        if analysis.health_flag {
            tracing::info!(event_id = %event.id, "stool scan flagged");
        }
        Ok(ScanOutcome { analysis, event })
    }

    /// A short reply from the dog about `description`.
    ///
    /// Falls back to a fixed line when no generative service is configured
    /// or it fails.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::ProfileMissing`] before onboarding.
    pub async fn reply_to(&self, description: &str) -> Result<String, TailTalkError> {
        let profile = self.require_profile().await?;
        let Some(intake) = &self.intake else {
            return Ok(fallback_reply(&profile));
        };
        match bounded(
            self.remote_timeout,
            intake.avatar_reply(description, &profile),
            TailTalkError::Internal,
        )
        .await
        {
            Ok(reply) => Ok(reply),
            Err(e) => {
                tracing::warn!(error = %e, "avatar reply failed, using fallback");
                Ok(fallback_reply(&profile))
            }
        }
    }

    // --- sync ---

    /// Current sync indicator.
    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        self.sync.get()
    }

    /// Records that the remote change feed stopped. Peer writes are no
    /// longer seen until a refresh or a restart, so sync shows an error.
    pub fn mark_feed_lost(&self) {
        tracing::warn!("remote change feed closed");
        self.sync.set(SyncStatus::Error);
    }

    /// Opens the remote change feed, if a mirror is configured.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::RemoteSyncFailure`] if the subscription
    /// cannot be opened.
    pub async fn subscribe_remote(
        &self,
    ) -> Result<Option<mpsc::Receiver<RemoteChange>>, TailTalkError> {
        let Some(mirror) = &self.mirror else {
            return Ok(None);
        };
        bounded(
            self.remote_timeout,
            mirror.writer.remote.subscribe(None),
            TailTalkError::RemoteSyncFailure,
        )
        .await
        .inspect_err(|_| self.sync.set(SyncStatus::Error))
        .map(Some)
    }
}

/// Short description of an event for the avatar reply.
fn describe(event: &DogEvent) -> String {
    if event.raw_text.is_empty() {
        event.event_type.to_string()
    } else {
        format!("{} ({})", event.raw_text, event.event_type)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::intake::ParsedCommand;
    use crate::persistence::{MemoryRemote, MemoryStore};
    use crate::service::ManualClock;
    use async_trait::async_trait;

    const HOUR: i64 = 3_600_000;
    const NOW: i64 = 1_750_000_000_000;

    #[derive(Debug, Default)]
    struct ScriptedIntake {
        reply_fails: bool,
        portraits: std::sync::atomic::AtomicUsize,
    }

    impl ScriptedIntake {
        fn replying(reply_fails: bool) -> Self {
            Self {
                reply_fails,
                ..Self::default()
            }
        }

        fn portraits(&self) -> usize {
            self.portraits.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerativeIntake for ScriptedIntake {
        async fn parse_utterance(
            &self,
            text: &str,
            _dog_name: &str,
        ) -> Result<ParsedCommand, TailTalkError> {
            if text.contains("dinner") {
                Ok(ParsedCommand {
                    event_type: EventType::Food,
                    metadata: EventMetadata {
                        amount: Some("1 cup".to_string()),
                        ..EventMetadata::default()
                    },
                })
            } else {
                Err(TailTalkError::VoiceParseFailure("unclear".to_string()))
            }
        }

        async fn analyze_stool(
            &self,
            _image_base64: &str,
            _mime_type: &str,
        ) -> Result<StoolAnalysis, TailTalkError> {
            Ok(StoolAnalysis {
                consistency_score: 4,
                health_flag: true,
                analysis_text: "Soft, slightly pale.".to_string(),
                advice_text: None,
            })
        }

        async fn avatar_reply(
            &self,
            _event_description: &str,
            profile: &DogProfile,
        ) -> Result<String, TailTalkError> {
            if self.reply_fails {
                Err(TailTalkError::Internal("model offline".to_string()))
            } else {
                Ok(format!("{} loves dinner!", profile.name))
            }
        }

        async fn generate_avatar(
            &self,
            breed: &str,
            life_stage: LifeStage,
        ) -> Result<Option<String>, TailTalkError> {
            if breed == "Mystery Mutt" {
                return Err(TailTalkError::Internal("model offline".to_string()));
            }
            self.portraits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Some(format!("data:image/png;base64,{breed}-{life_stage}")))
        }
    }

    /// Remote store whose listing and inserts take a while to answer.
    #[derive(Debug)]
    struct LaggingRemote {
        inner: Arc<MemoryRemote>,
        list_delay: Duration,
        insert_delay: Duration,
    }

    #[async_trait]
    impl RemoteEventStore for LaggingRemote {
        async fn list_events(&self, pack: Option<&PackCode>) -> Result<Vec<DogEvent>, TailTalkError> {
            let rows = self.inner.list_events(pack).await;
            tokio::time::sleep(self.list_delay).await;
            rows
        }

        async fn insert_event(&self, event: &DogEvent) -> Result<(), TailTalkError> {
            tokio::time::sleep(self.insert_delay).await;
            self.inner.insert_event(event).await
        }

        async fn delete_event(&self, id: &EventId) -> Result<(), TailTalkError> {
            self.inner.delete_event(id).await
        }

        async fn subscribe(
            &self,
            pack: Option<&PackCode>,
        ) -> Result<mpsc::Receiver<RemoteChange>, TailTalkError> {
            self.inner.subscribe(pack).await
        }
    }

    fn lagging(list_delay: Duration, insert_delay: Duration) -> (DogService, Arc<MemoryRemote>) {
        let inner = Arc::new(MemoryRemote::new());
        let remote = LaggingRemote {
            inner: Arc::clone(&inner),
            list_delay,
            insert_delay,
        };
        let (service, _) = service_at(NOW);
        (service.with_remote(Arc::new(remote)), inner)
    }

    fn service_at(now: i64) -> (DogService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let service = DogService::new(EventBus::new(256), Arc::new(MemoryStore::new()), Arc::clone(&clock) as Arc<dyn Clock>);
        (service, clock)
    }

    async fn with_profile(service: &DogService, stage: LifeStage) {
        let Ok(_) = service
            .set_profile(DogProfile::new("Barnaby", "Bernese Mountain Dog", stage))
            .await
        else {
            panic!("profile rejected");
        };
    }

    #[tokio::test]
    async fn append_recomputes_and_publishes() {
        let (service, _) = service_at(NOW);
        with_profile(&service, LifeStage::Adult).await;
        let mut rx = service.event_bus().subscribe();

        let food = NewEvent::new(EventType::Food, "breakfast").at(NOW - 2 * HOUR);
        let Ok(event) = service.append_event(food).await else {
            panic!("append failed");
        };

        let Ok(VitalsEvent::EventLogged { event: logged, origin }) = rx.recv().await else {
            panic!("expected event_logged");
        };
        assert_eq!(logged.id, event.id);
        assert_eq!(origin, Origin::Local);
        let Ok(VitalsEvent::StatsUpdated { stats, .. }) = rx.recv().await else {
            panic!("expected stats_updated");
        };
        assert_eq!(stats.tummy, 70);
        assert_eq!(service.stats().await.tummy, 70);
    }

    #[tokio::test]
    async fn out_of_range_consistency_is_rejected() {
        let (service, _) = service_at(NOW);
        let poop = NewEvent::new(EventType::Poop, "").with_metadata(EventMetadata {
            consistency: Some(9),
            ..EventMetadata::default()
        });
        assert!(matches!(
            service.append_event(poop).await,
            Err(TailTalkError::InvalidRequest(_))
        ));
        assert!(service.events(None).await.is_empty());
    }

    #[tokio::test]
    async fn remove_missing_is_noop() {
        let (service, _) = service_at(NOW);
        assert!(service.remove_event(&EventId::from("nope")).await.is_none());
    }

    #[tokio::test]
    async fn take_break_overrides_until_next_recompute() {
        let (service, clock) = service_at(NOW);
        with_profile(&service, LifeStage::Adult).await;
        let walk = NewEvent::new(EventType::Walk, "park").at(NOW - 5 * HOUR);
        let pee = NewEvent::new(EventType::Pee, "").at(NOW - 5 * HOUR);
        let _ = service.append_event(walk).await;
        let _ = service.append_event(pee).await;
        let prior = service.stats().await;
        assert_eq!(prior.energy, 60);
        assert!(prior.urgency > 0.8);

        let Ok(after) = service.take_break(Some("Sam".to_string())).await else {
            panic!("break failed");
        };
        assert!(after.urgency.abs() < f64::EPSILON);
        assert_eq!(after.energy, 50);
        assert_eq!(service.stats().await, after);

        let events = service.events(Some(EventType::Walk)).await;
        let Some(latest) = events.first() else {
            panic!("break walk missing");
        };
        assert_eq!(latest.raw_text, BREAK_RAW_TEXT);
        assert_eq!(latest.metadata.urgency_reset, Some(true));
        assert_eq!(latest.logged_by.as_deref(), Some("Sam"));

        clock.advance(Duration::from_secs(60));
        let recomputed = service.recompute().await;
        assert_eq!(recomputed.energy, 100);
    }

    #[tokio::test]
    async fn mirror_failure_keeps_local_event() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_failing(true);
        let (service, _) = service_at(NOW);
        let service = service.with_remote(Arc::clone(&remote) as Arc<dyn RemoteEventStore>);

        let Ok(event) = service.append_event(NewEvent::new(EventType::Water, "bowl")).await else {
            panic!("append failed");
        };
        service.flush_mirrors().await;

        assert!(service.event(&event.id).await.is_some());
        assert_eq!(service.mirror_state(&event.id).await, Some(MirrorState::Failed));
        assert_eq!(service.sync_status(), SyncStatus::Error);
        assert!(remote.stored_events().await.is_empty());
    }

    #[tokio::test]
    async fn refresh_keeps_unsynced_writes_and_retries_them() {
        let remote = Arc::new(MemoryRemote::new());
        let (service, _) = service_at(NOW);
        let service = service.with_remote(Arc::clone(&remote) as Arc<dyn RemoteEventStore>);

        let peer = NewEvent::new(EventType::Poop, "peer").into_event(NOW - HOUR);
        remote.push_from_peer(peer.clone()).await;

        remote.set_failing(true);
        let Ok(local) = service.append_event(NewEvent::new(EventType::Food, "kibble")).await else {
            panic!("append failed");
        };
        service.flush_mirrors().await;
        remote.set_failing(false);

        let Ok(count) = service.refresh().await else {
            panic!("refresh failed");
        };
        assert_eq!(count, 2);
        assert!(service.event(&peer.id).await.is_some());
        assert!(service.event(&local.id).await.is_some());

        service.flush_mirrors().await;
        assert_eq!(service.mirror_state(&local.id).await, Some(MirrorState::Synced));
        assert_eq!(service.sync_status(), SyncStatus::Synced);
        assert_eq!(remote.stored_events().await.len(), 2);
    }

    #[tokio::test]
    async fn refresh_does_not_resurrect_unsynced_delete() {
        let remote = Arc::new(MemoryRemote::new());
        let (service, _) = service_at(NOW);
        let service = service.with_remote(Arc::clone(&remote) as Arc<dyn RemoteEventStore>);

        let Ok(event) = service.append_event(NewEvent::new(EventType::Pee, "")).await else {
            panic!("append failed");
        };
        service.flush_mirrors().await;
        remote.set_failing(true);
        let _ = service.remove_event(&event.id).await;
        service.flush_mirrors().await;
        remote.set_failing(false);

        assert!(matches!(service.refresh().await, Ok(0)));
        service.flush_mirrors().await;
        assert!(remote.stored_events().await.is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_leaves_log_alone() {
        let remote = Arc::new(MemoryRemote::new());
        let (service, _) = service_at(NOW);
        let service = service.with_remote(Arc::clone(&remote) as Arc<dyn RemoteEventStore>);
        let _ = service.append_event(NewEvent::new(EventType::Walk, "")).await;
        service.flush_mirrors().await;

        remote.set_failing(true);
        assert!(matches!(
            service.refresh().await,
            Err(TailTalkError::RemoteSyncFailure(_))
        ));
        assert_eq!(service.events(None).await.len(), 1);
        assert_eq!(service.sync_status(), SyncStatus::Error);
    }

    #[tokio::test]
    async fn append_confirmed_during_refresh_survives() {
        let (service, remote) = lagging(Duration::from_millis(200), Duration::ZERO);

        let (refreshed, appended) = tokio::join!(service.refresh(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let appended = service.append_event(NewEvent::new(EventType::Food, "kibble")).await;
            service.flush_mirrors().await;
            appended
        });
        let (Ok(count), Ok(event)) = (refreshed, appended) else {
            panic!("refresh or append failed");
        };

        assert_eq!(count, 1);
        assert!(service.event(&event.id).await.is_some());
        assert_eq!(remote.stored_events().await.len(), 1);
        assert!(service.stats().await.tummy > StatsSnapshot::BASELINE.tummy);
    }

    #[tokio::test]
    async fn delete_reaches_remote_after_its_insert() {
        let (service, remote) = lagging(Duration::ZERO, Duration::from_millis(100));

        let Ok(event) = service.append_event(NewEvent::new(EventType::Pee, "")).await else {
            panic!("append failed");
        };
        assert!(service.remove_event(&event.id).await.is_some());
        service.flush_mirrors().await;

        assert!(remote.stored_events().await.is_empty());
        assert!(matches!(service.refresh().await, Ok(0)));
        assert!(service.event(&event.id).await.is_none());
        assert_eq!(service.mirror_state(&event.id).await, None);
    }

    #[tokio::test]
    async fn duplicate_remote_event_is_discarded() {
        let (service, _) = service_at(NOW);
        let event = NewEvent::new(EventType::Food, "a").into_event(NOW);
        assert!(service.ingest_remote(event.clone()).await);

        let mut altered = event.clone();
        altered.raw_text = "b".to_string();
        assert!(!service.ingest_remote(altered).await);
        let events = service.events(None).await;
        assert_eq!(events, vec![event]);
    }

    #[tokio::test]
    async fn remote_changes_for_other_packs_are_ignored() {
        let (service, _) = service_at(NOW);
        let mut profile = DogProfile::new("Barnaby", "Bernese", LifeStage::Adult);
        profile.pack_id = PackCode::parse("K7RM2Q").ok();
        let _ = service.set_profile(profile).await;

        let mut other = NewEvent::new(EventType::Food, "x");
        other.pack_id = PackCode::parse("AAAAAA").ok();
        service
            .apply_remote_change(RemoteChange::Inserted(other.into_event(NOW)))
            .await;
        assert!(service.events(None).await.is_empty());

        let mut ours = NewEvent::new(EventType::Food, "y");
        ours.pack_id = PackCode::parse("K7RM2Q").ok();
        let ours = ours.into_event(NOW);
        service
            .apply_remote_change(RemoteChange::Inserted(ours.clone()))
            .await;
        assert_eq!(service.events(None).await.len(), 1);

        service.apply_remote_change(RemoteChange::Deleted(ours.id)).await;
        assert!(service.events(None).await.is_empty());
    }

    #[tokio::test]
    async fn events_inherit_profile_pack() {
        let (service, _) = service_at(NOW);
        let mut profile = DogProfile::new("Barnaby", "Bernese", LifeStage::Adult);
        profile.pack_id = PackCode::parse("K7RM2Q").ok();
        let _ = service.set_profile(profile).await;

        let Ok(event) = service.append_event(NewEvent::new(EventType::Water, "")).await else {
            panic!("append failed");
        };
        assert_eq!(event.pack_id.as_ref().map(PackCode::as_str), Some("K7RM2Q"));
    }

    #[tokio::test]
    async fn pack_code_is_fixed_once_set() {
        let (service, _) = service_at(NOW);
        let mut profile = DogProfile::new("Barnaby", "Bernese", LifeStage::Adult);
        profile.pack_id = PackCode::parse("K7RM2Q").ok();
        let _ = service.set_profile(profile.clone()).await;

        let mut renamed = profile.clone();
        renamed.name = "Barney".to_string();
        renamed.pack_id = None;
        let Ok(saved) = service.set_profile(renamed).await else {
            panic!("update rejected");
        };
        assert_eq!(saved.pack_id, profile.pack_id);

        let mut moved = profile;
        moved.pack_id = PackCode::parse("AAAAAA").ok();
        assert!(matches!(
            service.set_profile(moved).await,
            Err(TailTalkError::InvalidProfile(_))
        ));
    }

    #[tokio::test]
    async fn create_and_join_pack_across_devices() {
        let registry = Arc::new(MemoryRemote::new());
        let (owner, _) = service_at(NOW);
        let owner = owner.with_registry(Arc::clone(&registry) as Arc<dyn GroupRegistry>);
        with_profile(&owner, LifeStage::Senior).await;

        let Ok(code) = owner.create_pack().await else {
            panic!("create failed");
        };
        let Ok(again) = owner.create_pack().await else {
            panic!("second create failed");
        };
        assert_eq!(code, again);

        let (member, _) = service_at(NOW);
        let member = member.with_registry(registry);
        let Ok(joined) = member.join_pack(Some(&code.as_str().to_lowercase())).await else {
            panic!("join failed");
        };
        assert_eq!(joined.name, "Barnaby");
        assert_eq!(joined.life_stage, LifeStage::Senior);
        assert_eq!(joined.pack_id, Some(code.clone()));
        assert_eq!(member.profile().await, Some(joined));

        let Ok(effective) = member.effective_code(None).await else {
            panic!("cached code");
        };
        assert_eq!(effective, Some(code));
    }

    #[tokio::test]
    async fn join_errors() {
        let registry = Arc::new(MemoryRemote::new());
        let (service, _) = service_at(NOW);
        let service = service.with_registry(registry);

        assert!(matches!(
            service.join_pack(None).await,
            Err(TailTalkError::InvalidPackCode(_))
        ));
        assert!(matches!(
            service.join_pack(Some("OI01")).await,
            Err(TailTalkError::InvalidPackCode(_))
        ));
        assert!(matches!(
            service.join_pack(Some("ZZZZZZ")).await,
            Err(TailTalkError::GroupNotFound(_))
        ));
        assert!(service.profile().await.is_none());
    }

    #[tokio::test]
    async fn create_pack_requires_profile() {
        let (service, _) = service_at(NOW);
        assert!(matches!(
            service.create_pack().await,
            Err(TailTalkError::ProfileMissing)
        ));
    }

    #[tokio::test]
    async fn voice_logs_event_even_when_reply_fails() {
        let (service, _) = service_at(NOW);
        let service = service.with_intake(Arc::new(ScriptedIntake::replying(true)));
        with_profile(&service, LifeStage::Adult).await;

        let Ok(outcome) = service
            .voice_command("Barnaby had dinner", Some("Sam".to_string()))
            .await
        else {
            panic!("voice failed");
        };
        assert!(outcome.reply.is_none());
        assert_eq!(outcome.event.event_type, EventType::Food);
        assert_eq!(outcome.event.raw_text, "Barnaby had dinner");
        assert_eq!(outcome.event.metadata.amount.as_deref(), Some("1 cup"));
        assert_eq!(service.events(None).await.len(), 1);
    }

    #[tokio::test]
    async fn voice_reply_and_parse_failure() {
        let (service, _) = service_at(NOW);
        let service = service.with_intake(Arc::new(ScriptedIntake::replying(false)));
        with_profile(&service, LifeStage::Adult).await;

        let Ok(outcome) = service.voice_command("dinner time", None).await else {
            panic!("voice failed");
        };
        assert_eq!(outcome.reply.as_deref(), Some("Barnaby loves dinner!"));

        assert!(matches!(
            service.voice_command("blah", None).await,
            Err(TailTalkError::VoiceParseFailure(_))
        ));
        assert_eq!(service.events(None).await.len(), 1);
    }

    #[tokio::test]
    async fn intake_without_service_fails_cleanly() {
        let (service, _) = service_at(NOW);
        with_profile(&service, LifeStage::Adult).await;
        assert!(matches!(
            service.voice_command("dinner", None).await,
            Err(TailTalkError::VoiceParseFailure(_))
        ));
        assert!(matches!(
            service.scan_stool("AAAA", "image/jpeg", None).await,
            Err(TailTalkError::ImageAnalysisFailure(_))
        ));
        let Ok(reply) = service.reply_to("walk").await else {
            panic!("fallback expected");
        };
        assert_eq!(reply, fallback_reply(&DogProfile::new("Barnaby", "x", LifeStage::Adult)));
    }

    #[tokio::test]
    async fn stool_scan_logs_health_check() {
        let (service, _) = service_at(NOW);
        let service = service.with_intake(Arc::new(ScriptedIntake::replying(false)));

        let Ok(outcome) = service.scan_stool("AAAA", "image/jpeg", None).await else {
            panic!("scan failed");
        };
        assert_eq!(outcome.event.event_type, EventType::HealthCheck);
        assert_eq!(outcome.event.raw_text, "Stool scan: Soft, slightly pale.");
        assert_eq!(outcome.event.metadata.consistency, Some(4));
        assert_eq!(outcome.event.metadata.health_flag, Some(true));
    }

    #[tokio::test]
    async fn profile_gets_a_portrait_once_per_breed_and_stage() {
        let intake = Arc::new(ScriptedIntake::default());
        let (service, _) = service_at(NOW);
        let service = service.with_intake(Arc::clone(&intake) as Arc<dyn GenerativeIntake>);

        with_profile(&service, LifeStage::Puppy).await;
        let Some(profile) = service.profile().await else {
            panic!("profile missing");
        };
        assert_eq!(
            profile.avatar_url.as_deref(),
            Some("data:image/png;base64,Bernese Mountain Dog-puppy")
        );

        with_profile(&service, LifeStage::Puppy).await;
        assert_eq!(intake.portraits(), 1);

        with_profile(&service, LifeStage::Adult).await;
        assert_eq!(intake.portraits(), 2);
        let Some(grown) = service.profile().await else {
            panic!("profile missing");
        };
        assert_eq!(
            grown.avatar_url.as_deref(),
            Some("data:image/png;base64,Bernese Mountain Dog-adult")
        );
    }

    #[tokio::test]
    async fn portrait_failure_still_saves_profile() {
        let (service, _) = service_at(NOW);
        let service = service.with_intake(Arc::new(ScriptedIntake::default()));

        let Ok(saved) = service
            .set_profile(DogProfile::new("Pip", "Mystery Mutt", LifeStage::Senior))
            .await
        else {
            panic!("profile rejected");
        };
        assert!(saved.avatar_url.is_none());
        assert!(service.profile().await.is_some());
    }

    #[tokio::test]
    async fn reset_clears_profile_and_log() {
        let (service, _) = service_at(NOW);
        with_profile(&service, LifeStage::Puppy).await;
        let _ = service.append_event(NewEvent::new(EventType::Food, "")).await;

        assert!(service.reset().await.is_ok());
        assert!(service.profile().await.is_none());
        assert!(service.events(None).await.is_empty());
        assert_eq!(service.stats().await, StatsSnapshot::BASELINE);
        assert!(matches!(service.load().await, Ok(None)));
    }

    #[tokio::test]
    async fn load_restores_persisted_profile() {
        let local: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let first = DogService::new(EventBus::new(8), Arc::clone(&local), Arc::clone(&clock) as Arc<dyn Clock>);
        with_profile(&first, LifeStage::Senior).await;

        let second = DogService::new(EventBus::new(8), local, clock);
        let Ok(Some(profile)) = second.load().await else {
            panic!("profile not restored");
        };
        assert_eq!(profile.life_stage, LifeStage::Senior);
    }

    #[tokio::test]
    async fn users_round_trip_and_reject_duplicates() {
        let (service, _) = service_at(NOW);
        assert!(matches!(service.users().await, Ok(v) if v.is_empty()));

        let sam = UserProfile {
            id: "u1".to_string(),
            name: "Sam".to_string(),
            role: crate::domain::UserRole::Admin,
            emoji: Some("🐾".to_string()),
        };
        let Ok(saved) = service.set_users(vec![sam.clone()]).await else {
            panic!("users rejected");
        };
        assert_eq!(saved.len(), 1);
        assert!(matches!(service.users().await, Ok(v) if v == vec![sam.clone()]));

        assert!(matches!(
            service.set_users(vec![sam.clone(), sam]).await,
            Err(TailTalkError::InvalidRequest(_))
        ));
    }
}
