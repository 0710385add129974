//! Service layer: the application state container and its background
//! tasks.
//!
//! [`DogService`] funnels every mutation of the event log and profile,
//! recomputes the gauges through the [`crate::domain::VitalsEngine`], and
//! emits events through the [`crate::domain::EventBus`]. Remote mirroring
//! is tracked per event in the [`Outbox`].

pub mod clock;
pub mod dog_service;
pub mod outbox;
pub mod sync;
pub mod tasks;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dog_service::{DogService, ScanOutcome, VoiceOutcome};
pub use outbox::{MirrorState, Outbox, PendingWrite};
pub use sync::SyncIndicator;
pub use tasks::{spawn_remote_listener, spawn_ticker};
