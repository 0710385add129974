//! Domain layer: events, profile, vitals engine, event log and pack codes.
//!
//! This module contains the data model, the pure [`VitalsEngine`]
//! projection, the [`EventStore`] that owns the in-memory log, and the
//! [`EventBus`] for broadcasting state changes.

pub mod dog_event;
pub mod event_bus;
pub mod event_id;
pub mod event_store;
pub mod pack_code;
pub mod profile;
pub mod stats;
pub mod vitals;
pub mod vitals_event;

pub use dog_event::{DogEvent, EventMetadata, EventType, NewEvent};
pub use event_bus::EventBus;
pub use event_id::EventId;
pub use event_store::EventStore;
pub use pack_code::PackCode;
pub use profile::{DogProfile, LifeStage, Sex, UserProfile, UserRole};
pub use stats::{StatsSnapshot, UrgencyLevel};
pub use vitals::{VitalsEngine, VitalsTuning};
pub use vitals_event::{Origin, SyncStatus, Topic, VitalsEvent};
