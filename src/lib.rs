//! # tailtalk
//!
//! Household dog-care tracker. Each device keeps an append-only log of care
//! events (pee, poop, food, water, walks, health checks), derives four
//! gauges from it with a pure time-decay model, and mirrors the log to a
//! shared PostgreSQL backend so a whole household ("pack") sees the same
//! dog.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── DogService + Outbox (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── EventStore + VitalsEngine (domain/)
//!     ├── GenerativeIntake (intake/)
//!     │
//!     └── Local key-value store, PostgreSQL mirror (persistence/)
//! ```
//!
//! The local log is authoritative: remote failures degrade the sync
//! indicator but never block or roll back a local write.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod intake;
pub mod persistence;
pub mod service;
pub mod ws;
