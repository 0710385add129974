//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams [`crate::domain::VitalsEvent`]s
//! filtered by topic and answers read-only state queries.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
