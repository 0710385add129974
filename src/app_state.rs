//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::DogService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The dog service holding the log, profile and gauges.
    pub dog_service: Arc<DogService>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl AppState {
    /// Builds the state around `dog_service`, sharing its bus.
    #[must_use]
    pub fn new(dog_service: Arc<DogService>) -> Self {
        let event_bus = dog_service.event_bus().clone();
        Self {
            dog_service,
            event_bus,
        }
    }
}
