//! REST endpoint handlers organized by resource.

pub mod events;
pub mod intake;
pub mod pack;
pub mod profile;
pub mod stats;
pub mod sync;
pub mod system;

use axum::Router;
use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::app_state::AppState;
use crate::error::TailTalkError;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(events::routes())
        .merge(stats::routes())
        .merge(sync::routes())
        .merge(profile::routes())
        .merge(pack::routes())
        .merge(intake::routes())
}

/// Decodes an optional JSON body; an empty body yields `T::default()`.
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, TailTalkError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| TailTalkError::InvalidRequest(e.to_string()))
}
