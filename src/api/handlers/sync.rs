//! Remote sync handlers.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{RefreshResponse, SyncStatusResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, TailTalkError};

/// `POST /sync/refresh`: Reload the log from the remote store.
///
/// # Errors
///
/// Returns [`TailTalkError::RemoteSyncFailure`] if the fetch fails; the
/// local log is unchanged.
#[utoipa::path(
    post,
    path = "/api/v1/sync/refresh",
    tag = "Sync",
    summary = "Manual refresh",
    description = "Replaces the local log with the remote copy, replaying local writes the remote store has not confirmed and retrying failed ones.",
    responses(
        (status = 200, description = "Log refreshed", body = RefreshResponse),
        (status = 502, description = "Remote store unavailable", body = ErrorResponse),
    )
)]
pub async fn refresh(State(state): State<AppState>) -> Result<impl IntoResponse, TailTalkError> {
    let count = state.dog_service.refresh().await?;
    Ok(Json(RefreshResponse {
        count,
        status: state.dog_service.sync_status(),
    }))
}

/// `GET /sync/status`: Sync indicator.
#[utoipa::path(
    get,
    path = "/api/v1/sync/status",
    tag = "Sync",
    summary = "Sync status",
    description = "Returns local, syncing, synced or error.",
    responses(
        (status = 200, description = "Sync indicator", body = SyncStatusResponse),
    )
)]
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(SyncStatusResponse {
        status: state.dog_service.sync_status(),
        remote_configured: state.dog_service.has_remote(),
    })
}

/// Sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync/refresh", post(refresh))
        .route("/sync/status", get(status))
}
