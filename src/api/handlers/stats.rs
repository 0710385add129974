//! Vitals handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::optional_json;
use crate::api::dto::{BreakRequest, StatsResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, TailTalkError};

/// `GET /stats`: Current gauges.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "Vitals",
    summary = "Current gauges",
    description = "Returns tummy, tank, energy and urgency with the derived alert level.",
    responses(
        (status = 200, description = "Current gauges", body = StatsResponse),
    )
)]
pub async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatsResponse::from(state.dog_service.stats().await))
}

/// `POST /stats/break`: Take a potty break.
///
/// The body is optional.
///
/// # Errors
///
/// Returns [`TailTalkError::InvalidRequest`] if a body is present but
/// malformed.
#[utoipa::path(
    post,
    path = "/api/v1/stats/break",
    tag = "Vitals",
    summary = "Take a break",
    description = "Logs a potty walk, then sets urgency to zero and takes ten points off the energy shown before the call. The override lasts until the next recompute.",
    request_body(content = BreakRequest, description = "Optional", content_type = "application/json"),
    responses(
        (status = 200, description = "Gauges after the break", body = StatsResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
    )
)]
pub async fn take_break(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, TailTalkError> {
    let req: BreakRequest = optional_json(&body)?;
    let stats = state.dog_service.take_break(req.logged_by).await?;
    Ok(Json(StatsResponse::from(stats)))
}

/// Vitals routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/stats/break", post(take_break))
}
