//! Event log handlers: log, list, delete.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};

use crate::api::dto::{CreateEventRequest, EventListQuery, EventListResponse};
use crate::app_state::AppState;
use crate::domain::{DogEvent, EventId, NewEvent};
use crate::error::{ErrorResponse, TailTalkError};

/// `POST /events`: Log an event.
///
/// # Errors
///
/// Returns [`TailTalkError::InvalidRequest`] on out-of-range metadata or a
/// duplicate client id.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Log an event",
    description = "Appends an event to the local log, recomputes the gauges and mirrors the event to the remote store in the background. A remote failure never rolls back the local write.",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event logged", body = DogEvent),
        (status = 400, description = "Invalid event", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, TailTalkError> {
    let event = state.dog_service.append_event(NewEvent::from(req)).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// `GET /events`: List the log.
///
/// # Errors
///
/// Returns [`TailTalkError::InvalidRequest`] for an unknown type filter.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    summary = "List events",
    description = "Returns the event log most recent first, optionally restricted to one event type.",
    params(EventListQuery),
    responses(
        (status = 200, description = "Event list", body = EventListResponse),
        (status = 400, description = "Unknown event type", body = ErrorResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventListQuery>,
) -> Result<impl IntoResponse, TailTalkError> {
    let data = state.dog_service.events(query.filter()?).await;
    let total = data.len();
    Ok(Json(EventListResponse { data, total }))
}

/// `DELETE /events/{id}`: Delete an event.
///
/// Deleting an unknown id succeeds.
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Delete an event",
    description = "Removes the event from the local log and mirrors the deletion. Unknown ids are a no-op.",
    params(
        ("id" = String, Path, description = "Event id"),
    ),
    responses(
        (status = 204, description = "Event removed or already absent"),
    )
)]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let _ = state.dog_service.remove_event(&EventId::from(id)).await;
    StatusCode::NO_CONTENT
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/{id}", delete(delete_event))
}
