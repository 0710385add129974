//! Pack handlers: share, join, resolve.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::optional_json;
use crate::api::dto::{CreatePackResponse, JoinPackRequest, PackResponse};
use crate::app_state::AppState;
use crate::domain::{DogProfile, PackCode};
use crate::error::{ErrorResponse, TailTalkError};

/// `POST /pack`: Share the profile under a new pack code.
///
/// # Errors
///
/// Returns [`TailTalkError::ProfileMissing`] before onboarding or
/// [`TailTalkError::RemoteSyncFailure`] if the pack cannot be published.
#[utoipa::path(
    post,
    path = "/api/v1/pack",
    tag = "Pack",
    summary = "Create a pack",
    description = "Generates a six-character code, publishes the profile under it and stores it in the profile. Returns the existing code if the profile is already shared.",
    responses(
        (status = 201, description = "Pack code", body = CreatePackResponse),
        (status = 404, description = "No profile yet", body = ErrorResponse),
        (status = 502, description = "Registry unavailable", body = ErrorResponse),
    )
)]
pub async fn create_pack(State(state): State<AppState>) -> Result<impl IntoResponse, TailTalkError> {
    let code = state.dog_service.create_pack().await?;
    Ok((StatusCode::CREATED, Json(CreatePackResponse { code })))
}

/// `POST /pack/join`: Join a pack.
///
/// The body is optional.
///
/// # Errors
///
/// Returns [`TailTalkError::InvalidPackCode`] or
/// [`TailTalkError::GroupNotFound`] for bad codes.
#[utoipa::path(
    post,
    path = "/api/v1/pack/join",
    tag = "Pack",
    summary = "Join a pack",
    description = "Resolves the code (the request's code wins over the one cached in the profile), adopts the shared profile and refreshes the log.",
    request_body(content = JoinPackRequest, description = "Optional", content_type = "application/json"),
    responses(
        (status = 200, description = "Adopted profile", body = DogProfile),
        (status = 400, description = "Malformed or missing code", body = ErrorResponse),
        (status = 404, description = "Unknown pack", body = ErrorResponse),
    )
)]
pub async fn join_pack(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, TailTalkError> {
    let req: JoinPackRequest = optional_json(&body)?;
    let profile = state.dog_service.join_pack(req.code.as_deref()).await?;
    Ok(Json(profile))
}

/// `GET /pack/{code}`: Resolve a pack code.
///
/// # Errors
///
/// Returns [`TailTalkError::GroupNotFound`] for unknown codes.
#[utoipa::path(
    get,
    path = "/api/v1/pack/{code}",
    tag = "Pack",
    summary = "Resolve a pack",
    params(
        ("code" = String, Path, description = "Six-character pack code"),
    ),
    responses(
        (status = 200, description = "Published pack", body = PackResponse),
        (status = 400, description = "Malformed code", body = ErrorResponse),
        (status = 404, description = "Unknown pack", body = ErrorResponse),
    )
)]
pub async fn get_pack(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, TailTalkError> {
    let code = PackCode::parse(&code)?;
    let record = state.dog_service.resolve_pack(&code).await?;
    Ok(Json(PackResponse::from(record)))
}

/// Pack routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pack", post(create_pack))
        .route("/pack/join", post(join_pack))
        .route("/pack/{code}", get(get_pack))
}
