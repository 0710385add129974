//! Profile and household member handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::ProfileRequest;
use crate::app_state::AppState;
use crate::domain::{DogProfile, UserProfile};
use crate::error::{ErrorResponse, TailTalkError};

/// `GET /profile`: Current dog profile.
///
/// # Errors
///
/// Returns [`TailTalkError::ProfileMissing`] before onboarding.
#[utoipa::path(
    get,
    path = "/api/v1/profile",
    tag = "Profile",
    summary = "Get the dog profile",
    responses(
        (status = 200, description = "Dog profile", body = DogProfile),
        (status = 404, description = "No profile yet", body = ErrorResponse),
    )
)]
pub async fn get_profile(State(state): State<AppState>) -> Result<impl IntoResponse, TailTalkError> {
    Ok(Json(state.dog_service.require_profile().await?))
}

/// `PUT /profile`: Create or update the dog profile.
///
/// # Errors
///
/// Returns [`TailTalkError::InvalidProfile`] for blank fields, an unknown
/// life stage or a changed pack code.
#[utoipa::path(
    put,
    path = "/api/v1/profile",
    tag = "Profile",
    summary = "Save the dog profile",
    description = "Persists the profile locally and recomputes the gauges with its life stage. A shared profile is republished to its pack.",
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Saved profile", body = DogProfile),
        (status = 400, description = "Invalid profile", body = ErrorResponse),
    )
)]
pub async fn put_profile(
    State(state): State<AppState>,
    Json(req): Json<ProfileRequest>,
) -> Result<impl IntoResponse, TailTalkError> {
    let profile = DogProfile::try_from(req)?;
    Ok(Json(state.dog_service.set_profile(profile).await?))
}

/// `DELETE /profile`: Reset this device.
///
/// # Errors
///
/// Returns [`TailTalkError::Storage`] if local storage fails.
#[utoipa::path(
    delete,
    path = "/api/v1/profile",
    tag = "Profile",
    summary = "Reset",
    description = "Forgets the profile and clears the local event log. Remote data is kept.",
    responses(
        (status = 204, description = "Reset done"),
    )
)]
pub async fn delete_profile(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, TailTalkError> {
    state.dog_service.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /users`: Household members.
///
/// # Errors
///
/// Returns [`TailTalkError::Storage`] if the stored list is unreadable.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Profile",
    summary = "List household members",
    responses(
        (status = 200, description = "Members", body = Vec<UserProfile>),
    )
)]
pub async fn get_users(State(state): State<AppState>) -> Result<impl IntoResponse, TailTalkError> {
    Ok(Json(state.dog_service.users().await?))
}

/// `PUT /users`: Replace household members.
///
/// # Errors
///
/// Returns [`TailTalkError::InvalidRequest`] for blank names or duplicate
/// ids.
#[utoipa::path(
    put,
    path = "/api/v1/users",
    tag = "Profile",
    summary = "Replace household members",
    request_body = Vec<UserProfile>,
    responses(
        (status = 200, description = "Saved members", body = Vec<UserProfile>),
        (status = 400, description = "Invalid member list", body = ErrorResponse),
    )
)]
pub async fn put_users(
    State(state): State<AppState>,
    Json(users): Json<Vec<UserProfile>>,
) -> Result<impl IntoResponse, TailTalkError> {
    Ok(Json(state.dog_service.set_users(users).await?))
}

/// Profile routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(get_profile).put(put_profile).delete(delete_profile),
        )
        .route("/users", get(get_users).put(put_users))
}
