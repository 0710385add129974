//! Voice, stool scan and avatar reply handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{ReplyRequest, ReplyResponse, ScanRequest, VoiceRequest};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, TailTalkError};
use crate::service::{ScanOutcome, VoiceOutcome};

/// `POST /intake/voice`: Log an event from speech.
///
/// # Errors
///
/// Returns [`TailTalkError::VoiceParseFailure`] if the utterance cannot be
/// understood; nothing is logged.
#[utoipa::path(
    post,
    path = "/api/v1/intake/voice",
    tag = "Intake",
    summary = "Voice command",
    description = "Parses a transcribed utterance into an event, logs it and returns the dog's reply when one is available.",
    request_body = VoiceRequest,
    responses(
        (status = 201, description = "Event logged", body = VoiceOutcome),
        (status = 422, description = "Could not understand, try again", body = ErrorResponse),
    )
)]
pub async fn voice(
    State(state): State<AppState>,
    Json(req): Json<VoiceRequest>,
) -> Result<impl IntoResponse, TailTalkError> {
    let outcome = state.dog_service.voice_command(&req.text, req.logged_by).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `POST /intake/scan`: Analyze a stool photo.
///
/// # Errors
///
/// Returns [`TailTalkError::ImageAnalysisFailure`] if the image cannot be
/// analyzed; nothing is logged.
#[utoipa::path(
    post,
    path = "/api/v1/intake/scan",
    tag = "Intake",
    summary = "Stool scan",
    description = "Analyzes a photo and logs a health check with the consistency score and health flag.",
    request_body = ScanRequest,
    responses(
        (status = 201, description = "Analysis logged", body = ScanOutcome),
        (status = 422, description = "Analysis failed, try again", body = ErrorResponse),
    )
)]
pub async fn scan(
    State(state): State<AppState>,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, TailTalkError> {
    let outcome = state
        .dog_service
        .scan_stool(&req.image_base64, &req.mime_type, req.logged_by)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `POST /intake/reply`: Ask the dog to answer.
///
/// # Errors
///
/// Returns [`TailTalkError::ProfileMissing`] before onboarding.
#[utoipa::path(
    post,
    path = "/api/v1/intake/reply",
    tag = "Intake",
    summary = "Avatar reply",
    description = "Returns a short first-person reply from the dog, or a fixed line when no generative service is available.",
    request_body = ReplyRequest,
    responses(
        (status = 200, description = "Reply", body = ReplyResponse),
        (status = 404, description = "No profile yet", body = ErrorResponse),
    )
)]
pub async fn reply(
    State(state): State<AppState>,
    Json(req): Json<ReplyRequest>,
) -> Result<impl IntoResponse, TailTalkError> {
    let reply = state.dog_service.reply_to(&req.description).await?;
    Ok(Json(ReplyResponse { reply }))
}

/// Intake routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/intake/voice", post(voice))
        .route("/intake/scan", post(scan))
        .route("/intake/reply", post(reply))
}
