//! TailTalk error types with HTTP status code mapping.
//!
//! [`TailTalkError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2002,
///     "message": "pack not found: K7RM2Q",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Service-wide error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status               |
/// |-----------|-------------------|---------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request           |
/// | 2000–2999 | Not Found         | 404 Not Found             |
/// | 3000–3999 | Server / Remote   | 500 / 502                 |
/// | 4000–4999 | Intake (retry)    | 422 Unprocessable Entity  |
#[derive(Debug, thiserror::Error)]
pub enum TailTalkError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Profile carries an unknown or malformed life-stage.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// Pack code is not six characters from the pack alphabet.
    #[error("invalid pack code: {0}")]
    InvalidPackCode(String),

    /// No dog profile has been set up on this device yet.
    #[error("no dog profile configured")]
    ProfileMissing,

    /// No published pack record exists for the given code.
    #[error("pack not found: {0}")]
    GroupNotFound(String),

    /// The remote mirror rejected or timed out on a call.
    #[error("remote sync failed: {0}")]
    RemoteSyncFailure(String),

    /// Local durable key-value storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The voice utterance could not be turned into an event.
    #[error("could not understand that, try again: {0}")]
    VoiceParseFailure(String),

    /// The stool image could not be analyzed.
    #[error("image analysis failed, try again: {0}")]
    ImageAnalysisFailure(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TailTalkError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidProfile(_) => 1002,
            Self::InvalidPackCode(_) => 1003,
            Self::ProfileMissing => 2001,
            Self::GroupNotFound(_) => 2002,
            Self::Internal(_) => 3000,
            Self::RemoteSyncFailure(_) => 3001,
            Self::Storage(_) => 3002,
            Self::VoiceParseFailure(_) => 4001,
            Self::ImageAnalysisFailure(_) => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidProfile(_) | Self::InvalidPackCode(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ProfileMissing | Self::GroupNotFound(_) => StatusCode::NOT_FOUND,
            Self::RemoteSyncFailure(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::VoiceParseFailure(_) | Self::ImageAnalysisFailure(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        }
    }
}

impl From<sqlx::Error> for TailTalkError {
    fn from(err: sqlx::Error) -> Self {
        Self::RemoteSyncFailure(err.to_string())
    }
}

impl From<serde_json::Error> for TailTalkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl IntoResponse for TailTalkError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
