//! Voice, scan and reply DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /intake/voice`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoiceRequest {
    /// Transcribed utterance.
    pub text: String,
    /// Member speaking.
    #[serde(default, alias = "logged_by")]
    pub logged_by: Option<String>,
}

/// Request body for `POST /intake/scan`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    /// Base64-encoded photo.
    #[serde(alias = "image_base64")]
    pub image_base64: String,
    /// Image MIME type.
    #[serde(default = "default_mime", alias = "mime_type")]
    pub mime_type: String,
    /// Member taking the photo.
    #[serde(default, alias = "logged_by")]
    pub logged_by: Option<String>,
}

fn default_mime() -> String {
    "image/jpeg".to_string()
}

/// Request body for `POST /intake/reply`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplyRequest {
    /// Short description of what happened.
    pub description: String,
}

/// Response body for `POST /intake/reply`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReplyResponse {
    /// The dog's answer.
    pub reply: String,
}
