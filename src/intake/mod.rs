//! Generative intake: voice commands, stool scans, avatar replies and
//! avatar portraits.
//!
//! The service only depends on the result shapes defined here. The
//! interpretation itself is delegated to an external generative model
//! behind the [`GenerativeIntake`] trait; [`GeminiClient`] is the HTTP
//! implementation.

pub mod gemini;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{DogProfile, EventMetadata, EventType, LifeStage};
use crate::error::TailTalkError;

pub use gemini::GeminiClient;

/// A free-form utterance turned into a loggable event.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    /// Recognized event type.
    pub event_type: EventType,
    /// Extracted details.
    pub metadata: EventMetadata,
}

/// Result of analyzing a stool photo.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoolAnalysis {
    /// Consistency score, 1 (hard) to 5 (liquid).
    pub consistency_score: u8,
    /// `true` if the sample looks concerning.
    pub health_flag: bool,
    /// Short description of what was observed.
    pub analysis_text: String,
    /// Optional follow-up advice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice_text: Option<String>,
}

/// External generative service.
#[async_trait]
pub trait GenerativeIntake: Send + Sync + fmt::Debug {
    /// Parses an utterance like "Barnaby just had a big pee".
    ///
    /// Fails with [`TailTalkError::VoiceParseFailure`].
    async fn parse_utterance(&self, text: &str, dog_name: &str)
    -> Result<ParsedCommand, TailTalkError>;

    /// Analyzes a base64-encoded stool photo.
    ///
    /// Fails with [`TailTalkError::ImageAnalysisFailure`].
    async fn analyze_stool(
        &self,
        image_base64: &str,
        mime_type: &str,
    ) -> Result<StoolAnalysis, TailTalkError>;

    /// Returns a short first-person reply from the dog to a logged event.
    async fn avatar_reply(
        &self,
        event_description: &str,
        profile: &DogProfile,
    ) -> Result<String, TailTalkError>;

    /// Draws a portrait of a dog of `breed` at `life_stage`.
    ///
    /// Returns a `data:` URI, or `None` when the model produced no image.
    async fn generate_avatar(
        &self,
        breed: &str,
        life_stage: LifeStage,
    ) -> Result<Option<String>, TailTalkError>;
}

/// Reply used when no generative service is configured or it fails.
#[must_use]
pub fn fallback_reply(profile: &DogProfile) -> String {
    format!("Woof! {} says thanks for keeping track.", profile.name)
}

/// Clamps a model-provided consistency score to 1–5.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_consistency(raw: f64) -> u8 {
    if raw.is_nan() {
        return 3;
    }
    raw.round().clamp(1.0, 5.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency_is_clamped() {
        assert_eq!(clamp_consistency(0.2), 1);
        assert_eq!(clamp_consistency(3.4), 3);
        assert_eq!(clamp_consistency(9.0), 5);
        assert_eq!(clamp_consistency(f64::NAN), 3);
    }

    #[test]
    fn fallback_mentions_dog() {
        let profile = DogProfile::new("Biscuit", "Beagle", LifeStage::Puppy);
        assert!(fallback_reply(&profile).contains("Biscuit"));
    }
}
