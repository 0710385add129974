//! HTTP client for the Gemini `generateContent` API.
//!
//! Structured calls ask for `application/json` output with a response
//! schema, then parse the first candidate's text. Transport and parse
//! failures map to the intake error of the call that failed.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{GenerativeIntake, ParsedCommand, StoolAnalysis, clamp_consistency};
use crate::domain::{DogProfile, EventMetadata, EventType, LifeStage};
use crate::error::TailTalkError;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model for avatar portraits.
pub const DEFAULT_PORTRAIT_MODEL: &str = "gemini-2.5-flash-image";

/// Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    text_model: String,
    image_model: String,
    portrait_model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("portrait_model", &self.portrait_model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Creates a client against the public endpoint.
    #[must_use]
    pub fn new(
        api_key: impl Into<String>,
        text_model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            text_model: text_model.into(),
            image_model: image_model.into(),
            portrait_model: DEFAULT_PORTRAIT_MODEL.to_string(),
        }
    }

    /// Uses another model for avatar portraits.
    #[must_use]
    pub fn with_portrait_model(mut self, model: impl Into<String>) -> Self {
        self.portrait_model = model.into();
        self
    }

    /// Points the client at another API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    /// Sends a request body and returns the first candidate's text.
    async fn generate(&self, model: &str, body: &Value) -> Result<String, String> {
        let parsed = self.post(model, body).await?;
        candidate_text(&parsed).ok_or_else(|| "response had no text".to_string())
    }

    async fn post(&self, model: &str, body: &Value) -> Result<GenerateResponse, String> {
        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("status {status}: {text}"));
        }

        response
            .json()
            .await
            .map_err(|e| format!("unreadable response: {e}"))
    }
}

#[async_trait]
impl GenerativeIntake for GeminiClient {
    async fn parse_utterance(
        &self,
        text: &str,
        dog_name: &str,
    ) -> Result<ParsedCommand, TailTalkError> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": PARSER_INSTRUCTION }] },
            "contents": [{
                "role": "user",
                "parts": [{ "text": format!("Care log entry for {dog_name}: \"{text}\"") }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": command_schema(),
            }
        });
        let raw = self
            .generate(&self.text_model, &body)
            .await
            .map_err(TailTalkError::VoiceParseFailure)?;
        tracing::debug!(model = %self.text_model, "utterance parsed");
        parse_command(&raw)
    }

    async fn analyze_stool(
        &self,
        image_base64: &str,
        mime_type: &str,
    ) -> Result<StoolAnalysis, TailTalkError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "inlineData": { "mimeType": mime_type, "data": image_base64 } },
                    { "text": SCAN_INSTRUCTION }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": stool_schema(),
            }
        });
        let raw = self
            .generate(&self.image_model, &body)
            .await
            .map_err(TailTalkError::ImageAnalysisFailure)?;
        parse_stool(&raw)
    }

    async fn avatar_reply(
        &self,
        event_description: &str,
        profile: &DogProfile,
    ) -> Result<String, TailTalkError> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": format!(
                "You are {}, a {} and the user's dog. Answer in the first person, \
                 warm and a little silly, one or two sentences.",
                profile.name, profile.breed
            ) }] },
            "contents": [{
                "role": "user",
                "parts": [{ "text": format!("Your human just logged: {event_description}") }]
            }]
        });
        let reply = self
            .generate(&self.text_model, &body)
            .await
            .map_err(TailTalkError::Internal)?;
        Ok(reply.trim().to_string())
    }

    async fn generate_avatar(
        &self,
        breed: &str,
        life_stage: LifeStage,
    ) -> Result<Option<String>, TailTalkError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": portrait_prompt(breed, life_stage) }]
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": { "aspectRatio": "1:1" }
            }
        });
        let response = self
            .post(&self.portrait_model, &body)
            .await
            .map_err(TailTalkError::Internal)?;
        let avatar = candidate_image(&response);
        tracing::debug!(model = %self.portrait_model, found = avatar.is_some(), "avatar generated");
        Ok(avatar)
    }
}

fn portrait_prompt(breed: &str, life_stage: LifeStage) -> String {
    format!(
        "A cinematic studio portrait of a {breed} {life_stage}. Soft lighting, blurred \
         background, detailed fur, a soulful expression."
    )
}

const PARSER_INSTRUCTION: &str = "Turn a pet owner's note into one care event as JSON. \
    event is one of pee, poop, food, water, walk, health_check. \
    consistency is 1 (hard) to 5 (liquid) and only applies to poop. \
    volume is small, medium or large. duration applies to walks, e.g. \"20 mins\".";

const SCAN_INSTRUCTION: &str = "Assess this dog stool photo. Rate consistency from 1 (hard) to \
    5 (liquid), flag anything worrying about color or texture, and keep the tone calm.";

fn command_schema() -> Value {
    let types: Vec<&str> = EventType::ALL.iter().map(EventType::as_str).collect();
    json!({
        "type": "OBJECT",
        "properties": {
            "event": { "type": "STRING", "enum": types },
            "metadata": {
                "type": "OBJECT",
                "properties": {
                    "amount": { "type": "STRING" },
                    "volume": { "type": "STRING" },
                    "consistency": { "type": "NUMBER" },
                    "urgencyReset": { "type": "BOOLEAN" },
                    "healthFlag": { "type": "BOOLEAN" },
                    "duration": { "type": "STRING" }
                }
            }
        },
        "required": ["event"]
    })
}

fn stool_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "consistency": { "type": "NUMBER" },
            "healthFlag": { "type": "BOOLEAN" },
            "analysis": { "type": "STRING" },
            "advice": { "type": "STRING" }
        },
        "required": ["consistency", "healthFlag", "analysis"]
    })
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: Option<String>,
    data: String,
}

fn candidate_text(response: &GenerateResponse) -> Option<String> {
    let content = response.candidates.first()?.content.as_ref()?;
    let text: String = content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// First inline image of the first candidate, as a `data:` URI.
fn candidate_image(response: &GenerateResponse) -> Option<String> {
    let content = response.candidates.first()?.content.as_ref()?;
    let image = content
        .parts
        .iter()
        .find_map(|p| p.inline_data.as_ref())
        .filter(|i| !i.data.is_empty())?;
    let mime = image.mime_type.as_deref().unwrap_or("image/png");
    Some(format!("data:{mime};base64,{}", image.data))
}

/// Model output for a parsed utterance. Numbers arrive as floats.
#[derive(Debug, Deserialize)]
struct RawCommand {
    event: String,
    #[serde(default)]
    metadata: RawMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    amount: Option<String>,
    volume: Option<String>,
    consistency: Option<f64>,
    duration: Option<String>,
    #[serde(alias = "urgency_reset")]
    urgency_reset: Option<bool>,
    #[serde(alias = "health_flag")]
    health_flag: Option<bool>,
}

fn parse_command(raw: &str) -> Result<ParsedCommand, TailTalkError> {
    let cmd: RawCommand = serde_json::from_str(raw)
        .map_err(|e| TailTalkError::VoiceParseFailure(format!("not a care event: {e}")))?;
    let event_type: EventType = cmd
        .event
        .parse()
        .map_err(|_| TailTalkError::VoiceParseFailure(format!("unknown event '{}'", cmd.event)))?;
    let m = cmd.metadata;
    Ok(ParsedCommand {
        event_type,
        metadata: EventMetadata {
            amount: m.amount,
            consistency: m.consistency.map(clamp_consistency),
            volume: m.volume,
            duration: m.duration,
            urgency_reset: m.urgency_reset,
            health_flag: m.health_flag,
        },
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStool {
    consistency: f64,
    #[serde(alias = "health_flag")]
    health_flag: bool,
    analysis: String,
    advice: Option<String>,
}

fn parse_stool(raw: &str) -> Result<StoolAnalysis, TailTalkError> {
    let s: RawStool = serde_json::from_str(raw)
        .map_err(|e| TailTalkError::ImageAnalysisFailure(format!("unreadable analysis: {e}")))?;
    Ok(StoolAnalysis {
        consistency_score: clamp_consistency(s.consistency),
        health_flag: s.health_flag,
        analysis_text: s.analysis,
        advice_text: s.advice.filter(|a| !a.trim().is_empty()),
    })
}
