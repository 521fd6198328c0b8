//! Parsing of the language model's structured reply.
//!
//! The model is instructed to answer with a single JSON object
//! `{"emotion": str, "intensity": number, "message": str}`. Models sometimes
//! wrap that object in a Markdown code fence or drift from the schema, so
//! parsing comes in two flavours: [`parse_strict`] rejects anything off-shape,
//! and [`parse_lenient`] always produces a speakable reply.

use murmur_types::{EmotionTag, ModelResponse, ParseEmotionTagError, DEFAULT_INTENSITY};
use serde_json::{Map, Value};
use thiserror::Error;

/// Reasons a reply fails strict parsing.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reply JSON is not an object")]
    NotAnObject,

    #[error("reply is missing field '{0}'")]
    MissingField(&'static str),

    #[error("reply field '{0}' has the wrong type")]
    WrongType(&'static str),

    #[error(transparent)]
    UnknownEmotion(#[from] ParseEmotionTagError),
}

/// Result of lenient parsing: the reply to speak, plus the strict-parse
/// failure that had to be recovered from, if any.
#[derive(Debug)]
pub struct ParsedReply {
    pub response: ModelResponse,
    pub recovered_from: Option<ResponseError>,
}

/// Removes a surrounding ```` ```json ```` / ```` ``` ```` fence.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, ResponseError> {
    match serde_json::from_str::<Value>(strip_code_fence(raw))? {
        Value::Object(map) => Ok(map),
        _ => Err(ResponseError::NotAnObject),
    }
}

/// Parses a reply that must match the schema exactly.
///
/// Intensity is clamped rather than rejected.
pub fn parse_strict(raw: &str) -> Result<ModelResponse, ResponseError> {
    let map = parse_object(raw)?;

    let emotion = match map.get("emotion") {
        Some(Value::String(label)) => label.parse::<EmotionTag>()?,
        Some(_) => return Err(ResponseError::WrongType("emotion")),
        None => return Err(ResponseError::MissingField("emotion")),
    };
    let intensity = match map.get("intensity") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(DEFAULT_INTENSITY as f64) as f32,
        Some(_) => return Err(ResponseError::WrongType("intensity")),
        None => return Err(ResponseError::MissingField("intensity")),
    };
    let message = match map.get("message") {
        Some(Value::String(message)) => message.clone(),
        Some(_) => return Err(ResponseError::WrongType("message")),
        None => return Err(ResponseError::MissingField("message")),
    };

    Ok(ModelResponse::new(emotion, intensity, message))
}

/// Parses a reply, coercing whatever is off-shape.
///
/// - not a JSON object: neutral at default intensity, unfenced raw text as
///   message
/// - missing, unknown or non-string emotion: neutral at default intensity
/// - missing or non-numeric intensity: default intensity
/// - missing or non-string message: raw text
pub fn parse_lenient(raw: &str) -> ParsedReply {
    let error = match parse_strict(raw) {
        Ok(response) => {
            return ParsedReply {
                response,
                recovered_from: None,
            }
        }
        Err(e) => e,
    };

    let fallback_text = strip_code_fence(raw);
    let response = match parse_object(raw) {
        Ok(map) => {
            let emotion = map
                .get("emotion")
                .and_then(Value::as_str)
                .and_then(|label| label.parse::<EmotionTag>().ok());
            // Without a usable emotion the reply is plain neutral.
            let intensity = match emotion {
                Some(_) => map
                    .get("intensity")
                    .and_then(Value::as_f64)
                    .map(|n| n as f32)
                    .unwrap_or(DEFAULT_INTENSITY),
                None => DEFAULT_INTENSITY,
            };
            let emotion = emotion.unwrap_or_default();
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(fallback_text);
            ModelResponse::new(emotion, intensity, message)
        }
        Err(_) => ModelResponse::neutral(fallback_text),
    };

    tracing::warn!(
        emotion = %response.emotion,
        intensity = response.intensity,
        "recovered malformed model reply: {}",
        error
    );

    ParsedReply {
        response,
        recovered_from: Some(error),
    }
}
