//! Emotion labels and the structured language-model reply.

use serde::{Deserialize, Deserializer, Serialize};

/// Intensity assumed when a reply omits it or cannot be parsed.
pub const DEFAULT_INTENSITY: f32 = 0.5;

/// The closed set of emotions a reply may be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionTag {
    /// Flat, informational delivery.
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Confused,
    Curious,
    Excited,
}

impl EmotionTag {
    /// Every emotion, in declaration order.
    pub const ALL: [EmotionTag; 7] = [
        Self::Neutral,
        Self::Happy,
        Self::Sad,
        Self::Angry,
        Self::Confused,
        Self::Curious,
        Self::Excited,
    ];

    /// Returns the canonical lowercase label for this emotion.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Confused => "confused",
            Self::Curious => "curious",
            Self::Excited => "excited",
        }
    }

    /// Parses an untrusted label, falling back to [`EmotionTag::Neutral`]
    /// for anything outside the known set.
    pub fn from_label_or_neutral(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }
}

impl std::fmt::Display for EmotionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmotionTag {
    type Err = ParseEmotionTagError;

    /// Labels are matched case-insensitively after trimming whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(label))
            .ok_or_else(|| ParseEmotionTagError(s.to_string()))
    }
}

/// Error returned when parsing an unknown emotion label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown emotion label: {0:?}")]
pub struct ParseEmotionTagError(pub String);

/// Clamps an intensity into `[0.0, 1.0]`.
///
/// Non-finite input maps to [`DEFAULT_INTENSITY`].
pub fn clamp_intensity(intensity: f32) -> f32 {
    if intensity.is_finite() {
        intensity.clamp(0.0, 1.0)
    } else {
        DEFAULT_INTENSITY
    }
}

/// A language-model reply after parsing.
///
/// `intensity` is within `[0.0, 1.0]` when built through
/// [`ModelResponse::new`] or deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub emotion: EmotionTag,
    #[serde(deserialize_with = "deserialize_intensity")]
    pub intensity: f32,
    pub message: String,
}

impl ModelResponse {
    pub fn new(emotion: EmotionTag, intensity: f32, message: impl Into<String>) -> Self {
        Self {
            emotion,
            intensity: clamp_intensity(intensity),
            message: message.into(),
        }
    }

    /// A neutral reply at default intensity speaking `message` verbatim.
    pub fn neutral(message: impl Into<String>) -> Self {
        Self::new(EmotionTag::Neutral, DEFAULT_INTENSITY, message)
    }
}

fn deserialize_intensity<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    f32::deserialize(deserializer).map(clamp_intensity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for tag in EmotionTag::ALL {
            assert_eq!(tag.as_str().parse::<EmotionTag>(), Ok(tag));
        }
    }

    #[test]
    fn parsing_ignores_case_and_whitespace() {
        assert_eq!(" Happy ".parse::<EmotionTag>(), Ok(EmotionTag::Happy));
        assert_eq!("EXCITED".parse::<EmotionTag>(), Ok(EmotionTag::Excited));
    }

    #[test]
    fn unknown_label_is_an_error_or_neutral() {
        let err = "melancholy".parse::<EmotionTag>().unwrap_err();
        assert_eq!(err.0, "melancholy");
        assert_eq!(EmotionTag::from_label_or_neutral("melancholy"), EmotionTag::Neutral);
        assert_eq!(EmotionTag::from_label_or_neutral(""), EmotionTag::Neutral);
    }

    #[test]
    fn serde_uses_lowercase_labels() {
        let json = serde_json::to_string(&EmotionTag::Curious).unwrap();
        assert_eq!(json, "\"curious\"");
        let tag: EmotionTag = serde_json::from_str("\"sad\"").unwrap();
        assert_eq!(tag, EmotionTag::Sad);
    }

    #[test]
    fn intensity_is_clamped() {
        assert_eq!(clamp_intensity(1.7), 1.0);
        assert_eq!(clamp_intensity(-0.3), 0.0);
        assert_eq!(clamp_intensity(0.25), 0.25);
        assert_eq!(clamp_intensity(f32::NAN), DEFAULT_INTENSITY);
        assert_eq!(clamp_intensity(f32::INFINITY), DEFAULT_INTENSITY);
    }

    #[test]
    fn model_response_new_clamps() {
        let response = ModelResponse::new(EmotionTag::Happy, 3.0, "hi");
        assert_eq!(response.intensity, 1.0);
        assert_eq!(ModelResponse::neutral("x").intensity, DEFAULT_INTENSITY);
    }

    #[test]
    fn deserialized_response_is_clamped() {
        let response: ModelResponse =
            serde_json::from_str(r#"{"emotion":"happy","intensity":1.7,"message":"x"}"#).unwrap();
        assert_eq!(response, ModelResponse::new(EmotionTag::Happy, 1.0, "x"));

        let response: ModelResponse =
            serde_json::from_str(r#"{"emotion":"sad","intensity":-2,"message":"y"}"#).unwrap();
        assert_eq!(response.intensity, 0.0);
    }
}
