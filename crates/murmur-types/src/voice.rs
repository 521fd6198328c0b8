//! Resolved voice parameters.
//!
//! A `VoiceProfile` is what speech synthesis receives alongside the text of a
//! reply: a speed multiplier and an ordered list of emotion control tags in
//! the synthesis vendor's vocabulary (for example `"positivity:high"`).

use serde::{Deserialize, Serialize};

/// Slowest speed multiplier a profile may carry.
pub const MIN_SPEED: f32 = 0.5;

/// Fastest speed multiplier a profile may carry.
pub const MAX_SPEED: f32 = 2.0;

/// Voice modulation parameters for one reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Speech speed multiplier (1.0 is normal).
    pub speed: f32,
    /// Emotion control tags, in the order they are sent to synthesis.
    #[serde(rename = "emotion")]
    pub emotion_tags: Vec<String>,
}

impl VoiceProfile {
    pub fn new<I, S>(speed: f32, emotion_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            speed,
            emotion_tags: emotion_tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if the speed lies within [`MIN_SPEED`, `MAX_SPEED`].
    pub fn speed_in_range(&self) -> bool {
        (MIN_SPEED..=MAX_SPEED).contains(&self.speed)
    }
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self::new(1.0, ["positivity:low"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_tags_under_emotion_key() {
        let profile = VoiceProfile::new(1.1, ["positivity:high"]);
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["emotion"][0], "positivity:high");
        assert!(json.get("emotion_tags").is_none());
    }

    #[test]
    fn speed_range_check() {
        assert!(VoiceProfile::default().speed_in_range());
        assert!(!VoiceProfile::new(2.5, ["anger"]).speed_in_range());
        assert!(!VoiceProfile::new(0.1, ["sadness"]).speed_in_range());
    }
}
