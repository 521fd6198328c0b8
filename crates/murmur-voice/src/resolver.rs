//! Emotion to voice-profile resolution.

use crate::config::{EmotionEntry, EmotionTable};
use murmur_types::{clamp_intensity, EmotionTag, VoiceProfile, DEFAULT_INTENSITY};
use std::sync::Arc;

/// Maps an emotion and intensity to synthesis parameters.
///
/// Holds no mutable state; clones share the same table.
#[derive(Debug, Clone)]
pub struct EmotionResolver {
    table: Arc<EmotionTable>,
}

impl EmotionResolver {
    pub fn new(table: Arc<EmotionTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &EmotionTable {
        &self.table
    }

    /// Resolves a parsed emotion.
    ///
    /// Emotions missing from the table use the `neutral` entry. Intensity is
    /// clamped to `[0.0, 1.0]` before it scales anything.
    pub fn resolve(&self, emotion: EmotionTag, intensity: f32) -> VoiceProfile {
        let entry = self.table.get(emotion).unwrap_or_else(|| {
            tracing::debug!(%emotion, "no table entry, using neutral voice");
            self.table.neutral()
        });
        profile_for(entry, clamp_intensity(intensity))
    }

    /// Resolves an untrusted label. Unknown or absent labels behave exactly
    /// like `neutral` at default intensity.
    pub fn resolve_label(&self, label: Option<&str>, intensity: Option<f32>) -> VoiceProfile {
        match label.map(str::parse::<EmotionTag>) {
            Some(Ok(emotion)) => self.resolve(emotion, intensity.unwrap_or(DEFAULT_INTENSITY)),
            Some(Err(e)) => {
                tracing::warn!("{}, falling back to neutral", e);
                self.resolve(EmotionTag::Neutral, DEFAULT_INTENSITY)
            }
            None => self.resolve(EmotionTag::Neutral, DEFAULT_INTENSITY),
        }
    }
}

fn profile_for(entry: &EmotionEntry, intensity: f32) -> VoiceProfile {
    let speed = match entry.speed_range {
        Some([min, max]) => min + (max - min) * intensity,
        None => entry.speed,
    };
    VoiceProfile {
        speed,
        emotion_tags: entry.emotion_tags.clone(),
    }
}
