//! Static emotion and filler tables loaded from JSON at startup.
//!
//! Both tables are read once and never mutated afterwards; callers share
//! them behind an `Arc`.

use crate::error::VoiceError;
use murmur_types::{EmotionTag, MAX_SPEED, MIN_SPEED};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

fn default_trigger_threshold_ms() -> u64 {
    800
}

/// One row of the emotion table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionEntry {
    /// Base speed multiplier, used when no `speed_range` is configured.
    pub speed: f32,
    /// Vendor emotion control tags.
    #[serde(rename = "emotion")]
    pub emotion_tags: Vec<String>,
    /// Optional `[min, max]` speeds interpolated by reply intensity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_range: Option<[f32; 2]>,
}

impl EmotionEntry {
    pub fn new<I, S>(speed: f32, emotion_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            speed,
            emotion_tags: emotion_tags.into_iter().map(Into::into).collect(),
            speed_range: None,
        }
    }

    pub fn with_speed_range(mut self, min: f32, max: f32) -> Self {
        self.speed_range = Some([min, max]);
        self
    }

    fn validate(&self, label: &str) -> Result<(), VoiceError> {
        let in_range = |s: f32| (MIN_SPEED..=MAX_SPEED).contains(&s);

        if !in_range(self.speed) {
            return Err(VoiceError::Config(format!(
                "emotion '{}': speed {} must be between {} and {}",
                label, self.speed, MIN_SPEED, MAX_SPEED
            )));
        }
        if self.emotion_tags.is_empty() {
            return Err(VoiceError::Config(format!(
                "emotion '{}': tag list must not be empty",
                label
            )));
        }
        if let Some([min, max]) = self.speed_range {
            if !in_range(min) || !in_range(max) || min > max {
                return Err(VoiceError::Config(format!(
                    "emotion '{}': speed_range [{}, {}] must be ordered and within [{}, {}]",
                    label, min, max, MIN_SPEED, MAX_SPEED
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct EmotionConfigFile {
    emotions: BTreeMap<String, EmotionEntry>,
}

/// Emotion name to voice parameters, validated and immutable.
///
/// A `neutral` entry is always present.
#[derive(Debug, Clone)]
pub struct EmotionTable {
    neutral: EmotionEntry,
    entries: HashMap<EmotionTag, EmotionEntry>,
}

impl EmotionTable {
    /// Builds a table from labelled entries.
    ///
    /// Unknown labels are skipped with a warning. Fails if an entry is out of
    /// range or if no `neutral` entry is given.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, VoiceError>
    where
        I: IntoIterator<Item = (S, EmotionEntry)>,
        S: AsRef<str>,
    {
        let mut table = HashMap::new();
        for (label, entry) in entries {
            let label = label.as_ref();
            let tag = match label.parse::<EmotionTag>() {
                Ok(tag) => tag,
                Err(e) => {
                    tracing::warn!(label, "skipping emotion table entry: {}", e);
                    continue;
                }
            };
            entry.validate(label)?;
            table.insert(tag, entry);
        }

        let neutral = table
            .get(&EmotionTag::Neutral)
            .cloned()
            .ok_or_else(|| VoiceError::Config("emotion table has no 'neutral' entry".into()))?;

        Ok(Self {
            neutral,
            entries: table,
        })
    }

    /// Parses the `{"emotions": {...}}` document.
    pub fn from_json(json: &str) -> Result<Self, VoiceError> {
        let file: EmotionConfigFile = serde_json::from_str(json)?;
        Self::from_entries(file.emotions)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, VoiceError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let table = Self::from_json(&contents)?;
        tracing::info!(
            path = %path.as_ref().display(),
            emotions = table.len(),
            "loaded emotion table"
        );
        Ok(table)
    }

    /// Returns the entry for `emotion`, if the table defines one.
    pub fn get(&self, emotion: EmotionTag) -> Option<&EmotionEntry> {
        self.entries.get(&emotion)
    }

    pub fn neutral(&self) -> &EmotionEntry {
        &self.neutral
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EmotionTable {
    /// Built-in table covering every emotion, tuned for Cartesia voice controls.
    fn default() -> Self {
        let neutral = EmotionEntry::new(1.0, ["positivity:low"]);
        let entries = HashMap::from([
            (EmotionTag::Neutral, neutral.clone()),
            (
                EmotionTag::Happy,
                EmotionEntry::new(1.1, ["positivity:high"]).with_speed_range(1.0, 1.2),
            ),
            (
                EmotionTag::Sad,
                EmotionEntry::new(0.85, ["sadness:high"]).with_speed_range(0.75, 0.95),
            ),
            (EmotionTag::Angry, EmotionEntry::new(1.05, ["anger:high"])),
            (
                EmotionTag::Confused,
                EmotionEntry::new(0.9, ["curiosity", "surprise:low"]),
            ),
            (EmotionTag::Curious, EmotionEntry::new(1.0, ["curiosity:high"])),
            (
                EmotionTag::Excited,
                EmotionEntry::new(1.2, ["positivity:highest", "surprise:high"])
                    .with_speed_range(1.1, 1.3),
            ),
        ]);
        Self { neutral, entries }
    }
}

/// Global filler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillerSettings {
    #[serde(default = "default_trigger_threshold_ms")]
    pub filler_trigger_threshold_ms: u64,
}

impl Default for FillerSettings {
    fn default() -> Self {
        Self {
            filler_trigger_threshold_ms: default_trigger_threshold_ms(),
        }
    }
}

/// A filler utterance as configured, before its clip is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillerSpec {
    pub text: String,
    #[serde(default)]
    pub description: String,
}

/// The `filler_sounds_config.json` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FillerConfig {
    #[serde(default)]
    pub settings: FillerSettings,
    #[serde(default)]
    pub fillers: BTreeMap<String, Vec<FillerSpec>>,
}

impl FillerConfig {
    pub fn from_json(json: &str) -> Result<Self, VoiceError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, VoiceError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    /// How long the coordinator waits for a first token before playing a filler.
    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.settings.filler_trigger_threshold_ms)
    }

    /// Filler specs grouped by known emotion. Unknown labels are skipped.
    pub fn by_emotion(&self) -> Vec<(EmotionTag, &[FillerSpec])> {
        self.fillers
            .iter()
            .filter_map(|(label, specs)| match label.parse::<EmotionTag>() {
                Ok(tag) => Some((tag, specs.as_slice())),
                Err(e) => {
                    tracing::warn!(label = label.as_str(), "skipping filler group: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// File name of a pre-generated filler clip.
///
/// `index` is 1-based: `happy_2_oh_nice.wav` is the second happy filler,
/// whose text is "oh nice".
pub fn filler_clip_file_name(emotion: EmotionTag, index: usize, text: &str) -> String {
    format!("{}_{}_{}.wav", emotion, index, text.replace(' ', "_"))
}
