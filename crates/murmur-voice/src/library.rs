//! Pre-generated filler clips keyed by emotion.

use crate::audio::{read_wav, AudioClip};
use crate::config::{filler_clip_file_name, FillerConfig};
use murmur_types::EmotionTag;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::path::Path;

/// A short clip ("hmm", "oh!") played while the model is still thinking.
#[derive(Debug, Clone)]
pub struct FillerEntry {
    pub emotion: EmotionTag,
    pub text: String,
    pub description: String,
    pub clip: AudioClip,
}

/// Read-only collection of filler clips, populated once at startup.
#[derive(Debug, Clone, Default)]
pub struct FillerLibrary {
    entries: HashMap<EmotionTag, Vec<FillerEntry>>,
}

impl FillerLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: FillerEntry) {
        self.entries.entry(entry.emotion).or_default().push(entry);
    }

    /// Loads every configured clip from `dir`.
    ///
    /// Clips that are missing or unreadable are skipped with a warning; the
    /// library may end up partially or entirely empty.
    pub fn load(config: &FillerConfig, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut library = Self::new();

        for (emotion, specs) in config.by_emotion() {
            for (idx, spec) in specs.iter().enumerate() {
                let path = dir.join(filler_clip_file_name(emotion, idx + 1, &spec.text));
                match read_wav(&path) {
                    Ok(clip) => library.insert(FillerEntry {
                        emotion,
                        text: spec.text.clone(),
                        description: spec.description.clone(),
                        clip,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            %emotion,
                            "skipping filler clip: {}",
                            e
                        );
                    }
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            clips = library.len(),
            "loaded filler library"
        );
        library
    }

    /// Picks a random filler for `emotion`, falling back to `neutral`.
    pub fn pick(&self, emotion: EmotionTag) -> Option<&FillerEntry> {
        self.pick_with(emotion, &mut rand::thread_rng())
    }

    pub fn pick_with<R: Rng + ?Sized>(
        &self,
        emotion: EmotionTag,
        rng: &mut R,
    ) -> Option<&FillerEntry> {
        self.candidates(emotion)
            .or_else(|| self.candidates(EmotionTag::Neutral))
            .and_then(|entries| entries.choose(rng))
    }

    fn candidates(&self, emotion: EmotionTag) -> Option<&[FillerEntry]> {
        self.entries
            .get(&emotion)
            .map(Vec::as_slice)
            .filter(|entries| !entries.is_empty())
    }

    /// Total number of clips.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
