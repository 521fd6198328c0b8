//! Offline rendering of the configured filler clips.

use murmur_types::DEFAULT_INTENSITY;
use murmur_voice::{
    filler_clip_file_name, write_wav, EmotionResolver, FillerConfig, SpeechSynthesizer,
    VoiceError,
};
use std::path::{Path, PathBuf};

/// Outcome of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationSummary {
    pub written: Vec<PathBuf>,
    pub failed: usize,
}

/// Synthesizes every filler in `config` with its emotion's voice profile and
/// writes the clips into `out_dir` under their conventional file names.
///
/// A clip that fails to synthesize is logged and skipped; the rest are still
/// written.
///
/// # Errors
///
/// Returns `VoiceError` when the output directory cannot be created or a
/// clip cannot be written.
pub async fn generate_fillers(
    config: &FillerConfig,
    resolver: &EmotionResolver,
    tts: &dyn SpeechSynthesizer,
    out_dir: &Path,
) -> Result<GenerationSummary, VoiceError> {
    tokio::fs::create_dir_all(out_dir).await?;
    let mut summary = GenerationSummary::default();

    for (emotion, specs) in config.by_emotion() {
        let profile = resolver.resolve(emotion, DEFAULT_INTENSITY);
        tracing::info!(%emotion, count = specs.len(), speed = profile.speed, "generating fillers");

        for (idx, spec) in specs.iter().enumerate() {
            let file_name = filler_clip_file_name(emotion, idx + 1, &spec.text);
            let clip = match tts.synthesize(&spec.text, &profile).await {
                Ok(clip) => clip,
                Err(e) => {
                    tracing::warn!(%emotion, text = spec.text.as_str(), "filler synthesis failed: {}", e);
                    summary.failed += 1;
                    continue;
                }
            };

            let path = out_dir.join(&file_name);
            write_wav(&path, &clip)?;
            tracing::info!(
                path = %path.display(),
                description = spec.description.as_str(),
                duration_ms = clip.duration().as_millis() as u64,
                "saved filler clip"
            );
            summary.written.push(path);
        }
    }

    Ok(summary)
}
