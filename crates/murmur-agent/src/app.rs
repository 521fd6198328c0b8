//! Wires configuration into a running agent and drives the console loop.

use crate::config::{AgentConfig, ConfigError, TtsBackend};
use murmur_voice::{
    AudioSink, CartesiaSynthesizer, ConversationAgent, EmotionResolver, EmotionTable,
    FillerConfig, FillerCoordinator, FillerLibrary, LanguageModel, OpenAiChat, PiperSynthesizer,
    SpeechSynthesizer, VoiceError, WavDirSink,
};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Opening instruction for the first turn of a session.
pub const GREETING_INSTRUCTIONS: &str = "Greet the customer as a friendly insurance salesperson. \
     Introduce yourself and ask how you can help them today.";

/// Used when the system prompt file is absent.
const FALLBACK_SYSTEM_PROMPT: &str = "You are a friendly voice assistant. \
     Reply only with a JSON object of the form \
     {\"emotion\": \"neutral|happy|sad|angry|confused|curious|excited\", \
     \"intensity\": 0.0-1.0, \"message\": \"what you say aloud\"}.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Voice(#[from] VoiceError),

    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),
}

/// Reads the emotion table, or the built-in one when the file is missing.
pub fn load_emotion_table(path: &Path) -> Result<EmotionTable, VoiceError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "emotion config not found, using built-in table");
        return Ok(EmotionTable::default());
    }
    EmotionTable::load(path)
}

/// Reads the system prompt, or a minimal built-in one when the file is missing.
pub fn load_system_prompt(path: &Path) -> Result<String, VoiceError> {
    match std::fs::read_to_string(path) {
        Ok(prompt) => Ok(prompt),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "system prompt not found, using built-in prompt");
            Ok(FALLBACK_SYSTEM_PROMPT.to_string())
        }
        Err(e) => Err(e.into()),
    }
}

/// Loads the filler clips and their trigger threshold.
///
/// Returns `None` when fillers are disabled or their assets are unusable; the
/// agent then runs without filler sounds.
pub fn load_filler_library(config: &AgentConfig) -> Option<(FillerLibrary, Duration)> {
    if !config.filler.enabled {
        tracing::info!("filler sounds disabled");
        return None;
    }

    let assets = &config.assets;
    if !assets.filler_config.exists() || !assets.filler_dir.is_dir() {
        tracing::warn!(
            config = %assets.filler_config.display(),
            dir = %assets.filler_dir.display(),
            "filler assets not found, running without filler sound support"
        );
        return None;
    }

    let filler_config = match FillerConfig::load(&assets.filler_config) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("invalid filler config, running without filler sound support: {}", e);
            return None;
        }
    };

    let library = FillerLibrary::load(&filler_config, &assets.filler_dir);
    if library.is_empty() {
        tracing::warn!("no filler clips loaded, running without filler sound support");
        return None;
    }
    Some((library, filler_config.threshold()))
}

pub fn build_llm(config: &AgentConfig) -> Arc<dyn LanguageModel> {
    Arc::new(OpenAiChat::new(
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
    ))
}

pub fn build_synthesizer(config: &AgentConfig) -> Arc<dyn SpeechSynthesizer> {
    match config.tts.backend {
        TtsBackend::Cartesia => {
            let c = &config.tts.cartesia;
            Arc::new(CartesiaSynthesizer::new(
                c.base_url.clone(),
                c.api_key.clone(),
                c.voice_id.clone(),
                c.model.clone(),
            ))
        }
        TtsBackend::Piper => {
            let p = &config.tts.piper;
            Arc::new(
                PiperSynthesizer::new(&p.binary, &p.model_path).with_sample_rate(p.sample_rate),
            )
        }
    }
}

/// Assembles the conversation agent from validated configuration.
///
/// Must be called inside a tokio runtime; the filler coordinator is spawned
/// here when filler assets are available.
pub fn build_agent(config: &AgentConfig) -> Result<ConversationAgent, AppError> {
    let table = load_emotion_table(&config.assets.emotion_config)?;
    let resolver = EmotionResolver::new(Arc::new(table));
    let prompt = load_system_prompt(&config.assets.system_prompt)?;
    let sink: Arc<dyn AudioSink> = Arc::new(WavDirSink::new(&config.assets.output_dir)?);

    let mut agent = ConversationAgent::new(
        prompt,
        build_llm(config),
        build_synthesizer(config),
        sink.clone(),
        resolver,
    );

    if let Some((library, threshold)) = load_filler_library(config) {
        tracing::info!(
            clips = library.len(),
            threshold_ms = threshold.as_millis() as u64,
            "filler sounds enabled"
        );
        agent = agent.with_filler(FillerCoordinator::spawn(Arc::new(library), sink, threshold));
    }

    Ok(agent)
}

/// Greets, then answers one user turn per non-empty input line until EOF or
/// `shutdown` resolves. Returns the number of user turns attempted.
///
/// A failed turn is logged and the loop moves on to the next line.
pub async fn run_console<R, S>(
    agent: &mut ConversationAgent,
    input: R,
    shutdown: S,
) -> Result<usize, AppError>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    if let Err(e) = agent.greet(GREETING_INSTRUCTIONS).await {
        tracing::warn!("greeting failed: {}", e);
    }

    let mut lines = input.lines();
    let mut turns = 0;
    loop {
        let line = tokio::select! {
            () = &mut shutdown => {
                tracing::info!("shutdown requested, leaving conversation");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            tracing::info!("input closed, leaving conversation");
            break;
        };

        let transcript = line.trim();
        if transcript.is_empty() {
            continue;
        }

        agent.mark_user_speech_end();
        agent.mark_transcript_committed();
        turns += 1;
        match agent.handle_user_turn(transcript).await {
            Ok(outcome) => {
                tracing::info!(
                    turn = outcome.turn,
                    emotion = %outcome.response.emotion,
                    "agent: {}",
                    outcome.response.message
                );
            }
            Err(e) => tracing::debug!("continuing after failed turn: {}", e),
        }
    }

    Ok(turns)
}
