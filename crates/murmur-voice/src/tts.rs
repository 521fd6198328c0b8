use crate::audio::AudioClip;
use crate::error::VoiceError;
use async_trait::async_trait;
use murmur_types::{VoiceProfile, MAX_SPEED, MIN_SPEED};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum text input size for TTS (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Timeout for a single synthesis request.
const TTS_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_CARTESIA_URL: &str = "https://api.cartesia.ai";
pub const DEFAULT_CARTESIA_MODEL: &str = "sonic-english";
const CARTESIA_VERSION: &str = "2024-06-10";
const CARTESIA_SAMPLE_RATE: u32 = 24_000;

/// Piper's default output rate for medium-quality voices.
const PIPER_SAMPLE_RATE: u32 = 22_050;

/// Turns reply text into audio using a resolved voice profile.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, profile: &VoiceProfile)
        -> Result<AudioClip, VoiceError>;
}

fn check_input(text: &str, profile: &VoiceProfile) -> Result<(), VoiceError> {
    if text.len() > MAX_TTS_INPUT_BYTES {
        return Err(VoiceError::Tts(format!(
            "text exceeds maximum size: {} bytes (limit: {} bytes)",
            text.len(),
            MAX_TTS_INPUT_BYTES
        )));
    }
    if !profile.speed_in_range() {
        return Err(VoiceError::Config(format!(
            "Speed must be between {} and {}",
            MIN_SPEED, MAX_SPEED
        )));
    }
    Ok(())
}

/// Hosted synthesis through Cartesia's `/tts/bytes` endpoint.
///
/// Speed and emotion tags travel as experimental voice controls.
#[derive(Clone)]
pub struct CartesiaSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    voice_id: String,
    model: String,
}

impl std::fmt::Debug for CartesiaSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartesiaSynthesizer")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("voice_id", &self.voice_id)
            .field("model", &self.model)
            .finish()
    }
}

impl CartesiaSynthesizer {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        voice_id: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            voice_id: voice_id.into(),
            model: model.into(),
        }
    }

    /// Request body for one synthesis call.
    pub fn request_body(&self, text: &str, profile: &VoiceProfile) -> Value {
        json!({
            "model_id": self.model,
            "transcript": text,
            "voice": {
                "mode": "id",
                "id": self.voice_id,
                "__experimental_controls": voice_controls(profile),
            },
            "output_format": {
                "container": "raw",
                "encoding": "pcm_s16le",
                "sample_rate": CARTESIA_SAMPLE_RATE,
            },
        })
    }
}

/// Cartesia expresses speed as an offset in `[-1, 1]` around normal pace.
pub fn voice_controls(profile: &VoiceProfile) -> Value {
    json!({
        "speed": (profile.speed - 1.0).clamp(-1.0, 1.0),
        "emotion": profile.emotion_tags,
    })
}

#[async_trait]
impl SpeechSynthesizer for CartesiaSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
    ) -> Result<AudioClip, VoiceError> {
        check_input(text, profile)?;

        let url = format!("{}/tts/bytes", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .header("Cartesia-Version", CARTESIA_VERSION)
            .timeout(TTS_TIMEOUT)
            .json(&self.request_body(text, profile))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!(
                "Cartesia returned {}: {}",
                status, body
            )));
        }

        let bytes = response.bytes().await?;
        Ok(AudioClip::from_pcm_s16le(&bytes, CARTESIA_SAMPLE_RATE, 1))
    }
}

/// Local synthesis through the `piper` binary.
///
/// Piper has no emotion controls; only the profile's speed is applied.
#[derive(Debug, Clone)]
pub struct PiperSynthesizer {
    piper_binary: PathBuf,
    model_path: PathBuf,
    sample_rate: u32,
}

impl PiperSynthesizer {
    pub fn new(piper_binary: impl AsRef<Path>, model_path: impl AsRef<Path>) -> Self {
        Self {
            piper_binary: piper_binary.as_ref().to_path_buf(),
            model_path: model_path.as_ref().to_path_buf(),
            sample_rate: PIPER_SAMPLE_RATE,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for PiperSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
    ) -> Result<AudioClip, VoiceError> {
        check_input(text, profile)?;

        if !self.model_path.exists() {
            return Err(VoiceError::Tts(format!(
                "Model file not found: {:?}",
                self.model_path
            )));
        }

        let mut command = Command::new(&self.piper_binary);
        command
            .arg("--model")
            .arg(&self.model_path)
            .arg("--output_raw")
            // Length scale is inverse of speed (roughly).
            .arg("--length_scale")
            .arg((1.0 / profile.speed).to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| VoiceError::Tts(format!("Failed to spawn piper: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Tts("Failed to open stdin".to_string()))?;
        let text_owned = text.to_string();

        // Spawn a task to write to stdin to avoid deadlock if output buffer fills up
        let write_task = tokio::spawn(async move { stdin.write_all(text_owned.as_bytes()).await });

        let output = tokio::time::timeout(TTS_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Tts(format!(
                    "TTS process timed out after {} seconds",
                    TTS_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Tts(format!("Failed to wait for piper: {}", e)))?;

        match write_task.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(VoiceError::Tts(format!(
                    "Failed to write to piper stdin: {}",
                    e
                )))
            }
            Err(e) => return Err(VoiceError::Tts(format!("Stdin task failed: {}", e))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Tts(format!("Piper failed: {}", stderr)));
        }

        Ok(AudioClip::from_pcm_s16le(&output.stdout, self.sample_rate, 1))
    }
}
