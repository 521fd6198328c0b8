//! Agent configuration loading from file and environment variables.

use murmur_voice::llm::{DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_URL};
use murmur_voice::tts::{DEFAULT_CARTESIA_MODEL, DEFAULT_CARTESIA_URL};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    /// Language model settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Speech synthesis settings.
    #[serde(default)]
    pub tts: TtsConfig,

    /// Paths to prompt, emotion and filler assets.
    #[serde(default)]
    pub assets: AssetsConfig,

    /// Filler sound settings.
    #[serde(default)]
    pub filler: FillerToggle,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_llm_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Which synthesizer speaks replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsBackend {
    #[default]
    Cartesia,
    Piper,
}

impl FromStr for TtsBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cartesia" => Ok(Self::Cartesia),
            "piper" => Ok(Self::Piper),
            other => Err(ConfigError::Invalid(format!("unknown tts backend: {other}"))),
        }
    }
}

/// Speech synthesis configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub backend: TtsBackend,

    #[serde(default)]
    pub cartesia: CartesiaConfig,

    #[serde(default)]
    pub piper: PiperConfig,
}

#[derive(Clone, Deserialize)]
pub struct CartesiaConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub voice_id: String,

    #[serde(default = "default_cartesia_model")]
    pub model: String,

    #[serde(default = "default_cartesia_url")]
    pub base_url: String,
}

impl fmt::Debug for CartesiaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartesiaConfig")
            .field("api_key", &redact(&self.api_key))
            .field("voice_id", &self.voice_id)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Local Piper synthesis.
#[derive(Debug, Clone, Deserialize)]
pub struct PiperConfig {
    /// Path to the `piper` executable.
    #[serde(default = "default_piper_binary")]
    pub binary: PathBuf,

    /// Path to the `.onnx` voice model.
    #[serde(default)]
    pub model_path: PathBuf,

    /// Sample rate the voice model produces.
    #[serde(default = "default_piper_sample_rate")]
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    #[serde(default = "default_emotion_config")]
    pub emotion_config: PathBuf,

    #[serde(default = "default_filler_config")]
    pub filler_config: PathBuf,

    /// Directory holding pre-generated filler clips.
    #[serde(default = "default_filler_dir")]
    pub filler_dir: PathBuf,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: PathBuf,

    /// Where the console sink writes spoken replies.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FillerToggle {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "murmur_voice=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_llm_url() -> String {
    DEFAULT_OPENAI_URL.to_string()
}

fn default_llm_model() -> String {
    DEFAULT_OPENAI_MODEL.to_string()
}

fn default_cartesia_model() -> String {
    DEFAULT_CARTESIA_MODEL.to_string()
}

fn default_cartesia_url() -> String {
    DEFAULT_CARTESIA_URL.to_string()
}

fn default_piper_binary() -> PathBuf {
    PathBuf::from("piper")
}

fn default_piper_sample_rate() -> u32 {
    22_050
}

fn default_emotion_config() -> PathBuf {
    PathBuf::from("assets/emotion_config.json")
}

fn default_filler_config() -> PathBuf {
    PathBuf::from("assets/filler_sounds_config.json")
}

fn default_filler_dir() -> PathBuf {
    PathBuf::from("assets/filler_sounds")
}

fn default_system_prompt() -> PathBuf {
    PathBuf::from("prompts/system_prompt.md")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "[REDACTED]"
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_llm_url(),
            model: default_llm_model(),
        }
    }
}

impl Default for CartesiaConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice_id: String::new(),
            model: default_cartesia_model(),
            base_url: default_cartesia_url(),
        }
    }
}

impl Default for PiperConfig {
    fn default() -> Self {
        Self {
            binary: default_piper_binary(),
            model_path: PathBuf::new(),
            sample_rate: default_piper_sample_rate(),
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            emotion_config: default_emotion_config(),
            filler_config: default_filler_config(),
            filler_dir: default_filler_dir(),
            system_prompt: default_system_prompt(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for FillerToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AgentConfig {
    /// Checks that every credential the selected backends need is present.
    ///
    /// All missing settings are reported together.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` naming each absent setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.llm.api_key.trim().is_empty() {
            missing.push("llm.api_key (OPENAI_API_KEY)".to_string());
        }
        missing.extend(self.missing_tts_settings());
        into_result(missing)
    }

    /// Like [`validate`](Self::validate), but only for speech synthesis.
    ///
    /// Filler generation needs no language model.
    pub fn validate_tts(&self) -> Result<(), ConfigError> {
        into_result(self.missing_tts_settings())
    }

    fn missing_tts_settings(&self) -> Vec<String> {
        let mut missing = Vec::new();
        match self.tts.backend {
            TtsBackend::Cartesia => {
                if self.tts.cartesia.api_key.trim().is_empty() {
                    missing.push("tts.cartesia.api_key (CARTESIA_API_KEY)".to_string());
                }
                if self.tts.cartesia.voice_id.trim().is_empty() {
                    missing.push("tts.cartesia.voice_id (CARTESIA_VOICE_ID)".to_string());
                }
            }
            TtsBackend::Piper => {
                if self.tts.piper.model_path.as_os_str().is_empty() {
                    missing.push("tts.piper.model_path".to_string());
                }
            }
        }
        missing
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("OPENAI_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(url) = var("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = var("MURMUR_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(key) = var("CARTESIA_API_KEY") {
            self.tts.cartesia.api_key = key;
        }
        if let Some(voice) = var("CARTESIA_VOICE_ID") {
            self.tts.cartesia.voice_id = voice;
        }
        if let Some(backend) = var("MURMUR_TTS_BACKEND") {
            self.tts.backend = backend.parse()?;
        }
        if let Some(level) = var("MURMUR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = var("MURMUR_LOG_JSON") {
            self.logging.json = json == "true" || json == "1";
        }
        Ok(())
    }
}

fn into_result(missing: Vec<String>) -> Result<(), ConfigError> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Missing(missing))
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<String>),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `OPENAI_API_KEY` overrides `llm.api_key`
/// - `OPENAI_BASE_URL` overrides `llm.base_url`
/// - `MURMUR_LLM_MODEL` overrides `llm.model`
/// - `CARTESIA_API_KEY` overrides `tts.cartesia.api_key`
/// - `CARTESIA_VOICE_ID` overrides `tts.cartesia.voice_id`
/// - `MURMUR_TTS_BACKEND` overrides `tts.backend` ("cartesia" or "piper")
/// - `MURMUR_LOG_LEVEL` overrides `logging.level`
/// - `MURMUR_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// an override carries an invalid value.
pub fn load_config(path: Option<&str>) -> Result<AgentConfig, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                AgentConfig::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => AgentConfig::default(),
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}
