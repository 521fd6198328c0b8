//! Murmur console agent: configuration, service wiring and the filler
//! generation command.

pub mod app;
pub mod config;
pub mod fillers;

pub use app::{build_agent, run_console, AppError};
pub use config::{load_config, AgentConfig, ConfigError, TtsBackend};
pub use fillers::{generate_fillers, GenerationSummary};
