//! Voice pipeline core for the Murmur agent.
//!
//! Sits between the hosted speech services and the conversation: a language
//! model reply tagged with an emotion is resolved into voice parameters for
//! speech synthesis, and a filler coordinator covers slow model starts with a
//! short pre-recorded clip that never overlaps the real reply.
//!
//! Everything slow (inference, synthesis, audio transport) is external and
//! reached through the [`LanguageModel`], [`SpeechSynthesizer`] and
//! [`AudioSink`] traits.

pub mod agent;
pub mod audio;
pub mod config;
pub mod error;
pub mod filler;
pub mod latency;
pub mod library;
pub mod llm;
pub mod machine;
pub mod resolver;
pub mod response;
pub mod tts;

pub use agent::{AgentEvent, ConversationAgent, TurnOutcome};
pub use audio::{read_wav, write_wav, AudioClip, AudioSink, WavDirSink};
pub use config::{filler_clip_file_name, EmotionEntry, EmotionTable, FillerConfig, FillerSpec};
pub use error::VoiceError;
pub use filler::FillerCoordinator;
pub use latency::{LatencyReport, LatencyTracker, Stage};
pub use library::{FillerEntry, FillerLibrary};
pub use llm::{ChatMessage, LanguageModel, OpenAiChat, Role, TokenStream};
pub use machine::{FillerAction, FillerEvent, FillerMachine, FillerPhase, TurnState};
pub use resolver::EmotionResolver;
pub use response::{parse_lenient, parse_strict, ParsedReply, ResponseError};
pub use tts::{CartesiaSynthesizer, PiperSynthesizer, SpeechSynthesizer};
