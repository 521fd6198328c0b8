//! Shared types for the Murmur voice agent.
//!
//! This crate provides the domain vocabulary used across all Murmur crates:
//! the closed set of emotion labels a language model may attach to a reply,
//! the structured reply itself, and the resolved voice parameters handed to
//! speech synthesis.

mod emotion;
pub mod voice;

pub use emotion::{
    clamp_intensity, EmotionTag, ModelResponse, ParseEmotionTagError, DEFAULT_INTENSITY,
};
pub use voice::{VoiceProfile, MAX_SPEED, MIN_SPEED};
