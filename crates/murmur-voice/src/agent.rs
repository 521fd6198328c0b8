use crate::audio::AudioSink;
use crate::error::VoiceError;
use crate::filler::FillerCoordinator;
use crate::latency::{LatencyReport, LatencyTracker, Stage};
use crate::llm::{ChatMessage, LanguageModel};
use crate::resolver::EmotionResolver;
use crate::response::parse_lenient;
use crate::tts::SpeechSynthesizer;
use murmur_types::{EmotionTag, ModelResponse, VoiceProfile};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Default capacity for the per-agent event broadcast channel.
const DEFAULT_EVENT_BROADCAST_CAPACITY: usize = 256;

/// Messages kept after the system prompt before the oldest are dropped.
const MAX_HISTORY_MESSAGES: usize = 40;

/// Event emitted once per completed or failed turn.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    Reply {
        turn: u64,
        response: ModelResponse,
        profile: VoiceProfile,
    },
    TurnFailed {
        turn: u64,
        error: String,
    },
}

/// Result of one spoken turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub turn: u64,
    pub response: ModelResponse,
    pub profile: VoiceProfile,
    /// `true` when the model reply was off-schema and had to be coerced.
    pub recovered: bool,
    pub latency: LatencyReport,
}

/// An emotion-aware conversational agent.
///
/// Each user turn streams a structured reply from the language model while
/// the filler coordinator covers slow starts, then speaks the reply with the
/// voice profile its emotion resolves to.
pub struct ConversationAgent {
    llm: Arc<dyn LanguageModel>,
    tts: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    resolver: EmotionResolver,
    filler: Option<FillerCoordinator>,
    history: Vec<ChatMessage>,
    last_emotion: EmotionTag,
    latency: LatencyTracker,
    turns: u64,
    events_tx: broadcast::Sender<AgentEvent>,
}

impl ConversationAgent {
    pub fn new(
        system_prompt: impl Into<String>,
        llm: Arc<dyn LanguageModel>,
        tts: Arc<dyn SpeechSynthesizer>,
        sink: Arc<dyn AudioSink>,
        resolver: EmotionResolver,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(DEFAULT_EVENT_BROADCAST_CAPACITY);
        Self {
            llm,
            tts,
            sink,
            resolver,
            filler: None,
            history: vec![ChatMessage::system(system_prompt)],
            last_emotion: EmotionTag::Neutral,
            latency: LatencyTracker::new(),
            turns: 0,
            events_tx,
        }
    }

    /// Enables filler sounds for slow replies.
    pub fn with_filler(mut self, filler: FillerCoordinator) -> Self {
        self.filler = Some(filler);
        self
    }

    pub fn last_emotion(&self) -> EmotionTag {
        self.last_emotion
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Subscribes to reply events from this agent.
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events_tx.subscribe()
    }

    /// Voice activity detection saw the user stop speaking.
    pub fn mark_user_speech_end(&mut self) {
        self.latency.mark(Stage::UserSpeechEnd);
    }

    /// Speech-to-text committed the final transcript.
    pub fn mark_transcript_committed(&mut self) {
        self.latency.mark(Stage::SttFinalized);
    }

    /// Answers a transcribed user utterance.
    pub async fn handle_user_turn(&mut self, transcript: &str) -> Result<TurnOutcome, VoiceError> {
        self.push_history(ChatMessage::user(transcript));
        self.run_turn().await
    }

    /// Speaks an opening line driven by `instructions` rather than user input.
    pub async fn greet(&mut self, instructions: &str) -> Result<TurnOutcome, VoiceError> {
        self.push_history(ChatMessage::system(instructions));
        self.run_turn().await
    }

    async fn run_turn(&mut self) -> Result<TurnOutcome, VoiceError> {
        self.turns += 1;
        let turn = self.turns;

        let result = self.speak_reply(turn).await;
        if let Err(e) = &result {
            // Whatever failed, no filler may keep playing past the turn.
            self.filler_response_ready().await;
            warn!(turn, "turn failed: {}", e);
            let _ = self.events_tx.send(AgentEvent::TurnFailed {
                turn,
                error: e.to_string(),
            });
            self.latency.finish_turn();
        }
        result
    }

    async fn speak_reply(&mut self, turn: u64) -> Result<TurnOutcome, VoiceError> {
        self.latency.mark(Stage::LlmStart);
        if let Some(filler) = &self.filler {
            if let Err(e) = filler.dispatched(self.last_emotion).await {
                warn!(turn, "filler coordinator unavailable: {}", e);
            }
        }

        let mut tokens = self.llm.stream_reply(&self.history).await?;
        let mut reply = String::new();
        while let Some(token) = tokens.recv().await {
            let token = token?;
            if reply.is_empty() {
                self.latency.mark(Stage::LlmFirstToken);
                if let Some(filler) = &self.filler {
                    if let Err(e) = filler.first_token().await {
                        warn!(turn, "filler coordinator unavailable: {}", e);
                    }
                }
            }
            reply.push_str(&token);
        }
        self.latency.mark(Stage::LlmComplete);

        if reply.trim().is_empty() {
            return Err(VoiceError::Llm("model returned an empty reply".into()));
        }

        let parsed = parse_lenient(&reply);
        let response = parsed.response;
        self.last_emotion = response.emotion;
        self.push_history(ChatMessage::assistant(reply));

        let profile = self.resolver.resolve(response.emotion, response.intensity);
        info!(
            turn,
            emotion = %response.emotion,
            intensity = response.intensity,
            speed = profile.speed,
            tags = ?profile.emotion_tags,
            "resolved reply voice"
        );

        if response.message.trim().is_empty() {
            return Err(VoiceError::Llm("model reply has an empty message".into()));
        }

        self.latency.mark(Stage::TtsStart);
        let audio = self.tts.synthesize(&response.message, &profile).await?;
        // Synthesis is not chunked; the whole clip counts as the first chunk.
        self.latency.mark(Stage::TtsFirstChunk);

        // The filler must be silent before the reply starts.
        self.filler_response_ready().await;
        self.sink.play(&audio).await?;
        self.latency.mark(Stage::TtsComplete);
        let latency = self.latency.finish_turn();

        let _ = self.events_tx.send(AgentEvent::Reply {
            turn,
            response: response.clone(),
            profile: profile.clone(),
        });

        Ok(TurnOutcome {
            turn,
            response,
            profile,
            recovered: parsed.recovered_from.is_some(),
            latency,
        })
    }

    async fn filler_response_ready(&self) {
        if let Some(filler) = &self.filler {
            if let Err(e) = filler.response_ready().await {
                warn!("filler coordinator unavailable: {}", e);
            }
        }
    }

    fn push_history(&mut self, message: ChatMessage) {
        self.history.push(message);
        let excess = self.history.len().saturating_sub(MAX_HISTORY_MESSAGES + 1);
        if excess > 0 {
            self.history.drain(1..=excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioClip;
    use crate::config::EmotionTable;
    use crate::llm::TokenStream;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct SilentModel;

    #[async_trait]
    impl LanguageModel for SilentModel {
        async fn stream_reply(&self, _: &[ChatMessage]) -> Result<TokenStream, VoiceError> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
    }

    struct NullTts;

    #[async_trait]
    impl SpeechSynthesizer for NullTts {
        async fn synthesize(&self, _: &str, _: &VoiceProfile) -> Result<AudioClip, VoiceError> {
            Ok(AudioClip::new(Vec::<i16>::new(), 16_000, 1))
        }
    }

    struct NullSink;

    #[async_trait]
    impl AudioSink for NullSink {
        async fn play(&self, _: &AudioClip) -> Result<(), VoiceError> {
            Ok(())
        }

        async fn stop(&self) {}
    }

    fn agent() -> ConversationAgent {
        ConversationAgent::new(
            "prompt",
            Arc::new(SilentModel),
            Arc::new(NullTts),
            Arc::new(NullSink),
            EmotionResolver::new(Arc::new(EmotionTable::default())),
        )
    }

    #[tokio::test]
    async fn empty_reply_fails_the_turn() {
        let mut agent = agent();
        let mut events = agent.subscribe();

        let result = agent.handle_user_turn("hello?").await;
        assert!(matches!(result, Err(VoiceError::Llm(_))));
        assert!(matches!(
            events.recv().await.unwrap(),
            AgentEvent::TurnFailed { turn: 1, .. }
        ));
    }

    #[test]
    fn history_keeps_system_prompt_when_trimmed() {
        let mut agent = agent();
        for i in 0..(MAX_HISTORY_MESSAGES + 10) {
            agent.push_history(ChatMessage::user(format!("msg {i}")));
        }
        assert_eq!(agent.history().len(), MAX_HISTORY_MESSAGES + 1);
        assert_eq!(agent.history()[0], ChatMessage::system("prompt"));
        assert_eq!(
            agent.history().last().unwrap().content,
            format!("msg {}", MAX_HISTORY_MESSAGES + 9)
        );
    }
}
