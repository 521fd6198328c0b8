#![allow(dead_code)]

use async_trait::async_trait;
use murmur_types::{EmotionTag, VoiceProfile};
use murmur_voice::{
    AudioClip, AudioSink, ChatMessage, FillerEntry, FillerLibrary, LanguageModel,
    SpeechSynthesizer, TokenStream, VoiceError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const NEUTRAL_FILLER: i16 = 1;
pub const HAPPY_FILLER: i16 = 2;
pub const REPLY: i16 = 9;

/// A clip whose every sample is `marker`, lasting `millis` at 16 kHz.
pub fn marker_clip(marker: i16, millis: u64) -> AudioClip {
    AudioClip::new(vec![marker; 16 * millis as usize], 16_000, 1)
}

pub fn marker_of(clip: &AudioClip) -> i16 {
    clip.samples().first().copied().unwrap_or_default()
}

/// Neutral and happy fillers, each three seconds long.
pub fn test_library() -> FillerLibrary {
    let mut library = FillerLibrary::new();
    library.insert(FillerEntry {
        emotion: EmotionTag::Neutral,
        text: "hmm".into(),
        description: "thinking".into(),
        clip: marker_clip(NEUTRAL_FILLER, 3_000),
    });
    library.insert(FillerEntry {
        emotion: EmotionTag::Happy,
        text: "oh nice".into(),
        description: "upbeat".into(),
        clip: marker_clip(HAPPY_FILLER, 3_000),
    });
    library
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Play(i16),
    Done(i16),
    Stop,
}

/// Records what was played; playback takes the clip's duration.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
    stop_delay: Duration,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A sink whose `stop` takes `delay` to return.
    pub fn with_stop_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            stop_delay: delay,
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn plays(&self) -> Vec<i16> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Play(marker) => Some(marker),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, clip: &AudioClip) -> Result<(), VoiceError> {
        let marker = marker_of(clip);
        self.events.lock().unwrap().push(SinkEvent::Play(marker));
        tokio::time::sleep(clip.duration()).await;
        self.events.lock().unwrap().push(SinkEvent::Done(marker));
        Ok(())
    }

    async fn stop(&self) {
        tokio::time::sleep(self.stop_delay).await;
        self.events.lock().unwrap().push(SinkEvent::Stop);
    }
}

/// Streams a fixed reply, waiting `first_token_after` before the first
/// token and sending the rest immediately.
pub struct ScriptedModel {
    tokens: Vec<String>,
    first_token_after: Duration,
    fail: bool,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(reply: &str, first_token_after: Duration) -> Arc<Self> {
        let tokens = reply
            .as_bytes()
            .chunks(8)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect();
        Arc::new(Self {
            tokens,
            first_token_after,
            fail: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(after: Duration) -> Arc<Self> {
        Arc::new(Self {
            tokens: Vec::new(),
            first_token_after: after,
            fail: true,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn stream_reply(&self, messages: &[ChatMessage]) -> Result<TokenStream, VoiceError> {
        self.requests.lock().unwrap().push(messages.to_vec());

        let (tx, rx) = mpsc::channel(64);
        let tokens = self.tokens.clone();
        let delay = self.first_token_after;
        let fail = self.fail;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if fail {
                let _ = tx.send(Err(VoiceError::Llm("upstream reset".into()))).await;
                return;
            }
            for token in tokens {
                if tx.send(Ok(token)).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// Returns a half-second `REPLY` clip and remembers every request.
#[derive(Debug, Default)]
pub struct RecordingTts {
    pub requests: Mutex<Vec<(String, VoiceProfile)>>,
}

impl RecordingTts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last(&self) -> Option<(String, VoiceProfile)> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingTts {
    async fn synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
    ) -> Result<AudioClip, VoiceError> {
        self.requests
            .lock()
            .unwrap()
            .push((text.to_string(), profile.clone()));
        Ok(marker_clip(REPLY, 500))
    }
}
