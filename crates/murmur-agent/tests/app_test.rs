use async_trait::async_trait;
use murmur_agent::app::{load_emotion_table, load_filler_library, load_system_prompt, run_console};
use murmur_agent::{generate_fillers, AgentConfig};
use murmur_types::{EmotionTag, VoiceProfile};
use murmur_voice::{
    filler_clip_file_name, read_wav, write_wav, AudioClip, ChatMessage, ConversationAgent,
    EmotionResolver, EmotionTable, FillerConfig, LanguageModel, SpeechSynthesizer, TokenStream,
    VoiceError, WavDirSink,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;

const REPLY: &str = r#"{"emotion": "curious", "intensity": 0.6, "message": "Tell me more."}"#;

const FILLERS: &str = r#"{
    "settings": {"filler_trigger_threshold_ms": 650},
    "fillers": {
        "neutral": [{"text": "hmm", "description": "thinking"}],
        "happy": [
            {"text": "oh nice", "description": "pleased"},
            {"text": "love that", "description": "warm"}
        ],
        "bored": [{"text": "meh"}]
    }
}"#;

struct FixedModel;

#[async_trait]
impl LanguageModel for FixedModel {
    async fn stream_reply(&self, _: &[ChatMessage]) -> Result<TokenStream, VoiceError> {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(REPLY.to_string())).await.unwrap();
        Ok(rx)
    }
}

/// Returns 10 ms of silence; fails for any text listed in `refuse`.
#[derive(Default)]
struct SilentTts {
    refuse: Vec<&'static str>,
    seen: Mutex<Vec<(String, VoiceProfile)>>,
}

#[async_trait]
impl SpeechSynthesizer for SilentTts {
    async fn synthesize(&self, text: &str, profile: &VoiceProfile) -> Result<AudioClip, VoiceError> {
        self.seen
            .lock()
            .unwrap()
            .push((text.to_string(), profile.clone()));
        if self.refuse.contains(&text) {
            return Err(VoiceError::Tts("voice unavailable".into()));
        }
        Ok(AudioClip::new(vec![0i16; 240], 24_000, 1))
    }
}

fn wav_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "wav"))
        .count()
}

fn console_agent(out: &Path) -> ConversationAgent {
    ConversationAgent::new(
        "prompt",
        Arc::new(FixedModel),
        Arc::new(SilentTts::default()),
        Arc::new(WavDirSink::new(out).unwrap()),
        EmotionResolver::new(Arc::new(EmotionTable::default())),
    )
}

#[tokio::test]
async fn test_console_answers_each_non_empty_line() {
    let out = tempfile::tempdir().unwrap();
    let mut agent = console_agent(out.path());
    let input = BufReader::new(&b"hello\n\n   \nhow much is it?\n"[..]);

    let turns = run_console(&mut agent, input, std::future::pending())
        .await
        .unwrap();

    assert_eq!(turns, 2);
    // Greeting plus two replies.
    assert_eq!(wav_count(out.path()), 3);
    assert_eq!(agent.last_emotion(), EmotionTag::Curious);
}

#[tokio::test(start_paused = true)]
async fn test_console_stops_on_shutdown() {
    let out = tempfile::tempdir().unwrap();
    let mut agent = console_agent(out.path());
    let (_writer, reader) = tokio::io::duplex(64);

    let turns = run_console(
        &mut agent,
        BufReader::new(reader),
        tokio::time::sleep(Duration::from_secs(1)),
    )
    .await
    .unwrap();

    assert_eq!(turns, 0);
    assert_eq!(wav_count(out.path()), 1);
}

fn asset_config(root: &Path) -> AgentConfig {
    let mut config = AgentConfig::default();
    config.assets.emotion_config = root.join("emotion_config.json");
    config.assets.filler_config = root.join("filler_sounds_config.json");
    config.assets.filler_dir = root.join("filler_sounds");
    config.assets.system_prompt = root.join("system_prompt.md");
    config
}

#[test]
fn test_missing_assets_use_built_in_fallbacks() {
    let root = tempfile::tempdir().unwrap();
    let config = asset_config(root.path());

    let table = load_emotion_table(&config.assets.emotion_config).unwrap();
    assert_eq!(table.len(), EmotionTag::ALL.len());

    let prompt = load_system_prompt(&config.assets.system_prompt).unwrap();
    assert!(prompt.contains("\"emotion\""));

    assert!(load_filler_library(&config).is_none());
}

#[test]
fn test_filler_library_loads_present_clips() {
    let root = tempfile::tempdir().unwrap();
    let config = asset_config(root.path());
    std::fs::write(&config.assets.filler_config, FILLERS).unwrap();
    std::fs::create_dir(&config.assets.filler_dir).unwrap();
    let clip = AudioClip::new(vec![1i16; 160], 16_000, 1);
    write_wav(
        config
            .assets
            .filler_dir
            .join(filler_clip_file_name(EmotionTag::Happy, 2, "love that")),
        &clip,
    )
    .unwrap();

    let (library, threshold) = load_filler_library(&config).unwrap();
    assert_eq!(library.len(), 1);
    assert_eq!(threshold, Duration::from_millis(650));

    let mut disabled = config.clone();
    disabled.filler.enabled = false;
    assert!(load_filler_library(&disabled).is_none());
}

#[tokio::test]
async fn test_generate_fillers_writes_named_clips() {
    let out = tempfile::tempdir().unwrap();
    let dir = out.path().join("filler_sounds");
    let config = FillerConfig::from_json(FILLERS).unwrap();
    let resolver = EmotionResolver::new(Arc::new(EmotionTable::default()));
    let tts = SilentTts {
        refuse: vec!["love that"],
        ..Default::default()
    };

    let summary = generate_fillers(&config, &resolver, &tts, &dir).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(
        summary.written,
        vec![dir.join("happy_1_oh_nice.wav"), dir.join("neutral_1_hmm.wav")]
    );
    assert_eq!(read_wav(&summary.written[0]).unwrap().sample_rate(), 24_000);

    let seen = tts.seen.lock().unwrap();
    let happy = seen.iter().find(|(text, _)| text == "oh nice").unwrap();
    assert_eq!(happy.1.emotion_tags, vec!["positivity:high".to_string()]);
    assert!(seen.iter().all(|(text, _)| text != "meh"));
}
