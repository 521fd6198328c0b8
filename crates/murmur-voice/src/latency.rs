//! Per-turn latency bookkeeping across the voice pipeline.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Pipeline milestones, in the order they normally occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    UserSpeechEnd,
    SttFinalized,
    LlmStart,
    LlmFirstToken,
    LlmComplete,
    TtsStart,
    TtsFirstChunk,
    TtsComplete,
}

/// Durations between milestones. A segment is `None` when either end was
/// never marked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatencyReport {
    pub vad_to_stt: Option<Duration>,
    pub stt_to_llm: Option<Duration>,
    pub llm_ttft: Option<Duration>,
    pub llm_total: Option<Duration>,
    pub llm_to_tts: Option<Duration>,
    pub tts_first_chunk: Option<Duration>,
    pub tts_total: Option<Duration>,
    pub end_to_end: Option<Duration>,
}

fn millis(d: Option<Duration>) -> Option<f64> {
    d.map(|d| d.as_secs_f64() * 1000.0)
}

impl LatencyReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Emits the report as one structured `info` event; missing segments are
    /// left out.
    pub fn log(&self) {
        tracing::info!(
            vad_to_stt_ms = millis(self.vad_to_stt),
            stt_to_llm_ms = millis(self.stt_to_llm),
            llm_ttft_ms = millis(self.llm_ttft),
            llm_total_ms = millis(self.llm_total),
            llm_to_tts_ms = millis(self.llm_to_tts),
            tts_first_chunk_ms = millis(self.tts_first_chunk),
            tts_total_ms = millis(self.tts_total),
            end_to_end_ms = millis(self.end_to_end),
            "turn latency"
        );
    }
}

/// Records when each [`Stage`] was reached during the current turn.
#[derive(Debug, Clone, Default)]
pub struct LatencyTracker {
    marks: HashMap<Stage, Instant>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `stage` as reached now, replacing any earlier mark.
    pub fn mark(&mut self, stage: Stage) -> Instant {
        let now = Instant::now();
        self.marks.insert(stage, now);
        now
    }

    pub fn mark_at(&mut self, stage: Stage, at: Instant) {
        self.marks.insert(stage, at);
    }

    /// Time from `start` to `end`, if both were marked. Saturates at zero.
    pub fn duration(&self, start: Stage, end: Stage) -> Option<Duration> {
        let start = self.marks.get(&start)?;
        let end = self.marks.get(&end)?;
        Some(end.saturating_duration_since(*start))
    }

    pub fn report(&self) -> LatencyReport {
        use Stage::*;
        LatencyReport {
            vad_to_stt: self.duration(UserSpeechEnd, SttFinalized),
            stt_to_llm: self.duration(SttFinalized, LlmStart),
            llm_ttft: self.duration(LlmStart, LlmFirstToken),
            llm_total: self.duration(LlmStart, LlmComplete),
            llm_to_tts: self.duration(LlmComplete, TtsStart),
            tts_first_chunk: self.duration(TtsStart, TtsFirstChunk),
            tts_total: self.duration(TtsStart, TtsComplete),
            end_to_end: self.duration(UserSpeechEnd, TtsFirstChunk),
        }
    }

    /// Logs the report for the finished turn and clears every mark.
    pub fn finish_turn(&mut self) -> LatencyReport {
        let report = self.report();
        if !report.is_empty() {
            report.log();
        }
        self.marks.clear();
        report
    }
}
