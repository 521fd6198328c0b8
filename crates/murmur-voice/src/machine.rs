//! Per-turn filler state machine.
//!
//! `FillerMachine` performs no I/O. Each [`FillerEvent`] moves it between
//! phases and yields the [`FillerAction`]s its driver must carry out. The
//! driver is the only owner, so the fire and cancel paths are serialized by
//! construction and every late event degrades to a no-op.
//!
//! ```text
//!            Dispatched            TimerElapsed
//!   Idle ───────────────▶ TimerRunning ─────────▶ Fired
//!    ▲                        │                     │
//!    │                        │ FirstToken          │
//!    │                        ▼                     │
//!    └──── ResponseReady ─ Cancelled ◀──────────────┘ (ResponseReady)
//! ```

use murmur_types::EmotionTag;
use std::time::Duration;

/// Default time to wait for the first token before playing a filler.
pub const DEFAULT_FILLER_THRESHOLD: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillerPhase {
    /// No turn in progress.
    Idle,
    /// Model request dispatched, countdown armed.
    TimerRunning,
    /// First token arrived before the countdown elapsed.
    Cancelled,
    /// Countdown elapsed; a filler was selected for playback.
    Fired,
}

impl FillerPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::TimerRunning => "timer_running",
            Self::Cancelled => "cancelled",
            Self::Fired => "fired",
        }
    }
}

/// Inputs to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillerEvent {
    /// The model request was sent. `emotion` is the turn's last known emotion.
    Dispatched { emotion: EmotionTag },
    /// The first token of the reply arrived.
    FirstToken,
    /// The armed countdown elapsed.
    TimerElapsed,
    /// The real reply is about to be played.
    ResponseReady,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillerAction {
    ArmTimer(Duration),
    DisarmTimer,
    PlayFiller(EmotionTag),
    StopFiller,
}

/// Ephemeral state of the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnState {
    pub turn: u64,
    pub phase: FillerPhase,
    pub last_emotion: EmotionTag,
}

#[derive(Debug, Clone)]
pub struct FillerMachine {
    threshold: Duration,
    state: TurnState,
}

impl FillerMachine {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            state: TurnState {
                turn: 0,
                phase: FillerPhase::Idle,
                last_emotion: EmotionTag::Neutral,
            },
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn phase(&self) -> FillerPhase {
        self.state.phase
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Applies `event` and returns the actions to perform, in order.
    ///
    /// Events that do not apply to the current phase return no actions.
    pub fn handle(&mut self, event: FillerEvent) -> Vec<FillerAction> {
        use FillerAction::*;
        use FillerPhase::*;

        let phase = self.state.phase;
        let (next, actions) = match (phase, event) {
            (_, FillerEvent::Dispatched { emotion }) => {
                let mut actions = match phase {
                    TimerRunning => vec![DisarmTimer],
                    Fired => vec![StopFiller],
                    Idle | Cancelled => Vec::new(),
                };
                actions.push(ArmTimer(self.threshold));
                self.state.turn += 1;
                self.state.last_emotion = emotion;
                (TimerRunning, actions)
            }
            (TimerRunning, FillerEvent::FirstToken) => (Cancelled, vec![DisarmTimer]),
            (TimerRunning, FillerEvent::TimerElapsed) => {
                (Fired, vec![PlayFiller(self.state.last_emotion)])
            }
            (TimerRunning, FillerEvent::ResponseReady) => (Idle, vec![DisarmTimer]),
            (Fired, FillerEvent::ResponseReady) => (Idle, vec![StopFiller]),
            (Cancelled, FillerEvent::ResponseReady) => (Idle, Vec::new()),
            (_, FillerEvent::FirstToken | FillerEvent::TimerElapsed | FillerEvent::ResponseReady) => {
                tracing::trace!(
                    turn = self.state.turn,
                    phase = phase.as_str(),
                    ?event,
                    "ignoring filler event"
                );
                return Vec::new();
            }
        };

        tracing::debug!(
            turn = self.state.turn,
            from = phase.as_str(),
            to = next.as_str(),
            ?event,
            "filler transition"
        );
        self.state.phase = next;
        actions
    }
}

impl Default for FillerMachine {
    fn default() -> Self {
        Self::new(DEFAULT_FILLER_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatched(emotion: EmotionTag) -> FillerEvent {
        FillerEvent::Dispatched { emotion }
    }

    #[test]
    fn early_token_cancels_the_timer() {
        let mut machine = FillerMachine::default();
        assert_eq!(
            machine.handle(dispatched(EmotionTag::Neutral)),
            vec![FillerAction::ArmTimer(DEFAULT_FILLER_THRESHOLD)]
        );
        assert_eq!(
            machine.handle(FillerEvent::FirstToken),
            vec![FillerAction::DisarmTimer]
        );
        assert_eq!(machine.phase(), FillerPhase::Cancelled);

        // A timer that slipped through after cancellation does nothing.
        assert!(machine.handle(FillerEvent::TimerElapsed).is_empty());
        assert_eq!(machine.phase(), FillerPhase::Cancelled);
    }

    #[test]
    fn elapsed_timer_plays_filler_for_last_emotion() {
        let mut machine = FillerMachine::default();
        machine.handle(dispatched(EmotionTag::Happy));
        assert_eq!(
            machine.handle(FillerEvent::TimerElapsed),
            vec![FillerAction::PlayFiller(EmotionTag::Happy)]
        );
        assert_eq!(machine.phase(), FillerPhase::Fired);
    }

    #[test]
    fn cancellation_is_idempotent() {
        let mut machine = FillerMachine::default();
        machine.handle(dispatched(EmotionTag::Neutral));
        assert_eq!(machine.handle(FillerEvent::FirstToken).len(), 1);
        assert!(machine.handle(FillerEvent::FirstToken).is_empty());
        assert_eq!(machine.phase(), FillerPhase::Cancelled);
    }

    #[test]
    fn late_cancel_after_fire_is_ignored() {
        let mut machine = FillerMachine::default();
        machine.handle(dispatched(EmotionTag::Sad));
        machine.handle(FillerEvent::TimerElapsed);
        assert!(machine.handle(FillerEvent::FirstToken).is_empty());
        assert_eq!(machine.phase(), FillerPhase::Fired);
    }

    #[test]
    fn response_ready_stops_a_fired_filler() {
        let mut machine = FillerMachine::default();
        machine.handle(dispatched(EmotionTag::Curious));
        machine.handle(FillerEvent::TimerElapsed);
        assert_eq!(
            machine.handle(FillerEvent::ResponseReady),
            vec![FillerAction::StopFiller]
        );
        assert_eq!(machine.phase(), FillerPhase::Idle);
    }

    #[test]
    fn response_ready_returns_every_phase_to_idle() {
        let mut machine = FillerMachine::default();
        machine.handle(dispatched(EmotionTag::Neutral));
        assert_eq!(
            machine.handle(FillerEvent::ResponseReady),
            vec![FillerAction::DisarmTimer]
        );
        assert_eq!(machine.phase(), FillerPhase::Idle);

        machine.handle(dispatched(EmotionTag::Neutral));
        machine.handle(FillerEvent::FirstToken);
        assert!(machine.handle(FillerEvent::ResponseReady).is_empty());
        assert_eq!(machine.phase(), FillerPhase::Idle);

        assert!(machine.handle(FillerEvent::ResponseReady).is_empty());
        assert_eq!(machine.phase(), FillerPhase::Idle);
    }

    #[test]
    fn redispatch_replaces_the_previous_turn() {
        let mut machine = FillerMachine::new(Duration::from_millis(500));
        machine.handle(dispatched(EmotionTag::Neutral));
        assert_eq!(
            machine.handle(dispatched(EmotionTag::Angry)),
            vec![
                FillerAction::DisarmTimer,
                FillerAction::ArmTimer(Duration::from_millis(500))
            ]
        );
        machine.handle(FillerEvent::TimerElapsed);
        assert_eq!(
            machine.handle(dispatched(EmotionTag::Happy)),
            vec![
                FillerAction::StopFiller,
                FillerAction::ArmTimer(Duration::from_millis(500))
            ]
        );
        assert_eq!(machine.state().turn, 3);
        assert_eq!(machine.state().last_emotion, EmotionTag::Happy);
    }
}
