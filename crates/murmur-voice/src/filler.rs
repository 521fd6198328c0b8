//! Filler coordinator: races a countdown against the model's first token.
//!
//! The coordinator is a handle to a driver task that owns a
//! [`FillerMachine`], the countdown and any in-flight filler playback. Turn
//! events arrive over a channel and are applied one at a time, so the
//! timer-fire path and the cancellation path can never both act on a turn.

use crate::audio::AudioSink;
use crate::error::VoiceError;
use crate::library::FillerLibrary;
use crate::machine::{FillerAction, FillerEvent, FillerMachine, TurnState};
use murmur_types::EmotionTag;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};
use tracing::{debug, info, warn};

/// Capacity of the command channel between handles and the driver.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

enum Command {
    Event(FillerEvent),
    ResponseReady(oneshot::Sender<()>),
    State(oneshot::Sender<TurnState>),
}

/// Handle to a running filler coordinator. Cheap to clone.
///
/// The driver task stops once every handle is dropped, interrupting any
/// filler still playing.
#[derive(Debug, Clone)]
pub struct FillerCoordinator {
    tx: mpsc::Sender<Command>,
}

impl FillerCoordinator {
    /// Spawns the driver task on the current tokio runtime.
    pub fn spawn(
        library: Arc<FillerLibrary>,
        sink: Arc<dyn AudioSink>,
        threshold: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let driver = Driver {
            machine: FillerMachine::new(threshold),
            library,
            sink,
            playback: None,
        };
        tokio::spawn(driver.run(rx));
        Self { tx }
    }

    async fn send(&self, command: Command) -> Result<(), VoiceError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| VoiceError::CoordinatorClosed)
    }

    /// The model request for a new turn was sent; arms the countdown.
    pub async fn dispatched(&self, emotion: EmotionTag) -> Result<(), VoiceError> {
        self.send(Command::Event(FillerEvent::Dispatched { emotion }))
            .await
    }

    /// The first reply token arrived. Safe to call any number of times.
    pub async fn first_token(&self) -> Result<(), VoiceError> {
        self.send(Command::Event(FillerEvent::FirstToken)).await
    }

    /// The real reply is ready to play.
    ///
    /// Resolves only after any filler playback has been stopped, so the
    /// caller may start the reply audio immediately afterwards.
    pub async fn response_ready(&self) -> Result<(), VoiceError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::ResponseReady(ack_tx)).await?;
        ack_rx.await.map_err(|_| VoiceError::CoordinatorClosed)
    }

    /// Snapshot of the current turn.
    pub async fn state(&self) -> Result<TurnState, VoiceError> {
        let (state_tx, state_rx) = oneshot::channel();
        self.send(Command::State(state_tx)).await?;
        state_rx.await.map_err(|_| VoiceError::CoordinatorClosed)
    }
}

struct Driver {
    machine: FillerMachine,
    library: Arc<FillerLibrary>,
    sink: Arc<dyn AudioSink>,
    playback: Option<JoinHandle<()>>,
}

impl Driver {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        let sleep = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(sleep);
        let mut armed = false;

        loop {
            tokio::select! {
                // Commands win ties so a token that arrives on the deadline
                // still cancels.
                biased;

                command = rx.recv() => {
                    let Some(command) = command else { break };
                    match command {
                        Command::Event(event) => {
                            self.apply(event, sleep.as_mut(), &mut armed).await;
                        }
                        Command::ResponseReady(ack) => {
                            self.apply(FillerEvent::ResponseReady, sleep.as_mut(), &mut armed)
                                .await;
                            let _ = ack.send(());
                        }
                        Command::State(reply) => {
                            let _ = reply.send(self.machine.state());
                        }
                    }
                }
                () = &mut sleep, if armed => {
                    armed = false;
                    self.apply(FillerEvent::TimerElapsed, sleep.as_mut(), &mut armed).await;
                }
            }
        }

        self.stop_filler().await;
        debug!("filler coordinator stopped");
    }

    async fn apply(&mut self, event: FillerEvent, mut sleep: Pin<&mut Sleep>, armed: &mut bool) {
        for action in self.machine.handle(event) {
            match action {
                FillerAction::ArmTimer(threshold) => {
                    sleep.as_mut().reset(Instant::now() + threshold);
                    *armed = true;
                }
                FillerAction::DisarmTimer => *armed = false,
                FillerAction::PlayFiller(emotion) => self.play_filler(emotion),
                FillerAction::StopFiller => self.stop_filler().await,
            }
        }
    }

    fn play_filler(&mut self, emotion: EmotionTag) {
        let turn = self.machine.state().turn;
        let Some(entry) = self.library.pick(emotion) else {
            warn!(turn, %emotion, "no filler clip available, skipping filler");
            return;
        };

        info!(
            turn,
            %emotion,
            filler_emotion = %entry.emotion,
            text = entry.text.as_str(),
            "model is slow, playing filler"
        );

        let sink = self.sink.clone();
        let clip = entry.clip.clone();
        self.playback = Some(tokio::spawn(async move {
            if let Err(e) = sink.play(&clip).await {
                warn!(turn, "filler playback failed: {}", e);
            }
        }));
    }

    /// Hard-stops the current filler, if one was started.
    ///
    /// Returns only once the playback task has ended, so no filler audio can
    /// reach the sink afterwards.
    async fn stop_filler(&mut self) {
        if let Some(playback) = self.playback.take() {
            let interrupted = !playback.is_finished();
            playback.abort();
            // A task mid-poll on another worker finishes that poll first.
            if let Err(e) = playback.await {
                if !e.is_cancelled() {
                    warn!("filler playback task failed: {}", e);
                }
            }
            self.sink.stop().await;
            debug!(
                turn = self.machine.state().turn,
                interrupted, "filler stopped"
            );
        }
    }
}
