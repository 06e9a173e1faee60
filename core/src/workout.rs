//! Active workout handle
//!
//! One [`Workout`] per exercise set. It owns the rep counter, the duration
//! timer and the session synchronizer, and it is the only thing that
//! mutates them: frames and timer ticks are serialized through a single
//! driver task, so there is never parallel access to the counters.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::counter::{RepCounter, ThresholdConfig};
use crate::error::{CoachError, Result, StoreError};
use crate::exercise::{AngleSet, ExerciseKind};
use crate::feedback::{classify, Feedback};
use crate::pose::PoseFrame;
use crate::store::{Credential, Session, SessionStore};
use crate::sync::{CompletionOutcome, SessionSync};

/// Settings for one workout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkoutConfig {
    pub exercise: ExerciseKind,
    pub thresholds: ThresholdConfig,
    /// Duration timer period; one tick adds one second
    pub tick: Duration,
}

impl WorkoutConfig {
    pub fn new(exercise: ExerciseKind) -> Self {
        Self {
            exercise,
            thresholds: exercise.default_thresholds(),
            tick: Duration::from_secs(1),
        }
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdConfig) -> Result<Self> {
        thresholds.validate()?;
        self.thresholds = thresholds;
        Ok(self)
    }
}

/// Events published to whoever renders the workout
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkoutEvent {
    /// A frame was measured and classified
    Measured { angles: AngleSet, feedback: Feedback },
    /// Required joints were missing; nothing changed this frame
    DetectionGap,
    RepCompleted { count: u32 },
    Tick { duration_seconds: u32 },
    /// The remote session now exists; updates flow from here on
    SessionStarted { session_id: String },
    /// The session could not be created; results are saved at the end
    SessionUnavailable,
}

/// What one frame did to the workout
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameReport {
    pub angles: Option<AngleSet>,
    pub feedback: Option<Feedback>,
    /// Rep totals reached during this frame (at most one in practice)
    pub completed_reps: Vec<u32>,
}

impl FrameReport {
    pub fn is_gap(&self) -> bool {
        self.angles.is_none()
    }
}

/// Final local counters of a stopped workout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkoutSummary {
    pub exercise: ExerciseKind,
    pub reps: u32,
    pub duration_seconds: u32,
    pub session_id: Option<String>,
    pub degraded: bool,
}

/// Single-threaded workout state: counter, duration and sync.
///
/// [`Workout`] drives this from its task; it can also be driven directly by
/// a caller that already serializes frames and ticks itself.
pub struct WorkoutEngine {
    exercise: ExerciseKind,
    counter: RepCounter,
    rep_events: mpsc::UnboundedReceiver<u32>,
    sync: SessionSync,
    duration_seconds: u32,
    last_feedback: Option<Feedback>,
}

impl WorkoutEngine {
    pub fn new(config: &WorkoutConfig, sync: SessionSync) -> Result<Self> {
        let (rep_tx, rep_events) = mpsc::unbounded_channel();
        let counter = RepCounter::new(config.thresholds, move |count| {
            // receiver lives in the same engine, so this only fails mid-drop
            let _ = rep_tx.send(count);
        })?;

        Ok(Self {
            exercise: config.exercise,
            counter,
            rep_events,
            sync,
            duration_seconds: 0,
            last_feedback: None,
        })
    }

    /// Measure, classify and count one frame.
    ///
    /// A frame missing required joints changes nothing: the counter holds
    /// its phase and the previous feedback stays current.
    pub fn on_frame(&mut self, frame: &PoseFrame) -> FrameReport {
        let Some(angles) = self.exercise.measure(frame) else {
            return FrameReport::default();
        };

        let feedback = classify(self.exercise, &angles);
        self.last_feedback = Some(feedback);
        self.counter.update(angles.primary);

        let mut completed_reps = Vec::new();
        while let Ok(count) = self.rep_events.try_recv() {
            debug!("Rep {} completed", count);
            self.sync.push_update(count, self.duration_seconds);
            completed_reps.push(count);
        }

        FrameReport {
            angles: Some(angles),
            feedback: Some(feedback),
            completed_reps,
        }
    }

    /// Apply the create request's result. On success the totals reached so
    /// far are sent right away, since updates before this point had no
    /// session to go to.
    pub fn on_session_started(&mut self, result: std::result::Result<Session, StoreError>) -> WorkoutEvent {
        self.sync.resolve_start(result);
        match self.sync.session_id() {
            Some(session_id) => {
                let session_id = session_id.to_string();
                let (reps, duration) = (self.counter.count(), self.duration_seconds);
                if reps > 0 || duration > 0 {
                    self.sync.push_update(reps, duration);
                }
                WorkoutEvent::SessionStarted { session_id }
            }
            None => WorkoutEvent::SessionUnavailable,
        }
    }

    /// Advance the duration by one second and mirror it remotely
    pub fn on_tick(&mut self) -> u32 {
        self.duration_seconds += 1;
        self.sync.push_update(self.counter.count(), self.duration_seconds);
        self.duration_seconds
    }

    pub fn exercise(&self) -> ExerciseKind {
        self.exercise
    }

    pub fn reps(&self) -> u32 {
        self.counter.count()
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    pub fn last_feedback(&self) -> Option<Feedback> {
        self.last_feedback
    }

    pub fn counter(&self) -> &RepCounter {
        &self.counter
    }

    pub fn sync(&self) -> &SessionSync {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SessionSync {
        &mut self.sync
    }

    pub fn summary(&self) -> WorkoutSummary {
        WorkoutSummary {
            exercise: self.exercise,
            reps: self.counter.count(),
            duration_seconds: self.duration_seconds,
            session_id: self.sync.session_id().map(str::to_string),
            degraded: self.sync.is_degraded(),
        }
    }

    /// Push the final counters through the synchronizer
    pub async fn finish(mut self) -> CompletionOutcome {
        let (reps, duration) = (self.counter.count(), self.duration_seconds);
        self.sync.complete(reps, duration).await
    }
}

/// A stopped workout: local totals now, remote outcome later
pub struct StoppedWorkout {
    pub summary: WorkoutSummary,
    /// Completion running in the background; await it to learn the
    /// outcome, or drop it to let it finish unobserved
    pub completion: JoinHandle<CompletionOutcome>,
}

/// Result of the background create request, as the driver receives it
type StartResult = std::result::Result<Session, StoreError>;

fn start_result(received: std::result::Result<StartResult, oneshot::error::RecvError>) -> StartResult {
    received.unwrap_or_else(|_| {
        Err(StoreError::ConnectionFailed {
            message: "session start task ended without a result".to_string(),
        })
    })
}

/// Handle to a running workout.
///
/// Call [`Workout::stop`] to end it. Dropping the handle halts the driver
/// but never sends the final counters.
pub struct Workout {
    exercise: ExerciseKind,
    cancel: CancellationToken,
    driver: Option<JoinHandle<(WorkoutEngine, Option<oneshot::Receiver<StartResult>>)>>,
}

impl Workout {
    /// Start a workout: frames and the duration timer are consumed at once
    /// while the remote session is created in the background.
    ///
    /// Reps counted before the session exists are sent as soon as it does.
    /// Invalid thresholds fail here, before any request is made. A failed
    /// session start does not: the workout runs degraded.
    pub fn start(
        config: WorkoutConfig,
        store: Arc<dyn SessionStore>,
        credential: Option<Credential>,
        frames: mpsc::Receiver<PoseFrame>,
    ) -> Result<(Workout, mpsc::UnboundedReceiver<WorkoutEvent>)> {
        if config.tick.is_zero() {
            return Err(CoachError::InvalidConfig {
                message: "tick period must be greater than 0".to_string(),
            });
        }

        let sync = SessionSync::new(store, config.exercise, credential);
        let mut engine = WorkoutEngine::new(&config, sync)?;

        let (started_tx, started_rx) = oneshot::channel();
        if let Some(request) = engine.sync_mut().begin() {
            tokio::spawn(async move {
                let _ = started_tx.send(request.await);
            });
        }
        info!("Workout started: {}", config.exercise);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let driver = tokio::spawn(drive(
            engine,
            frames,
            started_rx,
            events_tx,
            cancel.clone(),
            config.tick,
        ));

        Ok((
            Workout {
                exercise: config.exercise,
                cancel,
                driver: Some(driver),
            },
            events_rx,
        ))
    }

    pub fn exercise(&self) -> ExerciseKind {
        self.exercise
    }

    pub fn is_running(&self) -> bool {
        self.driver.as_ref().is_some_and(|d| !d.is_finished())
    }

    /// Stop the timer and frame consumption, then complete in the background.
    ///
    /// Returns once the driver has exited, so no tick fires after this
    /// returns. The network completion is not awaited here; if the session
    /// is still being created, the completion waits for it first.
    pub async fn stop(mut self) -> Result<StoppedWorkout> {
        self.cancel.cancel();
        let driver = self.driver.take().ok_or_else(|| CoachError::WorkoutAborted {
            message: "workout already stopped".to_string(),
        })?;
        let (mut engine, pending_start) = driver.await.map_err(|e| CoachError::WorkoutAborted {
            message: e.to_string(),
        })?;

        let summary = engine.summary();
        info!(
            "Workout stopped: {} reps in {}s",
            summary.reps, summary.duration_seconds
        );
        let completion = tokio::spawn(async move {
            if let Some(started) = pending_start {
                debug!("Session start still pending at stop; waiting for it");
                engine.sync_mut().resolve_start(start_result(started.await));
            }
            engine.finish().await
        });
        Ok(StoppedWorkout {
            summary,
            completion,
        })
    }
}

impl Drop for Workout {
    fn drop(&mut self) {
        self.cancel.cancel();
        if self.driver.is_some() {
            warn!(
                "{} workout dropped without stop(); final counters were not saved",
                self.exercise
            );
        }
    }
}

async fn drive(
    mut engine: WorkoutEngine,
    mut frames: mpsc::Receiver<PoseFrame>,
    mut started: oneshot::Receiver<StartResult>,
    events: mpsc::UnboundedSender<WorkoutEvent>,
    cancel: CancellationToken,
    tick: Duration,
) -> (WorkoutEngine, Option<oneshot::Receiver<StartResult>>) {
    let mut ticker = interval_at(Instant::now() + tick, tick);
    let mut frames_open = true;
    let mut start_pending = true;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = ticker.tick() => {
                let duration_seconds = engine.on_tick();
                let _ = events.send(WorkoutEvent::Tick { duration_seconds });
            }

            result = &mut started, if start_pending => {
                start_pending = false;
                let _ = events.send(engine.on_session_started(start_result(result)));
            }

            frame = frames.recv(), if frames_open => {
                let Some(frame) = frame else {
                    debug!("Frame source closed; timer keeps running until stop");
                    frames_open = false;
                    continue;
                };
                let report = engine.on_frame(&frame);
                match (report.angles, report.feedback) {
                    (Some(angles), Some(feedback)) => {
                        let _ = events.send(WorkoutEvent::Measured { angles, feedback });
                    }
                    _ => {
                        let _ = events.send(WorkoutEvent::DetectionGap);
                    }
                }
                for count in report.completed_reps {
                    let _ = events.send(WorkoutEvent::RepCompleted { count });
                }
            }
        }
    }

    (engine, start_pending.then_some(started))
}
