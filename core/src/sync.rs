//! Session lifecycle synchronizer
//!
//! Mirrors local workout counters to the remote store across three phases:
//! start, incremental updates, completion. Counting never waits on the
//! network. Updates are spawned and forgotten; a failed start drops the
//! workout into degraded mode; a failed completion falls back to a single
//! session-less save.

use std::future::Future;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::exercise::ExerciseKind;
use crate::store::{Credential, Session, SessionStore, SessionUpdate, WorkoutRecord, WorkoutTotals};

/// Where the remote session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    NotStarted,
    Active,
    Completed,
}

/// How the final counters reached (or failed to reach) the store
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    /// The session was completed through the lifecycle call
    Completed { session_id: String },
    /// Persisted via the fallback save. `cause` is the completion error, or
    /// `None` when no session ever existed.
    FallbackSaved { cause: Option<StoreError> },
    /// Both the lifecycle path and the fallback failed
    Lost { error: StoreError },
}

impl CompletionOutcome {
    pub fn is_persisted(&self) -> bool {
        !matches!(self, CompletionOutcome::Lost { .. })
    }
}

/// Bridges local counters to one remote session
pub struct SessionSync {
    store: Arc<dyn SessionStore>,
    exercise: ExerciseKind,
    credential: Option<Credential>,
    session_id: Option<String>,
    lifecycle: Lifecycle,
    degraded: bool,
    in_flight: TaskTracker,
}

impl std::fmt::Debug for SessionSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSync")
            .field("exercise", &self.exercise)
            .field("session_id", &self.session_id)
            .field("lifecycle", &self.lifecycle)
            .field("degraded", &self.degraded)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl SessionSync {
    pub fn new(
        store: Arc<dyn SessionStore>,
        exercise: ExerciseKind,
        credential: Option<Credential>,
    ) -> Self {
        Self {
            store,
            exercise,
            credential,
            session_id: None,
            lifecycle: Lifecycle::NotStarted,
            degraded: false,
            in_flight: TaskTracker::new(),
        }
    }

    /// Create the remote session.
    ///
    /// Never fails: on a store error the workout proceeds locally in
    /// degraded mode. Calling it again once started is a no-op.
    pub async fn start(&mut self) {
        let Some(request) = self.begin() else {
            return;
        };
        let result = request.await;
        self.resolve_start(result);
    }

    /// Mark the session as starting and hand back the create request.
    ///
    /// The returned future owns everything it needs, so it can run on its
    /// own task while frames keep flowing. Feed its result to
    /// [`Self::resolve_start`]. Returns `None` once started.
    pub fn begin(
        &mut self,
    ) -> Option<impl Future<Output = Result<Session, StoreError>> + Send + 'static> {
        if self.lifecycle != Lifecycle::NotStarted {
            return None;
        }
        self.lifecycle = Lifecycle::Active;

        let store = self.store.clone();
        let credential = self.credential.clone();
        let exercise = self.exercise;
        Some(async move { store.create_session(exercise, credential.as_ref()).await })
    }

    /// Record the outcome of the create request. Until this runs,
    /// [`Self::push_update`] has no session to write to and does nothing.
    pub fn resolve_start(&mut self, result: Result<Session, StoreError>) {
        match result {
            Ok(session) => {
                info!("Session started: {}", session.session_id);
                self.session_id = Some(session.session_id);
                self.degraded = false;
            }
            Err(e) => {
                warn!("Failed to start {} session, continuing offline: {}", self.exercise, e);
                self.degraded = true;
            }
        }
    }

    /// Send the current absolute counters without waiting for the result.
    ///
    /// Does nothing when there is no active session.
    pub fn push_update(&self, reps: u32, duration_seconds: u32) {
        if self.lifecycle != Lifecycle::Active {
            return;
        }
        let Some(session_id) = self.session_id.clone() else {
            return;
        };

        let store = self.store.clone();
        let credential = self.credential.clone();
        let update = SessionUpdate::totals(reps, duration_seconds);
        self.in_flight.spawn(async move {
            match store
                .update_session(&session_id, &update, credential.as_ref())
                .await
            {
                Ok(()) => debug!("Session {} updated: {:?}", session_id, update),
                Err(e) => warn!("Session {} update failed: {}", session_id, e),
            }
        });
    }

    /// Finalize the workout with its final counters.
    ///
    /// Uses the lifecycle call when a session exists, and exactly one
    /// fallback save otherwise or when that call fails. The synchronizer is
    /// `Completed` afterwards whatever the outcome.
    pub async fn complete(&mut self, reps: u32, duration_seconds: u32) -> CompletionOutcome {
        if self.lifecycle == Lifecycle::Completed {
            warn!("complete() called twice for {} workout", self.exercise);
        }
        self.lifecycle = Lifecycle::Completed;

        let totals = WorkoutTotals {
            reps,
            duration_seconds,
        };

        let cause = match &self.session_id {
            Some(session_id) => {
                match self
                    .store
                    .complete_session(session_id, &totals, self.credential.as_ref())
                    .await
                {
                    Ok(()) => {
                        info!("Session completed: {} ({} reps, {}s)", session_id, reps, duration_seconds);
                        return CompletionOutcome::Completed {
                            session_id: session_id.clone(),
                        };
                    }
                    Err(e) => {
                        warn!("Failed to complete session {}, saving workout instead: {}", session_id, e);
                        Some(e)
                    }
                }
            }
            None => None,
        };

        let record = WorkoutRecord {
            exercise: self.exercise,
            reps,
            duration_seconds,
        };
        match self
            .store
            .save_workout(&record, self.credential.as_ref())
            .await
        {
            Ok(()) => {
                info!("Workout saved without session: {:?}", record);
                CompletionOutcome::FallbackSaved { cause }
            }
            Err(e) => {
                error!("Workout could not be saved: {}", e);
                CompletionOutcome::Lost { error: e }
            }
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Running without a remote session because `start` failed
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn exercise(&self) -> ExerciseKind {
        self.exercise
    }

    /// Number of update requests still running
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait for every update spawned so far to finish. Only for callers
    /// that explicitly want to drain, never used on the frame/timer path.
    pub async fn wait_idle(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
        self.in_flight.reopen();
    }
}
