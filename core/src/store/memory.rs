//! In-process session store
//!
//! Applies the same semantics as the remote store without a network. Used
//! for offline runs and by tests, which can inject per-operation failures
//! and artificial latency and then inspect every call that was made.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::{
    Credential, Session, SessionStatus, SessionStore, SessionUpdate, WorkoutEntry, WorkoutRecord,
    WorkoutTotals,
};
use crate::error::StoreError;
use crate::exercise::ExerciseKind;

/// Store operations, for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    Update,
    Complete,
    SaveWorkout,
    List,
}

/// A recorded call, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Create {
        exercise: ExerciseKind,
        authenticated: bool,
    },
    Update {
        session_id: String,
        update: SessionUpdate,
        authenticated: bool,
    },
    Complete {
        session_id: String,
        totals: WorkoutTotals,
        authenticated: bool,
    },
    SaveWorkout {
        record: WorkoutRecord,
        authenticated: bool,
    },
    ListWorkouts {
        authenticated: bool,
    },
}

/// History rows in creation order
enum HistoryItem {
    Session(String),
    Workout { id: String, index: usize },
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    workouts: Vec<WorkoutRecord>,
    history: Vec<HistoryItem>,
    calls: Vec<StoreCall>,
    failing: HashSet<StoreOp>,
}

/// Thread-safe in-memory store
#[derive(Default)]
pub struct InMemorySessionStore {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before it takes effect
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make `op` fail with a connection error until [`Self::recover`]
    pub fn fail(&self, op: StoreOp) {
        self.inner.lock().failing.insert(op);
    }

    pub fn recover(&self, op: StoreOp) {
        self.inner.lock().failing.remove(&op);
    }

    /// Every call received so far, failed ones included
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().calls.clone()
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.inner.lock().sessions.get(session_id).cloned()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.inner.lock().sessions.values().cloned().collect()
    }

    /// Records written through the fallback save
    pub fn saved_workouts(&self) -> Vec<WorkoutRecord> {
        self.inner.lock().workouts.clone()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Record the call and report whether it should fail
    fn record(&self, op: StoreOp, call: StoreCall) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(call);
        if inner.failing.contains(&op) {
            return Err(StoreError::ConnectionFailed {
                message: format!("injected {:?} failure", op),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(
        &self,
        exercise: ExerciseKind,
        auth: Option<&Credential>,
    ) -> Result<Session, StoreError> {
        self.delay().await;
        self.record(
            StoreOp::Create,
            StoreCall::Create {
                exercise,
                authenticated: auth.is_some(),
            },
        )?;

        let session = Session {
            session_id: uuid::Uuid::new_v4().to_string(),
            exercise,
            reps: 0,
            duration_seconds: 0,
            status: SessionStatus::Active,
        };
        let mut inner = self.inner.lock();
        inner
            .sessions
            .insert(session.session_id.clone(), session.clone());
        inner.history.push(HistoryItem::Session(session.session_id.clone()));
        Ok(session)
    }

    async fn update_session(
        &self,
        session_id: &str,
        update: &SessionUpdate,
        auth: Option<&Credential>,
    ) -> Result<(), StoreError> {
        self.delay().await;
        self.record(
            StoreOp::Update,
            StoreCall::Update {
                session_id: session_id.to_string(),
                update: *update,
                authenticated: auth.is_some(),
            },
        )?;

        let mut inner = self.inner.lock();
        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound {
                session_id: session_id.to_string(),
            })?;
        if session.status == SessionStatus::Completed {
            return Err(StoreError::Rejected {
                reason: format!("session {} is already completed", session_id),
            });
        }
        if let Some(reps) = update.reps {
            session.reps = reps;
        }
        if let Some(duration) = update.duration_seconds {
            session.duration_seconds = duration;
        }
        Ok(())
    }

    async fn complete_session(
        &self,
        session_id: &str,
        totals: &WorkoutTotals,
        auth: Option<&Credential>,
    ) -> Result<(), StoreError> {
        self.delay().await;
        self.record(
            StoreOp::Complete,
            StoreCall::Complete {
                session_id: session_id.to_string(),
                totals: *totals,
                authenticated: auth.is_some(),
            },
        )?;

        let mut inner = self.inner.lock();
        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound {
                session_id: session_id.to_string(),
            })?;
        session.reps = totals.reps;
        session.duration_seconds = totals.duration_seconds;
        session.status = SessionStatus::Completed;
        Ok(())
    }

    async fn save_workout(
        &self,
        record: &WorkoutRecord,
        auth: Option<&Credential>,
    ) -> Result<(), StoreError> {
        self.delay().await;
        self.record(
            StoreOp::SaveWorkout,
            StoreCall::SaveWorkout {
                record: record.clone(),
                authenticated: auth.is_some(),
            },
        )?;
        let mut inner = self.inner.lock();
        let index = inner.workouts.len();
        inner.workouts.push(record.clone());
        inner.history.push(HistoryItem::Workout {
            id: uuid::Uuid::new_v4().to_string(),
            index,
        });
        Ok(())
    }

    async fn list_workouts(&self, auth: Option<&Credential>) -> Result<Vec<WorkoutEntry>, StoreError> {
        self.delay().await;
        self.record(
            StoreOp::List,
            StoreCall::ListWorkouts {
                authenticated: auth.is_some(),
            },
        )?;

        let inner = self.inner.lock();
        let entries = inner
            .history
            .iter()
            .filter_map(|item| match item {
                HistoryItem::Session(session_id) => {
                    let session = inner.sessions.get(session_id)?;
                    Some(WorkoutEntry {
                        id: Some(session.session_id.clone()),
                        exercise: Some(session.exercise.to_string()),
                        reps: Some(session.reps),
                        duration_seconds: Some(session.duration_seconds),
                        session_id: Some(session.session_id.clone()),
                        date: None,
                        status: Some(session.status.as_str().to_string()),
                    })
                }
                HistoryItem::Workout { id, index } => {
                    let record = inner.workouts.get(*index)?;
                    Some(WorkoutEntry {
                        id: Some(id.clone()),
                        exercise: Some(record.exercise.to_string()),
                        reps: Some(record.reps),
                        duration_seconds: Some(record.duration_seconds),
                        ..WorkoutEntry::default()
                    })
                }
            })
            .collect();
        Ok(entries)
    }
}
