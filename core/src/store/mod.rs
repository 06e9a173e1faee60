//! Remote workout session store
//!
//! The store owns workout history. The engine only ever writes to it:
//! create a session, push absolute counters, complete it, or, when the
//! lifecycle calls are unavailable, save a session-less workout record.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::exercise::ExerciseKind;

pub use http::{HttpSessionStore, StoreConfig};
pub use memory::{InMemorySessionStore, StoreCall, StoreOp};

/// Lifecycle status of a remote session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    #[default]
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }
}

/// Session record as the store reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(alias = "sessionId")]
    pub session_id: String,
    pub exercise: ExerciseKind,
    #[serde(default)]
    pub reps: u32,
    #[serde(default, alias = "duration")]
    pub duration_seconds: u32,
    #[serde(default)]
    pub status: SessionStatus,
}

/// Partial update; absent fields stay as they are on the server.
///
/// The engine always sends absolute values, so replaying an update is
/// harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

impl SessionUpdate {
    pub fn totals(reps: u32, duration_seconds: u32) -> Self {
        Self {
            reps: Some(reps),
            duration_seconds: Some(duration_seconds),
        }
    }
}

/// Final counters sent on completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutTotals {
    pub reps: u32,
    pub duration_seconds: u32,
}

/// Session-less workout record for the fallback save
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub exercise: ExerciseKind,
    pub reps: u32,
    pub duration_seconds: u32,
}

/// One row of workout history as the store lists it.
///
/// Sessions and fallback saves both show up here. Every field is
/// optional on the wire, and free-form strings are kept as sent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkoutEntry {
    #[serde(alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercise: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    #[serde(alias = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(alias = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Bearer token identifying the caller to the store
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Validate a token for use in an `Authorization` header
    pub fn new(token: impl AsRef<str>) -> Result<Self, StoreError> {
        let trimmed = token.as_ref().trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Err(StoreError::InvalidCredentials {
                reason: "token is empty".to_string(),
            });
        }
        if let Some((index, _)) = trimmed
            .char_indices()
            .find(|(_, ch)| ch.is_control())
        {
            return Err(StoreError::InvalidCredentials {
                reason: format!("control character at position {}", index),
            });
        }
        format!("Bearer {}", trimmed)
            .parse::<reqwest::header::HeaderValue>()
            .map_err(|e| StoreError::InvalidCredentials {
                reason: e.to_string(),
            })?;
        Ok(Self(trimmed.to_string()))
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// The four operations the remote store exposes.
///
/// Every call takes the caller's credential explicitly; `None` is allowed
/// and the store may keep an anonymous record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// `POST /session`
    async fn create_session(
        &self,
        exercise: ExerciseKind,
        auth: Option<&Credential>,
    ) -> Result<Session, StoreError>;

    /// `PATCH /session/{id}`
    async fn update_session(
        &self,
        session_id: &str,
        update: &SessionUpdate,
        auth: Option<&Credential>,
    ) -> Result<(), StoreError>;

    /// `POST /session/{id}/complete`
    async fn complete_session(
        &self,
        session_id: &str,
        totals: &WorkoutTotals,
        auth: Option<&Credential>,
    ) -> Result<(), StoreError>;

    /// `POST /workout`, the session-less fallback
    async fn save_workout(
        &self,
        record: &WorkoutRecord,
        auth: Option<&Credential>,
    ) -> Result<(), StoreError>;

    /// `GET /workout`, past workouts in the order the store returns them
    async fn list_workouts(&self, auth: Option<&Credential>) -> Result<Vec<WorkoutEntry>, StoreError>;
}
