//! Structured error types for formcoach
//!
//! Geometry and classification never fail (they degrade to sentinel values),
//! so the taxonomy here covers the two places errors can actually surface:
//! setup-time configuration and the remote session store.

use std::time::Duration;
use thiserror::Error;

/// Primary error type for engine setup
#[derive(Error, Debug)]
pub enum CoachError {
    /// Hysteresis thresholds that cannot produce a sane state machine
    #[error("invalid thresholds: down={down} must be below up={up}")]
    InvalidThresholds { up: f64, down: f64 },

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Unknown exercise name
    #[error("unknown exercise: {name}")]
    UnknownExercise { name: String },

    /// Configuration file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// The workout driver task ended abnormally
    #[error("workout aborted: {message}")]
    WorkoutAborted { message: String },

    /// Session store failure that could not be absorbed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoachError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidThresholds { up, down } => format!(
                "The down threshold ({}°) must be lower than the up threshold ({}°).",
                down, up
            ),
            Self::UnknownExercise { name } => {
                format!("'{}' is not a supported exercise. Try 'squat' or 'pushup'.", name)
            }
            _ => self.to_string(),
        }
    }
}

/// Errors from the remote session store
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Network/connection error
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Request did not finish in time
    #[error("request timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Store answered with a non-success status
    #[error("store error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("malformed store response: {0}")]
    Decode(String),

    /// Session id unknown to the store
    #[error("session not found: {session_id}")]
    NotFound { session_id: String },

    /// Store refused the operation (e.g. completing a finished session)
    #[error("store rejected request: {reason}")]
    Rejected { reason: String },

    /// Credential cannot be used as a header value
    #[error("invalid credentials: {reason}")]
    InvalidCredentials { reason: String },
}

impl StoreError {
    /// Check if error is transient.
    ///
    /// Nothing in the engine retries on its own; this is informational for
    /// callers that report a lost workout after the fact.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Decode(_)
            | Self::NotFound { .. }
            | Self::Rejected { .. }
            | Self::InvalidCredentials { .. } => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => {
                "Could not reach the workout server. Check your connection.".to_string()
            }
            Self::Status { status: 401, .. } | Self::Status { status: 403, .. } => {
                "The workout server rejected your credentials. Please log in again.".to_string()
            }
            Self::InvalidCredentials { .. } => {
                "The stored login token is malformed. Please log in again.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured limit on the error
            Self::Timeout {
                duration: Duration::ZERO,
            }
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::ConnectionFailed {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type alias using CoachError
pub type Result<T> = std::result::Result<T, CoachError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(StoreError::Timeout {
            duration: Duration::from_secs(5)
        }
        .is_retryable());

        assert!(StoreError::Status {
            status: 503,
            message: "maintenance".to_string()
        }
        .is_retryable());

        assert!(!StoreError::Status {
            status: 400,
            message: "bad body".to_string()
        }
        .is_retryable());

        assert!(!StoreError::NotFound {
            session_id: "abc".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_user_messages() {
        let err = StoreError::Status {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert!(err.user_message().contains("log in again"));

        let err = CoachError::InvalidThresholds { up: 90.0, down: 160.0 };
        assert!(err.user_message().contains("must be lower"));
    }

    #[test]
    fn test_store_error_converts_into_coach_error() {
        let err: CoachError = StoreError::Rejected {
            reason: "already completed".to_string(),
        }
        .into();
        assert!(matches!(err, CoachError::Store(StoreError::Rejected { .. })));
        assert_eq!(err.to_string(), "store rejected request: already completed");
    }
}
