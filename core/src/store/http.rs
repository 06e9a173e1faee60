//! HTTP session store client
//!
//! JSON over HTTP against the workout backend. One request per call, no
//! retries: the synchronizer decides what happens on failure.

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client as HttpClient, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    Credential, Session, SessionStatus, SessionStore, SessionUpdate, WorkoutEntry, WorkoutRecord,
    WorkoutTotals,
};
use crate::error::{CoachError, StoreError};
use crate::exercise::ExerciseKind;

/// Connection settings for the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL the store paths are appended to
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_secs: 10,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parse and sanity-check the base URL
    pub fn parsed_base_url(&self) -> Result<Url, CoachError> {
        let trimmed = self.base_url.trim();
        if trimmed.is_empty() {
            return Err(CoachError::InvalidConfig {
                message: "store.base_url cannot be empty".to_string(),
            });
        }
        // double-encoded values usually mean a corrupted config
        if trimmed.contains("%2F") || trimmed.contains("%3D") || trimmed.contains("%20") {
            return Err(CoachError::InvalidConfig {
                message: format!("store.base_url appears to be URL-encoded: {}", trimmed),
            });
        }
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(CoachError::InvalidConfig {
                message: format!("store.base_url must start with http:// or https://, got {}", trimmed),
            });
        }
        Url::parse(trimmed).map_err(|e| CoachError::InvalidConfig {
            message: format!("store.base_url is not a valid URL: {}", e),
        })
    }
}

#[derive(Serialize)]
struct CreateSessionBody {
    exercise: ExerciseKind,
}

/// Store client over reqwest
#[derive(Debug, Clone)]
pub struct HttpSessionStore {
    base_url: Url,
    timeout: Duration,
    http_client: HttpClient,
}

impl HttpSessionStore {
    pub fn new(config: &StoreConfig) -> Result<Self, CoachError> {
        if config.timeout_secs == 0 {
            return Err(CoachError::InvalidConfig {
                message: "store.timeout_secs must be greater than 0".to_string(),
            });
        }
        let base_url = config.parsed_base_url()?;
        let http_client = HttpClient::builder()
            .timeout(config.timeout())
            .user_agent(concat!("formcoach/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CoachError::InvalidConfig {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url,
            timeout: config.timeout(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with path segments appended (segments are percent-encoded)
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder, auth: Option<&Credential>) -> RequestBuilder {
        match auth {
            Some(credential) => request.header(AUTHORIZATION, format!("Bearer {}", credential.token())),
            None => request,
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout {
                duration: self.timeout,
            }
        } else {
            err.into()
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        session_id: Option<&str>,
    ) -> Result<reqwest::Response, StoreError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(match (status, session_id) {
            (StatusCode::NOT_FOUND, Some(id)) => StoreError::NotFound {
                session_id: id.to_string(),
            },
            (StatusCode::CONFLICT, _) => StoreError::Rejected { reason: message },
            _ => StoreError::Status {
                status: status.as_u16(),
                message,
            },
        })
    }
}

impl HttpSessionStore {
    fn create_request(&self, exercise: ExerciseKind, auth: Option<&Credential>) -> RequestBuilder {
        let request = self
            .http_client
            .post(self.endpoint(&["session"]))
            .json(&CreateSessionBody { exercise });
        self.authorize(request, auth)
    }

    fn update_request(
        &self,
        session_id: &str,
        update: &SessionUpdate,
        auth: Option<&Credential>,
    ) -> RequestBuilder {
        let request = self
            .http_client
            .patch(self.endpoint(&["session", session_id]))
            .json(update);
        self.authorize(request, auth)
    }

    fn complete_request(
        &self,
        session_id: &str,
        totals: &WorkoutTotals,
        auth: Option<&Credential>,
    ) -> RequestBuilder {
        let request = self
            .http_client
            .post(self.endpoint(&["session", session_id, "complete"]))
            .json(totals);
        self.authorize(request, auth)
    }

    fn save_request(&self, record: &WorkoutRecord, auth: Option<&Credential>) -> RequestBuilder {
        let request = self.http_client.post(self.endpoint(&["workout"])).json(record);
        self.authorize(request, auth)
    }

    fn list_request(&self, auth: Option<&Credential>) -> RequestBuilder {
        self.authorize(self.http_client.get(self.endpoint(&["workout"])), auth)
    }
}

/// Create response. Only the id is required; the rest of the document is
/// the server's business and may use any casing or status vocabulary.
#[derive(Deserialize)]
struct CreatedSession {
    #[serde(alias = "sessionId")]
    session_id: String,
}

fn parse_created_session(body: &str, exercise: ExerciseKind) -> Result<Session, StoreError> {
    let created: CreatedSession = serde_json::from_str(body)?;
    let session_id = created.session_id.trim();
    if session_id.is_empty() {
        return Err(StoreError::Decode("session id is empty".to_string()));
    }
    Ok(Session {
        session_id: session_id.to_string(),
        exercise,
        reps: 0,
        duration_seconds: 0,
        status: SessionStatus::Active,
    })
}

/// Anything but an array lists as empty; entries that do not decode are
/// skipped rather than failing the whole listing.
fn parse_workout_list(body: &str) -> Result<Vec<WorkoutEntry>, StoreError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let serde_json::Value::Array(items) = value else {
        debug!("Workout listing is not an array; treating as empty");
        return Ok(Vec::new());
    };

    let mut entries = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value(item) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("Skipping workout entry {}: {}", index, e),
        }
    }
    Ok(entries)
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn create_session(
        &self,
        exercise: ExerciseKind,
        auth: Option<&Credential>,
    ) -> Result<Session, StoreError> {
        debug!("POST {}", self.endpoint(&["session"]));
        let response = self.send(self.create_request(exercise, auth), None).await?;
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        parse_created_session(&body, exercise)
    }

    async fn update_session(
        &self,
        session_id: &str,
        update: &SessionUpdate,
        auth: Option<&Credential>,
    ) -> Result<(), StoreError> {
        debug!("PATCH session {} {:?}", session_id, update);
        self.send(self.update_request(session_id, update, auth), Some(session_id))
            .await?;
        Ok(())
    }

    async fn complete_session(
        &self,
        session_id: &str,
        totals: &WorkoutTotals,
        auth: Option<&Credential>,
    ) -> Result<(), StoreError> {
        debug!("POST session {} complete {:?}", session_id, totals);
        self.send(self.complete_request(session_id, totals, auth), Some(session_id))
            .await?;
        Ok(())
    }

    async fn save_workout(
        &self,
        record: &WorkoutRecord,
        auth: Option<&Credential>,
    ) -> Result<(), StoreError> {
        debug!("POST workout {:?}", record);
        self.send(self.save_request(record, auth), None).await?;
        Ok(())
    }

    async fn list_workouts(&self, auth: Option<&Credential>) -> Result<Vec<WorkoutEntry>, StoreError> {
        debug!("GET {}", self.endpoint(&["workout"]));
        let response = self.send(self.list_request(auth), None).await?;
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        parse_workout_list(&body)
    }
}
