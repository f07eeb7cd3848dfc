//! Error types shared by the Tessera SDK.

use serde::{Deserialize, Serialize};

/// Result type for SDK operations.
pub type TesseraResult<T> = Result<T, TesseraError>;

/// Error types that can occur when talking to the Tessera API.
///
/// The enum is `Clone` on purpose: a singleflighted fetch hands its outcome
/// to every concurrent waiter, so failures must be shareable. Transport
/// failures are therefore captured as plain status/message data rather than
/// as live client errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TesseraError {
    /// A lookup required the resource to exist and it did not.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// More than one child matched an alias lookup.
    #[error("ambiguous {kind} alias '{alias}': {matches} matches")]
    Ambiguous {
        kind: &'static str,
        alias: String,
        matches: usize,
    },

    /// A strict create found an equivalent resource already present.
    #[error("{kind} '{alias}' already exists")]
    Conflict { kind: &'static str, alias: String },

    /// An operation was attempted in an illegal lifecycle state
    /// (update before create, anything after delete).
    #[error("invalid resource state: {0}")]
    State(String),

    /// Opaque failure from the network layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API returned a non-success response.
    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        details: Option<String>,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Caller-supplied arguments were rejected before any request was made.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A pooled task failed; wraps the underlying error with the call name.
    #[error("task '{name}' failed: {source}")]
    Task {
        name: String,
        #[source]
        source: Box<TesseraError>,
    },

    /// The isolated worker runtime is unavailable.
    #[error("worker error: {0}")]
    Worker(String),
}

impl TesseraError {
    /// Create an API error from a status code and response body.
    ///
    /// 404s become [`TesseraError::NotFound`] so cache lookups can treat
    /// "missing" uniformly regardless of which transport produced it.
    pub fn from_response(status: u16, body: &str) -> Self {
        let (message, details) = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(parsed) => (parsed.error, parsed.details),
            Err(_) => (body.to_string(), None),
        };

        if status == 404 {
            return Self::NotFound(message);
        }

        Self::Api {
            status,
            message,
            details,
        }
    }

    /// Attach a task name to an error raised inside the execution pool.
    pub(crate) fn in_task(self, name: &str) -> Self {
        Self::Task {
            name: name.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with any task-context layers peeled off.
    pub fn root_cause(&self) -> &TesseraError {
        match self {
            Self::Task { source, .. } => source.root_cause(),
            _ => self,
        }
    }
}

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Error response shape used by the Tessera API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
