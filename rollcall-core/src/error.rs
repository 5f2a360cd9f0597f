use std::path::PathBuf;

use thiserror::Error;

/// Input problems detected before any network call; never queued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please select a section first.")]
    NoSectionSelected,

    #[error("Scanned code is empty.")]
    EmptyToken,

    #[error("Session has no student id; sign in again.")]
    MissingStudentId,
}

/// Failure talking to the attendance backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response was received (connect, DNS, timeout, body read).
    #[error("network error: {0}")]
    Transport(String),

    /// A response arrived with a non-success status.
    #[error("server responded with {status}: {detail}")]
    Status { status: u16, detail: String },

    /// The request could not be built (bad base URL, encoding).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A success response did not carry the expected payload.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether retrying later can plausibly succeed.
    ///
    /// No response at all, request timeouts, rate limiting and server-side
    /// errors are transient; every other received status is a definitive
    /// business rejection.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => {
                matches!(status, 408 | 425 | 429) || (500..=599).contains(status)
            }
            ApiError::InvalidRequest(_) | ApiError::Decode(_) => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401, .. })
    }

    /// Short operator-facing text for a definitive rejection.
    pub fn operator_message(&self) -> String {
        match self {
            ApiError::Status { status: 401, .. } => {
                "Your session has expired. Please sign in again.".to_string()
            }
            ApiError::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Status {
                status: status.as_u16(),
                detail: err.to_string(),
            }
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Failure reading or writing the offline queue.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue storage I/O failed at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("queue storage holds unreadable data; clear the queue to recover")]
    Corrupt(#[source] serde_json::Error),

    #[error("failed to serialize the queue")]
    Serialize(#[source] serde_json::Error),

    #[error("queue storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure decoding the session credential.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("session token is not a JWT")]
    Malformed,

    #[error("session token payload is not valid base64url")]
    Encoding,

    #[error("session token payload is not valid JSON: {0}")]
    Payload(String),

    #[error("session token is missing the '{0}' claim")]
    MissingClaim(&'static str),

    #[error("session token carries unknown role '{0}'")]
    UnknownRole(String),
}

/// Beacon discovery failure. Always swallowed by the pipeline.
#[derive(Error, Debug)]
pub enum AttestationError {
    #[error("beacon discovery timed out")]
    TimedOut,

    #[error("beacon discovery command failed to start")]
    Spawn(#[source] std::io::Error),

    #[error("beacon discovery exited with status {0}")]
    Exit(i32),

    #[error("no beacon found")]
    NotFound,
}
