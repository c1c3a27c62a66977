//! Error types for the remote session client.

use std::time::Duration;
use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Classified failures of remote calls.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No credentials stored, or the server rejected them (401).
    #[error("not signed in")]
    NotSignedIn,

    /// The server refused the operation for these credentials (403).
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Local budget exhausted or server-imposed cool-down still running.
    #[error("too many requests: retry after {}ms", retry_after.as_millis())]
    TooManyRequests { retry_after: Duration },

    /// Any other non-success status.
    #[error("server returned {status}: {body}")]
    GenericNetwork { status: u16, body: String },

    /// The game does not match the supported shape.
    #[error("unsupported game: {0}")]
    InvalidGame(String),

    /// The server sent something that violates the stream contract.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Transport-level failure. Transient.
    #[error("network I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Session store failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RemoteError {
    /// Returns true if the failure is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns true if the failure invalidated the stored credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::NotSignedIn | Self::Authorization(_))
    }

    /// Returns the wait reported by a rate-limit failure.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::TooManyRequests { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for RemoteError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
