//! Error types for the board link.

use thiserror::Error;

/// Result type for board operations.
pub type BoardResult<T> = Result<T, BoardError>;

/// Errors that can occur talking to the board.
#[derive(Debug, Error)]
pub enum BoardError {
    /// No live connection to write to or read from.
    #[error("board not connected")]
    NotConnected,

    /// Framing desynchronization. The connection must be torn down.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BoardError {
    /// Returns true if the failure is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns true if the connection that produced this error is unusable.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Io(_))
    }
}
