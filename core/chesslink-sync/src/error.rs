//! Error types for the sync engine.

use chesslink_board::BoardError;
use chesslink_remote::RemoteError;
use thiserror::Error;

/// Result type for sync commands.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors returned by sync commands.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Board(#[from] BoardError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// An internal channel closed while a command was waiting on it.
    #[error("channel closed")]
    ChannelClosed,
}

impl SyncError {
    /// Returns true if the failure is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Board(e) => e.is_retryable(),
            Self::Remote(e) => e.is_retryable(),
            Self::ChannelClosed => false,
        }
    }
}
