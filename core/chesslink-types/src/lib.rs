//! Core type definitions for chesslink.
//!
//! This crate defines the plain value types shared by the board link, the
//! remote session client and the synchronization engine:
//! - Device connectivity state
//! - Board snapshots derived from inbound frames
//! - Remote resources (games, broadcast tournaments and rounds)
//! - Remote game state as streamed by the server
//!
//! Nothing here performs I/O.

mod board;
mod connection;
mod remote;

pub use board::{BoardDevice, BoardState, GameInfo};
pub use connection::ConnectionState;
pub use remote::{
    BroadcastRound, BroadcastTournament, Color, GameResult, RemoteGame, RemoteGameState,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid color: {0}")]
    InvalidColor(String),
}
