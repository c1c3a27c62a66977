//! Observable engine state and discrete events.

use chesslink_types::{BroadcastRound, GameResult, RemoteGame};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broadcast mode as seen by consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastStatus {
    pub active: bool,
    /// Round the board's game is being published to.
    pub round: Option<BroadcastRound>,
}

/// Phase of the online-game session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnlineStatus {
    #[default]
    Idle,
    /// Waiting for the server to start a game.
    Searching,
    /// Relaying a running game.
    Streaming,
}

impl OnlineStatus {
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }
}

impl fmt::Display for OnlineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::Streaming => "streaming",
        })
    }
}

/// Discrete notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Background work hit a non-retryable error and was abandoned.
    Failed { operation: String, message: String },
    /// Stored credentials were rejected and cleared.
    SignedOut,
    /// An online game started streaming.
    GameStarted(RemoteGame),
    /// The streamed online game ended.
    GameFinished {
        game_id: String,
        winner: Option<GameResult>,
    },
    /// Saved games were imported from the board.
    SavedGamesUploaded { imported: usize },
    /// The board reported an error.
    DeviceError(String),
}
