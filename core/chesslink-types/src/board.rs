//! Board-side value types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A physical board the connection manager can target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardDevice {
    /// Transport address (Bluetooth MAC, or `host:port` for bridged boards).
    pub address: String,
    /// Advertised name, if known.
    #[serde(default)]
    pub name: Option<String>,
}

impl BoardDevice {
    /// Creates a device handle for the given address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    /// Sets the advertised name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Display for BoardDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// Identifies the game currently active on the board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    pub game_id: String,
}

impl GameInfo {
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
        }
    }
}

/// Latest snapshot of the board position.
///
/// Each update replaces the previous snapshot wholesale. Equality covers every
/// field so consumers can tell a real change from a refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardState {
    /// PGN of the game on the board.
    #[serde(default)]
    pub pgn: Option<String>,
    /// Last move played on the board, in UCI notation.
    #[serde(default)]
    pub last_move: Option<String>,
    /// Whether the board asks for `last_move` to be sent to an online game.
    #[serde(default)]
    pub should_send_move: bool,
}

impl BoardState {
    /// Returns the move to send, if the board asks for one.
    pub fn move_to_send(&self) -> Option<&str> {
        if self.should_send_move {
            self.last_move.as_deref()
        } else {
            None
        }
    }
}
