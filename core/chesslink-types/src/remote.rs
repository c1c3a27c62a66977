//! Remote server resources.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An online game the client plays through the board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteGame {
    pub id: String,
    pub url: String,
}

/// A broadcast tournament. Created once and persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BroadcastTournament {
    pub id: String,
    pub url: String,
}

/// A broadcast round. One per broadcast session / local game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BroadcastRound {
    pub id: String,
    pub url: String,
}

/// Side to move / side played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::White => "white",
            Self::Black => "black",
        })
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "white" => Ok(Self::White),
            "black" => Ok(Self::Black),
            other => Err(Error::InvalidColor(other.to_string())),
        }
    }
}

/// Final result of a remote game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    White,
    Black,
    /// Drawn, or ended without a winner (aborted, no start).
    Draw,
}

/// State of a remote game as streamed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteGameState {
    pub game_id: String,
    pub client_color: Color,
    /// Space-separated UCI moves from the start position.
    pub moves: String,
    #[serde(default)]
    pub winner: Option<GameResult>,
}

impl RemoteGameState {
    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    /// Number of half-moves played.
    pub fn ply(&self) -> usize {
        self.moves.split_whitespace().count()
    }
}
