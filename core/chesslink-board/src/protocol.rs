//! Board protocol messages and payloads.
//!
//! Each frame body is a UTF-8 JSON payload whose shape depends on the action
//! code. Client actions flow from this process to the board; server actions
//! flow from the board back.

use crate::error::{BoardError, BoardResult};
use crate::frame::Frame;
use chesslink_types::RemoteGameState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bluetooth service the board advertises.
pub const BOARD_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e40_0001_b5a3_f393_e0a9_e50e_24dc_ca9e);

/// Actions sent to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientAction {
    WritePreferences,
    StartGame,
    ForceMoves,
    RequestPgnFiles,
    RequestArchive,
    TestLeds,
}

impl ClientAction {
    pub fn code(self) -> u8 {
        match self {
            Self::WritePreferences => 0x01,
            Self::StartGame => 0x02,
            Self::ForceMoves => 0x03,
            Self::RequestPgnFiles => 0x04,
            Self::RequestArchive => 0x05,
            Self::TestLeds => 0x06,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::WritePreferences),
            0x02 => Some(Self::StartGame),
            0x03 => Some(Self::ForceMoves),
            0x04 => Some(Self::RequestPgnFiles),
            0x05 => Some(Self::RequestArchive),
            0x06 => Some(Self::TestLeds),
            _ => None,
        }
    }
}

/// Actions received from the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerAction {
    StateChanged,
    ReturnPgnFiles,
    PgnFilesDone,
    OnError,
    OnMove,
}

impl ServerAction {
    pub fn code(self) -> u8 {
        match self {
            Self::StateChanged => 0x81,
            Self::ReturnPgnFiles => 0x82,
            Self::PgnFilesDone => 0x83,
            Self::OnError => 0x84,
            Self::OnMove => 0x85,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x81 => Some(Self::StateChanged),
            0x82 => Some(Self::ReturnPgnFiles),
            0x83 => Some(Self::PgnFilesDone),
            0x84 => Some(Self::OnError),
            0x85 => Some(Self::OnMove),
            _ => None,
        }
    }
}

fn body_to_string(body: Vec<u8>) -> BoardResult<String> {
    String::from_utf8(body).map_err(|e| BoardError::Protocol(format!("payload is not UTF-8: {e}")))
}

/// A message sent to the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientToServerMessage {
    pub action: ClientAction,
    pub payload: String,
}

impl ClientToServerMessage {
    pub fn new(action: ClientAction, payload: impl Into<String>) -> Self {
        Self {
            action,
            payload: payload.into(),
        }
    }

    /// Builds a message with a JSON payload.
    pub fn json<T: Serialize>(action: ClientAction, value: &T) -> BoardResult<Self> {
        Ok(Self::new(action, serde_json::to_string(value)?))
    }

    pub fn write_preferences(prefs: &Preferences) -> BoardResult<Self> {
        Self::json(ClientAction::WritePreferences, prefs)
    }

    pub fn start_game(request: &StartGameRequest) -> BoardResult<Self> {
        Self::json(ClientAction::StartGame, request)
    }

    pub fn force_moves(state: &RemoteGameState) -> BoardResult<Self> {
        Self::json(ClientAction::ForceMoves, state)
    }

    pub fn request_pgn_files() -> Self {
        Self::new(ClientAction::RequestPgnFiles, "{}")
    }

    pub fn request_archive(files: Vec<String>) -> BoardResult<Self> {
        Self::json(ClientAction::RequestArchive, &ArchiveRequest { files })
    }

    pub fn test_leds() -> Self {
        Self::new(ClientAction::TestLeds, "{}")
    }

    pub fn to_frame(&self) -> Frame {
        Frame::new(self.action.code(), self.payload.as_bytes())
    }

    pub fn from_frame(frame: Frame) -> BoardResult<Self> {
        let action = ClientAction::from_code(frame.action).ok_or_else(|| {
            BoardError::Protocol(format!("unknown client action 0x{:02x}", frame.action))
        })?;
        Ok(Self::new(action, body_to_string(frame.body)?))
    }

    /// Decodes the JSON payload.
    pub fn parse<T: DeserializeOwned>(&self) -> BoardResult<T> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// A message received from the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerToClientMessage {
    pub action: ServerAction,
    pub payload: String,
}

impl ServerToClientMessage {
    pub fn new(action: ServerAction, payload: impl Into<String>) -> Self {
        Self {
            action,
            payload: payload.into(),
        }
    }

    pub fn json<T: Serialize>(action: ServerAction, value: &T) -> BoardResult<Self> {
        Ok(Self::new(action, serde_json::to_string(value)?))
    }

    pub fn to_frame(&self) -> Frame {
        Frame::new(self.action.code(), self.payload.as_bytes())
    }

    pub fn from_frame(frame: Frame) -> BoardResult<Self> {
        let action = ServerAction::from_code(frame.action).ok_or_else(|| {
            BoardError::Protocol(format!("unknown board action 0x{:02x}", frame.action))
        })?;
        Ok(Self::new(action, body_to_string(frame.body)?))
    }

    /// Decodes the JSON payload. An empty payload decodes as `{}`.
    pub fn parse<T: DeserializeOwned>(&self) -> BoardResult<T> {
        let payload = if self.payload.trim().is_empty() {
            "{}"
        } else {
            self.payload.as_str()
        };
        Ok(serde_json::from_str(payload)?)
    }
}

// ── Payloads ────────────────────────────────────────────────────

/// Board preferences written with `WritePreferences`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub auto_send_moves: bool,
    pub sound_enabled: bool,
    pub led_brightness: u8,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_send_moves: true,
            sound_enabled: true,
            led_brightness: 128,
        }
    }
}

/// Starts a local game on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartGameRequest {
    pub white: String,
    pub black: String,
}

/// Full device snapshot carried by `StateChanged`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    #[serde(default)]
    pub game_id: Option<String>,
    #[serde(default)]
    pub pgn: Option<String>,
    #[serde(default)]
    pub last_move: Option<String>,
    #[serde(default)]
    pub should_send_move: bool,
}

/// A move played on the board, carried by `OnMove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub uci: String,
    #[serde(default)]
    pub pgn: Option<String>,
    #[serde(default)]
    pub should_send: bool,
}

/// A game saved on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgnFile {
    pub name: String,
    pub pgn: String,
}

/// Batch of saved games carried by `ReturnPgnFiles`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgnFileList {
    #[serde(default)]
    pub files: Vec<PgnFile>,
}

/// Asks the board to archive saved games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRequest {
    pub files: Vec<String>,
}

/// Error reported by the board, carried by `OnError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceError {
    pub message: String,
}
