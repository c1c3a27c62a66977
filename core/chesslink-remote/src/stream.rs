//! Line-delimited JSON streams from the server.
//!
//! [`NdjsonLines`] splits raw body chunks into lines. [`GameStreamDecoder`]
//! validates and folds game-stream records into [`RemoteGameState`] values.
//! Neither does I/O, so both are driven by the client and tested directly.

use crate::error::{RemoteError, RemoteResult};
use chesslink_types::{Color, GameResult, RemoteGame, RemoteGameState};
use serde::Deserialize;

/// FEN of the standard starting position.
pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Speeds that can be played over the board.
pub const SUPPORTED_SPEEDS: [&str; 4] = ["rapid", "classical", "correspondence", "unlimited"];

/// Splits a chunked byte stream into newline-terminated lines.
#[derive(Debug, Default)]
pub struct NdjsonLines {
    buf: Vec<u8>,
}

impl NdjsonLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk as received from the network.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pops the next complete line. Blank keep-alive lines are skipped.
    pub fn next_line(&mut self) -> RemoteResult<Option<String>> {
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8(raw)
                .map_err(|_| RemoteError::InvalidMessage("stream line is not UTF-8".into()))?;
            let line = line.trim();
            if !line.is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
        Ok(None)
    }
}

// ── Wire records ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Tagged {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct Variant {
    key: String,
}

#[derive(Debug, Default, Deserialize)]
struct Player {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameFull {
    id: String,
    variant: Variant,
    speed: String,
    #[serde(default)]
    white: Player,
    #[serde(default)]
    black: Player,
    initial_fen: Option<String>,
    state: GameStateRecord,
}

#[derive(Debug, Deserialize)]
struct GameStateRecord {
    #[serde(default)]
    moves: String,
    status: String,
    winner: Option<Color>,
}

impl GameStateRecord {
    fn result(&self) -> Option<GameResult> {
        match self.status.as_str() {
            "created" | "started" => None,
            _ => Some(match self.winner {
                Some(Color::White) => GameResult::White,
                Some(Color::Black) => GameResult::Black,
                None => GameResult::Draw,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GameStartEvent {
    game: GameStartInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameStartInfo {
    game_id: Option<String>,
    id: Option<String>,
}

fn invalid_message(e: serde_json::Error) -> RemoteError {
    RemoteError::InvalidMessage(e.to_string())
}

/// Parses one event-stream line; returns the game for `gameStart` records.
pub fn parse_game_start(line: &str, site_url: &str) -> RemoteResult<Option<RemoteGame>> {
    let tagged: Tagged = serde_json::from_str(line).map_err(invalid_message)?;
    if tagged.kind != "gameStart" {
        return Ok(None);
    }
    let event: GameStartEvent = serde_json::from_str(line).map_err(invalid_message)?;
    let id = event
        .game
        .game_id
        .or(event.game.id)
        .ok_or_else(|| RemoteError::InvalidMessage("gameStart without game id".into()))?;
    Ok(Some(RemoteGame {
        url: format!("{}/{}", site_url.trim_end_matches('/'), id),
        id,
    }))
}

/// Folds game-stream lines into running game states.
#[derive(Debug)]
pub struct GameStreamDecoder {
    username: String,
    current: Option<RemoteGameState>,
    finished: bool,
}

impl GameStreamDecoder {
    /// Creates a decoder that resolves the viewer's colour from `username`.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            current: None,
            finished: false,
        }
    }

    /// True once a terminal state has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decodes one non-empty line.
    ///
    /// Returns the new state for `gameFull`/`gameState` records and `None` for
    /// records that carry no game state.
    pub fn decode_line(&mut self, line: &str) -> RemoteResult<Option<RemoteGameState>> {
        if self.finished {
            return Ok(None);
        }
        let tagged: Tagged = serde_json::from_str(line).map_err(invalid_message)?;

        let state = match (&self.current, tagged.kind.as_str()) {
            (None, "gameFull") => {
                let full: GameFull = serde_json::from_str(line).map_err(invalid_message)?;
                self.validate(&full)?;
                let client_color = self.viewer_color(&full)?;
                RemoteGameState {
                    game_id: full.id,
                    client_color,
                    moves: full.state.moves.clone(),
                    winner: full.state.result(),
                }
            }
            (None, other) => {
                return Err(RemoteError::InvalidMessage(format!(
                    "expected gameFull as first record, got {other}"
                )));
            }
            (Some(current), "gameState") => {
                let record: GameStateRecord =
                    serde_json::from_str(line).map_err(invalid_message)?;
                RemoteGameState {
                    game_id: current.game_id.clone(),
                    client_color: current.client_color,
                    moves: record.moves.clone(),
                    winner: record.result(),
                }
            }
            (Some(_), _) => return Ok(None),
        };

        self.finished = state.is_over();
        self.current = Some(state.clone());
        Ok(Some(state))
    }

    fn validate(&self, full: &GameFull) -> RemoteResult<()> {
        if full.variant.key != "standard" {
            return Err(RemoteError::InvalidGame(format!(
                "variant {} is not supported",
                full.variant.key
            )));
        }
        if !SUPPORTED_SPEEDS.contains(&full.speed.as_str()) {
            return Err(RemoteError::InvalidGame(format!(
                "speed {} is not supported",
                full.speed
            )));
        }
        match full.initial_fen.as_deref() {
            None | Some("startpos") | Some(STANDARD_START_FEN) => Ok(()),
            Some(fen) => Err(RemoteError::InvalidGame(format!(
                "custom start position {fen}"
            ))),
        }
    }

    fn viewer_color(&self, full: &GameFull) -> RemoteResult<Color> {
        let is_me = |p: &Player| {
            p.id
                .as_deref()
                .is_some_and(|id| id.eq_ignore_ascii_case(&self.username))
        };
        if is_me(&full.white) {
            Ok(Color::White)
        } else if is_me(&full.black) {
            Ok(Color::Black)
        } else {
            Err(RemoteError::InvalidGame(format!(
                "{} is not playing game {}",
                self.username, full.id
            )))
        }
    }
}
