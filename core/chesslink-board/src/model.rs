//! Last-known board state derived from inbound frames.

use crate::error::BoardResult;
use crate::protocol::{
    DeviceError, DeviceSnapshot, MovePayload, PgnFile, PgnFileList, ServerAction,
    ServerToClientMessage,
};
use chesslink_types::{BoardState, ConnectionState, GameInfo};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// Discrete board events that are not part of the cached state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// A batch of saved games, in answer to `RequestPgnFiles`.
    PgnFiles(Vec<PgnFile>),
    /// All saved games have been sent.
    PgnFilesDone,
    /// The board reported an error.
    DeviceError(String),
}

/// Observable board state.
///
/// Every container caches its last value and notifies subscribers only when
/// the value actually changes. Writes come from the connection manager.
#[derive(Debug)]
pub struct BoardModel {
    connection: watch::Sender<ConnectionState>,
    game_info: watch::Sender<Option<GameInfo>>,
    board_state: watch::Sender<BoardState>,
    events: broadcast::Sender<BoardEvent>,
}

impl Default for BoardModel {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardModel {
    pub fn new() -> Self {
        let (connection, _) = watch::channel(ConnectionState::default());
        let (game_info, _) = watch::channel(None);
        let (board_state, _) = watch::channel(BoardState::default());
        let (events, _) = broadcast::channel(64);
        Self {
            connection,
            game_info,
            board_state,
            events,
        }
    }

    // ── Readers ──────────────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub fn game_info(&self) -> watch::Receiver<Option<GameInfo>> {
        self.game_info.subscribe()
    }

    pub fn board_state(&self) -> watch::Receiver<BoardState> {
        self.board_state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    pub fn current_connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    // ── Writers ──────────────────────────────────────────────────

    /// Publishes a connectivity change. Returns whether the value changed.
    pub fn set_connection_state(&self, state: ConnectionState) -> bool {
        let changed = replace_if_changed(&self.connection, state);
        if changed {
            debug!(%state, "board connection state changed");
        }
        changed
    }

    /// Applies one inbound message.
    pub fn apply(&self, message: &ServerToClientMessage) -> BoardResult<()> {
        match message.action {
            ServerAction::StateChanged => {
                let snapshot: DeviceSnapshot = message.parse()?;
                if let Some(game_id) = snapshot.game_id {
                    replace_if_changed(&self.game_info, Some(GameInfo::new(game_id)));
                }
                replace_if_changed(
                    &self.board_state,
                    BoardState {
                        pgn: snapshot.pgn,
                        last_move: snapshot.last_move,
                        should_send_move: snapshot.should_send_move,
                    },
                );
            }
            ServerAction::OnMove => {
                let mv: MovePayload = message.parse()?;
                replace_if_changed(
                    &self.board_state,
                    BoardState {
                        pgn: mv.pgn,
                        last_move: Some(mv.uci),
                        should_send_move: mv.should_send,
                    },
                );
            }
            ServerAction::ReturnPgnFiles => {
                let list: PgnFileList = message.parse()?;
                debug!(count = list.files.len(), "board returned saved games");
                let _ = self.events.send(BoardEvent::PgnFiles(list.files));
            }
            ServerAction::PgnFilesDone => {
                let _ = self.events.send(BoardEvent::PgnFilesDone);
            }
            ServerAction::OnError => {
                let text = message
                    .parse::<DeviceError>()
                    .map(|e| e.message)
                    .unwrap_or_else(|_| message.payload.clone());
                warn!(error = %text, "board reported an error");
                let _ = self.events.send(BoardEvent::DeviceError(text));
            }
        }
        Ok(())
    }
}

fn replace_if_changed<T: PartialEq>(sender: &watch::Sender<T>, value: T) -> bool {
    sender.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    })
}
