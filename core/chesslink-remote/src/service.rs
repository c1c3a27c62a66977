//! The remote operations the synchronization engine depends on.

use crate::error::RemoteResult;
use async_trait::async_trait;
use chesslink_types::{BroadcastRound, BroadcastTournament, RemoteGame, RemoteGameState};
use futures::stream::BoxStream;

/// Stream of remote game states, ending after the first terminal state.
pub type GameStateStream = BoxStream<'static, RemoteResult<RemoteGameState>>;

/// Remote chess service used by the sync engine.
///
/// Implemented over HTTP by [`crate::RemoteClient`]; tests substitute an
/// in-memory implementation.
#[async_trait]
pub trait ChessService: Send + Sync {
    /// Verifies `token`, stores it with the account's username and returns
    /// the username.
    async fn sign_in(&self, token: &str) -> RemoteResult<String>;

    /// Forgets stored credentials.
    async fn sign_out(&self) -> RemoteResult<()>;

    async fn create_tournament(&self, name: &str) -> RemoteResult<BroadcastTournament>;

    async fn create_round(
        &self,
        tournament: &BroadcastTournament,
        name: &str,
    ) -> RemoteResult<BroadcastRound>;

    /// Replaces the round's PGN feed.
    async fn push_pgn(&self, round: &BroadcastRound, pgn: &str) -> RemoteResult<()>;

    /// Plays one UCI move in an online game.
    async fn push_move(&self, game: &RemoteGame, uci: &str) -> RemoteResult<()>;

    /// Waits a bounded time for a game to start. `None` means no game yet.
    async fn await_game_start(&self) -> RemoteResult<Option<RemoteGame>>;

    /// Opens the state stream of a running game.
    async fn game_state_stream(&self, game: &RemoteGame) -> RemoteResult<GameStateStream>;

    /// Imports a finished game from PGN.
    async fn import_game(&self, pgn: &str) -> RemoteResult<RemoteGame>;
}
