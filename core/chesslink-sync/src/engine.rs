//! Synchronization engine.
//!
//! Owns the observable sync state and runs the reactive processes that keep
//! the board and the remote session consistent:
//!
//! - (a) board PGN → broadcast round
//! - (b) board move → online game
//! - (c) online game state → board
//! - (d) board reconnect → board (re-push latest game state)
//! - (e) new local game → cancel the online session
//!
//! Each process is a supervisor task holding a [`LatestTask`] slot, so a new
//! trigger value aborts the previous derived task instead of queuing behind it.
//! Commands are plain async methods returning [`SyncResult`].

use crate::error::{SyncError, SyncResult};
use crate::processes;
use crate::slot::LatestTask;
use crate::state::{BroadcastStatus, OnlineStatus, SyncEvent};
use chesslink_board::{
    BoardEvent, ClientToServerMessage, ConnectionManager, PgnFile, Preferences, StartGameRequest,
};
use chesslink_remote::{ChessService, RemoteError, RemoteResult, SessionStore};
use chesslink_types::{
    BoardDevice, BoardState, BroadcastRound, BroadcastTournament, ConnectionState, GameInfo,
    RemoteGame, RemoteGameState,
};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Wait before retrying a transient remote failure.
    pub retry_delay: Duration,
    /// Wait between "no game yet" answers while searching for an online game.
    pub search_delay: Duration,
    /// How long to wait for the board to list its saved games.
    pub saved_games_timeout: Duration,
    /// Name of the broadcast tournament created on first use.
    pub tournament_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(2500),
            search_delay: Duration::from_millis(2500),
            saved_games_timeout: Duration::from_secs(30),
            tournament_name: "chesslink board games".to_string(),
        }
    }
}

/// Round currently used for the broadcast, and the local game it belongs to.
#[derive(Default)]
struct RoundSlot {
    round: Option<BroadcastRound>,
    local_game: Option<String>,
}

/// State shared between the engine handle and its tasks.
pub(crate) struct Shared {
    pub(crate) config: SyncConfig,
    pub(crate) board: Arc<ConnectionManager>,
    pub(crate) remote: Arc<dyn ChessService>,
    session: Arc<SessionStore>,

    pub(crate) broadcast: watch::Sender<BroadcastStatus>,
    pub(crate) online: watch::Sender<OnlineStatus>,
    pub(crate) active_game: watch::Sender<Option<RemoteGame>>,
    pub(crate) remote_state: watch::Sender<Option<RemoteGameState>>,
    pub(crate) events: broadcast::Sender<SyncEvent>,

    pub(crate) online_task: Mutex<LatestTask>,
    /// Local game id the streaming online game is bound to.
    pub(crate) tracked_game: Mutex<Option<String>>,
    /// Last board snapshot dispatched as a move.
    pub(crate) sent_move: Mutex<Option<BoardState>>,
    round: tokio::sync::Mutex<RoundSlot>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    pub(crate) fn online_task(&self) -> MutexGuard<'_, LatestTask> {
        lock(&self.online_task)
    }

    pub(crate) fn tracked_game(&self) -> MutexGuard<'_, Option<String>> {
        lock(&self.tracked_game)
    }

    pub(crate) fn sent_move(&self) -> MutexGuard<'_, Option<BoardState>> {
        lock(&self.sent_move)
    }

    pub(crate) fn board_game_id(&self) -> Option<String> {
        self.board
            .game_info()
            .borrow()
            .as_ref()
            .map(|g| g.game_id.clone())
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Surfaces a non-retryable failure once.
    pub(crate) fn report(&self, operation: &str, error: &RemoteError) {
        warn!(operation, error = %error, "abandoning remote operation");
        if error.is_auth_failure() {
            self.emit(SyncEvent::SignedOut);
        }
        self.emit(SyncEvent::Failed {
            operation: operation.to_string(),
            message: error.to_string(),
        });
    }

    /// Runs `call` until it succeeds, retrying transient failures every
    /// `retry_delay`. Returns `None` after reporting a non-retryable failure.
    pub(crate) async fn retry_remote<T, F, Fut>(&self, operation: &str, mut call: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Some(value),
                Err(e) if e.is_retryable() => {
                    warn!(operation, attempt, error = %e, "transient failure, retrying");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => {
                    self.report(operation, &e);
                    return None;
                }
            }
        }
    }

    async fn tournament(&self) -> RemoteResult<BroadcastTournament> {
        if let Some(tournament) = self.session.tournament()? {
            return Ok(tournament);
        }
        let tournament = self
            .remote
            .create_tournament(&self.config.tournament_name)
            .await?;
        self.session.save_tournament(&tournament)?;
        Ok(tournament)
    }

    /// Returns the round for `local_game`, creating one for a new local game.
    async fn round_for(&self, local_game: Option<String>) -> RemoteResult<BroadcastRound> {
        let mut slot = self.round.lock().await;
        let new_game = matches!(
            (&slot.local_game, &local_game),
            (Some(previous), Some(current)) if previous != current
        );
        if let (Some(round), false) = (&slot.round, new_game) {
            let round = round.clone();
            if slot.local_game.is_none() {
                slot.local_game = local_game;
            }
            return Ok(round);
        }

        let tournament = self.tournament().await?;
        let name = format!("Game {}", chrono::Local::now().format("%Y-%m-%d %H:%M"));
        let round = self.remote.create_round(&tournament, &name).await?;
        info!(round = %round.id, local_game = ?local_game, "broadcasting to new round");

        slot.round = Some(round.clone());
        slot.local_game = local_game;
        self.broadcast.send_if_modified(|status| {
            let changed = status.round.as_ref() != Some(&round);
            status.round = Some(round.clone());
            changed
        });
        Ok(round)
    }

    /// Pushes `pgn` to the round of the board's current game.
    pub(crate) async fn push_broadcast(&self, pgn: String) {
        let local_game = self.board_game_id();
        let pushed = self
            .retry_remote("broadcast push", || {
                let local_game = local_game.clone();
                let pgn = &pgn;
                async move {
                    let round = self.round_for(local_game).await?;
                    self.remote.push_pgn(&round, pgn).await
                }
            })
            .await;
        if pushed.is_some() {
            debug!(bytes = pgn.len(), "broadcast PGN pushed");
        }
    }

    /// Sends `state` to the board. A failure is logged and dropped.
    pub(crate) async fn force_board(&self, state: &RemoteGameState) {
        let result = match ClientToServerMessage::force_moves(state) {
            Ok(message) => self.board.write_message(&message).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => debug!(game = %state.game_id, ply = state.ply(), "board forced to game state"),
            Err(e) => debug!(game = %state.game_id, error = %e, "could not forward game state"),
        }
    }

    pub(crate) fn set_broadcast_active(&self, active: bool) -> bool {
        self.broadcast.send_if_modified(|status| {
            let changed = status.active != active;
            status.active = active;
            changed
        })
    }
}

/// The synchronization engine.
///
/// Must be created inside a Tokio runtime. Dropping it stops every task it
/// started.
pub struct SyncEngine {
    shared: Arc<Shared>,
    supervisors: Vec<JoinHandle<()>>,
}

impl SyncEngine {
    /// Creates the engine and starts its reactive processes.
    pub fn new(
        config: SyncConfig,
        board: Arc<ConnectionManager>,
        remote: Arc<dyn ChessService>,
        session: Arc<SessionStore>,
    ) -> Self {
        let (broadcast_status, _) = watch::channel(BroadcastStatus::default());
        let (online, _) = watch::channel(OnlineStatus::Idle);
        let (active_game, _) = watch::channel(None);
        let (remote_state, _) = watch::channel(None);
        let (events, _) = broadcast::channel(64);

        let shared = Arc::new(Shared {
            config,
            board,
            remote,
            session,
            broadcast: broadcast_status,
            online,
            active_game,
            remote_state,
            events,
            online_task: Mutex::new(LatestTask::new()),
            tracked_game: Mutex::new(None),
            sent_move: Mutex::new(None),
            round: tokio::sync::Mutex::new(RoundSlot::default()),
        });
        let supervisors = processes::spawn_all(&shared);
        info!("sync engine started");

        Self {
            shared,
            supervisors,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    // ── Session ──────────────────────────────────────────────────

    /// Verifies and stores `token`. Returns the account's username.
    pub async fn sign_in(&self, token: &str) -> SyncResult<String> {
        Ok(self.shared.remote.sign_in(token).await?)
    }

    /// Stops all remote activity and forgets the credentials.
    pub async fn sign_out(&self) -> SyncResult<()> {
        self.stop_online_game().await;
        self.stop_broadcast();
        self.shared.remote.sign_out().await?;
        Ok(())
    }

    // ── Board commands ───────────────────────────────────────────

    pub fn set_target_device(&self, device: Option<BoardDevice>) {
        self.shared.board.set_target_device(device);
    }

    pub fn target_device(&self) -> Option<BoardDevice> {
        self.shared.board.target_device()
    }

    pub async fn write_preferences(&self, preferences: &Preferences) -> SyncResult<()> {
        let message = ClientToServerMessage::write_preferences(preferences)?;
        self.shared.board.write_message(&message).await?;
        Ok(())
    }

    /// Starts a local game on the board between two named players.
    pub async fn start_offline_game(&self, white: &str, black: &str) -> SyncResult<()> {
        let message = ClientToServerMessage::start_game(&StartGameRequest {
            white: white.to_string(),
            black: black.to_string(),
        })?;
        self.shared.board.write_message(&message).await?;
        info!(white, black, "offline game started");
        Ok(())
    }

    pub async fn test_leds(&self) -> SyncResult<()> {
        self.shared
            .board
            .write_message(&ClientToServerMessage::test_leds())
            .await?;
        Ok(())
    }

    /// Imports every game saved on the board, then asks the board to archive
    /// the imported files. Returns the number imported.
    pub async fn upload_saved_games(&self) -> SyncResult<usize> {
        // Subscribe before asking so no batch is missed.
        let mut events = self.shared.board.events();
        self.shared
            .board
            .write_message(&ClientToServerMessage::request_pgn_files())
            .await?;
        let files = collect_saved_games(&mut events, self.shared.config.saved_games_timeout).await?;
        info!(count = files.len(), "board listed saved games");

        let mut imported = Vec::new();
        let mut failure = None;
        for file in files {
            match self.shared.remote.import_game(&file.pgn).await {
                Ok(game) => {
                    debug!(file = %file.name, game = %game.id, "saved game imported");
                    imported.push(file.name);
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "saved game import failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        if !imported.is_empty() {
            let message = ClientToServerMessage::request_archive(imported.clone())?;
            self.shared.board.write_message(&message).await?;
        }
        if let Some(e) = failure {
            return Err(e.into());
        }

        self.shared.emit(SyncEvent::SavedGamesUploaded {
            imported: imported.len(),
        });
        Ok(imported.len())
    }

    // ── Broadcast ────────────────────────────────────────────────

    /// Starts publishing the board's game. Stops any online game first.
    pub async fn start_broadcast(&self) -> SyncResult<()> {
        self.stop_online_game().await;
        if self.shared.set_broadcast_active(true) {
            info!("broadcast started");
        }
        Ok(())
    }

    pub fn stop_broadcast(&self) {
        if self.shared.set_broadcast_active(false) {
            info!("broadcast stopped");
        }
    }

    // ── Online game ──────────────────────────────────────────────

    /// Starts looking for an online game. No-op unless idle.
    ///
    /// Does not stop a running broadcast.
    pub fn start_online_game(&self) {
        if self.shared.start_online_session() {
            info!("online game search started");
        } else {
            debug!("online session already running");
        }
    }

    /// Cancels the online session in whatever phase it is in.
    pub async fn stop_online_game(&self) {
        self.shared.stop_online_session().await;
    }

    // ── Observables ──────────────────────────────────────────────

    pub fn broadcast_status(&self) -> watch::Receiver<BroadcastStatus> {
        self.shared.broadcast.subscribe()
    }

    pub fn online_status(&self) -> watch::Receiver<OnlineStatus> {
        self.shared.online.subscribe()
    }

    pub fn active_game(&self) -> watch::Receiver<Option<RemoteGame>> {
        self.shared.active_game.subscribe()
    }

    pub fn remote_game_state(&self) -> watch::Receiver<Option<RemoteGameState>> {
        self.shared.remote_state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.board.connection_state()
    }

    pub fn board_state(&self) -> watch::Receiver<BoardState> {
        self.shared.board.board_state()
    }

    pub fn game_info(&self) -> watch::Receiver<Option<GameInfo>> {
        self.shared.board.game_info()
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        for task in &self.supervisors {
            task.abort();
        }
        self.shared.online_task().cancel();
    }
}

async fn collect_saved_games(
    events: &mut broadcast::Receiver<BoardEvent>,
    wait: Duration,
) -> SyncResult<Vec<PgnFile>> {
    let mut files = Vec::new();
    let collect = async {
        loop {
            match events.recv().await {
                Ok(BoardEvent::PgnFiles(batch)) => files.extend(batch),
                Ok(BoardEvent::PgnFilesDone) => return Ok(()),
                Ok(BoardEvent::DeviceError(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed board events while collecting saved games");
                }
                Err(RecvError::Closed) => return Err(SyncError::ChannelClosed),
            }
        }
    };
    match tokio::time::timeout(wait, collect).await {
        Ok(result) => result?,
        Err(_) => warn!("board did not finish listing saved games"),
    }
    Ok(files)
}
