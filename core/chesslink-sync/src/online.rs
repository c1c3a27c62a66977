//! Online-game session: `Idle → Searching → Streaming → Idle`.
//!
//! The session runs as one task in the engine's online slot. Stopping it
//! aborts the task; a drop guard resets the observables on every exit path.

use crate::engine::Shared;
use crate::state::{OnlineStatus, SyncEvent};
use chesslink_remote::RemoteResult;
use chesslink_types::{RemoteGame, RemoteGameState};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Shared {
    /// Starts a session if none is running. Returns false when already active.
    pub(crate) fn start_online_session(self: &Arc<Self>) -> bool {
        let mut task = self.online_task();
        let started = self.online.send_if_modified(|status| {
            if status.is_idle() {
                *status = OnlineStatus::Searching;
                true
            } else {
                false
            }
        });
        if started {
            task.spawn(run_session(Arc::clone(self)));
        }
        started
    }

    /// Cancels the session and waits until its cleanup has run.
    ///
    /// A cancelled game's state is dropped so a reconnecting board is not
    /// forced back into it.
    pub(crate) async fn stop_online_session(&self) {
        let running = self.online_task().take();
        if let Some(task) = running {
            task.abort();
            // Resolves once the session future, and its guard, are dropped.
            let _ = task.await;
            info!("online session stopped");
        }
        self.reset_online();
        self.remote_state.send_if_modified(|state| state.take().is_some());
    }

    fn reset_online(&self) {
        *self.tracked_game() = None;
        self.active_game.send_if_modified(|game| game.take().is_some());
        self.online.send_if_modified(|status| {
            let changed = !status.is_idle();
            *status = OnlineStatus::Idle;
            changed
        });
    }

    fn publish_remote_state(&self, state: &RemoteGameState) {
        self.remote_state.send_if_modified(|current| {
            if current.as_ref() == Some(state) {
                return false;
            }
            *current = Some(state.clone());
            true
        });
    }
}

/// Resets the session observables however the session task ends.
struct SessionGuard(Arc<Shared>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.reset_online();
    }
}

async fn run_session(shared: Arc<Shared>) {
    let _guard = SessionGuard(Arc::clone(&shared));

    let Some(game) = search(&shared).await else {
        return;
    };

    *shared.tracked_game() = shared.board_game_id();
    shared.active_game.send_replace(Some(game.clone()));
    shared.online.send_replace(OnlineStatus::Streaming);
    shared.emit(SyncEvent::GameStarted(game.clone()));
    info!(game = %game.id, url = %game.url, "online game found");

    relay(&shared, &game).await;
}

/// Waits for the server to start a game.
async fn search(shared: &Shared) -> Option<RemoteGame> {
    loop {
        match shared.remote.await_game_start().await {
            Ok(Some(game)) => return Some(game),
            Ok(None) => {
                debug!("no online game yet");
                tokio::time::sleep(shared.config.search_delay).await;
            }
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "online game search failed, retrying");
                tokio::time::sleep(shared.config.retry_delay).await;
            }
            Err(e) => {
                shared.report("online game search", &e);
                return None;
            }
        }
    }
}

/// Streams the game until it ends, re-opening the stream after I/O failures.
async fn relay(shared: &Shared, game: &RemoteGame) {
    loop {
        match stream_once(shared, game).await {
            Ok(last) => {
                let winner = last.and_then(|state| state.winner);
                info!(game = %game.id, ?winner, "online game finished");
                shared.emit(SyncEvent::GameFinished {
                    game_id: game.id.clone(),
                    winner,
                });
                return;
            }
            Err(e) if e.is_retryable() => {
                warn!(game = %game.id, error = %e, "game stream interrupted, reopening");
                tokio::time::sleep(shared.config.retry_delay).await;
            }
            Err(e) => {
                shared.report("online game stream", &e);
                return;
            }
        }
    }
}

async fn stream_once(shared: &Shared, game: &RemoteGame) -> RemoteResult<Option<RemoteGameState>> {
    let mut states = shared.remote.game_state_stream(game).await?;
    let mut last = None;
    while let Some(state) = states.next().await {
        let state = state?;
        shared.publish_remote_state(&state);
        last = Some(state);
    }
    Ok(last)
}
