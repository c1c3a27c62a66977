//! The engine's long-lived reactive processes.

use crate::engine::Shared;
use crate::slot::LatestTask;
use crate::state::{OnlineStatus, SyncEvent};
use chesslink_board::BoardEvent;
use chesslink_types::BoardState;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub(crate) fn spawn_all(shared: &Arc<Shared>) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(board_to_broadcast(Arc::clone(shared))),
        tokio::spawn(board_to_online(Arc::clone(shared))),
        tokio::spawn(online_to_board(Arc::clone(shared))),
        tokio::spawn(reconnect_to_board(Arc::clone(shared))),
        tokio::spawn(local_game_watch(Arc::clone(shared))),
        tokio::spawn(forward_device_errors(Arc::clone(shared))),
    ]
}

/// (a) Pushes the board PGN to the broadcast round while broadcasting.
async fn board_to_broadcast(shared: Arc<Shared>) {
    let mut board = shared.board.board_state();
    let mut status = shared.broadcast.subscribe();
    let mut slot = LatestTask::new();
    let mut last: Option<(Option<String>, bool)> = None;

    loop {
        let pgn = board.borrow_and_update().pgn.clone();
        let active = status.borrow_and_update().active;
        let key = (pgn.clone(), active);

        // Round updates also wake us; only (pgn, active) matters.
        if last.as_ref() != Some(&key) {
            last = Some(key);
            match (active, pgn) {
                (true, Some(pgn)) => {
                    let task_shared = Arc::clone(&shared);
                    slot.spawn(async move { task_shared.push_broadcast(pgn).await });
                }
                (_, None) | (false, _) => slot.cancel(),
            }
        }

        tokio::select! {
            changed = board.changed() => if changed.is_err() { break },
            changed = status.changed() => if changed.is_err() { break },
        }
    }
}

/// (b) Pushes board moves flagged "should send" to the active online game.
async fn board_to_online(shared: Arc<Shared>) {
    let mut board = shared.board.board_state();
    let mut slot = LatestTask::new();
    loop {
        let state = board.borrow_and_update().clone();
        dispatch_move(&shared, state, &mut slot);
        if board.changed().await.is_err() {
            break;
        }
    }
}

fn dispatch_move(shared: &Arc<Shared>, state: BoardState, slot: &mut LatestTask) {
    let Some(uci) = state.move_to_send().map(str::to_string) else {
        if !state.should_send_move {
            *shared.sent_move() = None;
        }
        return;
    };
    let Some(game) = shared.active_game.borrow().clone() else {
        return;
    };

    {
        let mut sent = shared.sent_move();
        if sent.as_ref() == Some(&state) {
            debug!(uci, "move already sent");
            return;
        }
        *sent = Some(state.clone());
    }

    let task_shared = Arc::clone(shared);
    slot.spawn(async move {
        let pushed = task_shared
            .retry_remote("move push", || task_shared.remote.push_move(&game, &uci))
            .await;
        if pushed.is_none() {
            // Let a later identical snapshot try again.
            let mut sent = task_shared.sent_move();
            if sent.as_ref() == Some(&state) {
                *sent = None;
            }
        }
    });
}

/// (c) Forwards every new remote game state to the board.
async fn online_to_board(shared: Arc<Shared>) {
    let mut remote = shared.remote_state.subscribe();
    let mut slot = LatestTask::new();
    loop {
        if remote.changed().await.is_err() {
            break;
        }
        let state = remote.borrow_and_update().clone();
        if let Some(state) = state {
            let task_shared = Arc::clone(&shared);
            slot.spawn(async move { task_shared.force_board(&state).await });
        }
    }
}

/// (d) Re-pushes the latest remote game state when the board reconnects.
async fn reconnect_to_board(shared: Arc<Shared>) {
    let mut connection = shared.board.connection_state();
    let mut slot = LatestTask::new();
    let mut was_connected = connection.borrow_and_update().is_connected();
    loop {
        if connection.changed().await.is_err() {
            break;
        }
        let connected = connection.borrow_and_update().is_connected();
        if connected && !was_connected {
            let state = shared.remote_state.borrow().clone();
            if let Some(state) = state {
                info!(game = %state.game_id, "board reconnected, restoring game state");
                let task_shared = Arc::clone(&shared);
                slot.spawn(async move { task_shared.force_board(&state).await });
            }
        }
        was_connected = connected;
    }
}

/// (e) Cancels the online session when the board starts a different game.
async fn local_game_watch(shared: Arc<Shared>) {
    let mut games = shared.board.game_info();
    loop {
        if games.changed().await.is_err() {
            break;
        }
        let current = games.borrow_and_update().as_ref().map(|g| g.game_id.clone());
        let Some(current) = current else {
            continue;
        };
        if local_game_superseded(&shared, &current) {
            info!(local_game = %current, "new game on the board, leaving online game");
            shared.stop_online_session().await;
        }
    }
}

fn local_game_superseded(shared: &Shared, current: &str) -> bool {
    if *shared.online.borrow() != OnlineStatus::Streaming {
        return false;
    }
    let mut tracked = shared.tracked_game();
    match tracked.as_deref() {
        None => {
            debug!(local_game = current, "online game adopted local game");
            *tracked = Some(current.to_string());
            false
        }
        Some(id) => id != current,
    }
}

async fn forward_device_errors(shared: Arc<Shared>) {
    let mut events = shared.board.events();
    loop {
        match events.recv().await {
            Ok(BoardEvent::DeviceError(message)) => shared.emit(SyncEvent::DeviceError(message)),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "board events lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
