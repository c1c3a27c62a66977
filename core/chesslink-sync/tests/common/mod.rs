//! Shared test helpers for sync engine tests: an in-memory chess service and
//! a scripted board on the far end of a duplex pipe.

#![allow(dead_code)]

use async_trait::async_trait;
use chesslink_board::frame::write_frame;
use chesslink_board::{
    BoardConnector, BoardStream, ClientToServerMessage, ConnectionConfig, ConnectionManager,
    DeviceSnapshot, FrameReader, MovePayload, ServerAction, ServerToClientMessage,
};
use chesslink_remote::{ChessService, GameStateStream, RemoteError, RemoteResult, SessionStore};
use chesslink_sync::{OnlineStatus, SyncConfig, SyncEngine, SyncEvent};
use chesslink_types::{
    BoardDevice, BroadcastRound, BroadcastTournament, Color, ConnectionState, RemoteGame,
    RemoteGameState,
};
use futures::StreamExt;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::{broadcast, watch};

// ── Chess service ───────────────────────────────────────────────

/// One scripted game stream: items are yielded in order, then the stream
/// either ends or stays open forever.
pub struct StreamScript {
    pub items: Vec<RemoteResult<RemoteGameState>>,
    pub then_pending: bool,
}

/// In-memory `ChessService` that records every call.
#[derive(Default)]
pub struct MockService {
    pub tournaments_created: AtomicUsize,
    pub rounds_created: AtomicUsize,
    pub pgn_attempts: AtomicUsize,
    /// `(round id, pgn)` of every successful push.
    pub pushed_pgns: Mutex<Vec<(String, String)>>,
    pub move_attempts: Mutex<Vec<String>>,
    /// `(game id, uci)` of every completed move push.
    pub pushed_moves: Mutex<Vec<(String, String)>>,
    pub imported: Mutex<Vec<String>>,
    pub game_start_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,

    pub pgn_failures: Mutex<VecDeque<RemoteError>>,
    pub move_failures: Mutex<VecDeque<RemoteError>>,
    pub game_starts: Mutex<VecDeque<RemoteResult<Option<RemoteGame>>>>,
    pub streams: Mutex<VecDeque<StreamScript>>,
    /// Simulated latency of a move push.
    pub move_latency: Mutex<Duration>,
}

impl MockService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_game_start(&self, result: RemoteResult<Option<RemoteGame>>) {
        self.game_starts.lock().unwrap().push_back(result);
    }

    pub fn push_stream(&self, items: Vec<RemoteResult<RemoteGameState>>, then_pending: bool) {
        self.streams
            .lock()
            .unwrap()
            .push_back(StreamScript {
                items,
                then_pending,
            });
    }

    pub fn pushed_pgns(&self) -> Vec<(String, String)> {
        self.pushed_pgns.lock().unwrap().clone()
    }

    pub fn pushed_moves(&self) -> Vec<(String, String)> {
        self.pushed_moves.lock().unwrap().clone()
    }

    pub fn move_attempts(&self) -> Vec<String> {
        self.move_attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChessService for MockService {
    async fn sign_in(&self, _token: &str) -> RemoteResult<String> {
        Ok("alice".into())
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        Ok(())
    }

    async fn create_tournament(&self, _name: &str) -> RemoteResult<BroadcastTournament> {
        let n = self.tournaments_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BroadcastTournament {
            id: format!("t{n}"),
            url: format!("https://example.org/t{n}"),
        })
    }

    async fn create_round(
        &self,
        tournament: &BroadcastTournament,
        _name: &str,
    ) -> RemoteResult<BroadcastRound> {
        let n = self.rounds_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BroadcastRound {
            id: format!("r{n}"),
            url: format!("{}/r{n}", tournament.url),
        })
    }

    async fn push_pgn(&self, round: &BroadcastRound, pgn: &str) -> RemoteResult<()> {
        self.pgn_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.pgn_failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        self.pushed_pgns
            .lock()
            .unwrap()
            .push((round.id.clone(), pgn.to_string()));
        Ok(())
    }

    async fn push_move(&self, game: &RemoteGame, uci: &str) -> RemoteResult<()> {
        self.move_attempts.lock().unwrap().push(uci.to_string());
        let latency = *self.move_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(e) = self.move_failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        self.pushed_moves
            .lock()
            .unwrap()
            .push((game.id.clone(), uci.to_string()));
        Ok(())
    }

    async fn await_game_start(&self) -> RemoteResult<Option<RemoteGame>> {
        self.game_start_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.game_starts.lock().unwrap().pop_front();
        next.unwrap_or(Ok(None))
    }

    async fn game_state_stream(&self, _game: &RemoteGame) -> RemoteResult<GameStateStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.streams.lock().unwrap().pop_front();
        let Some(script) = script else {
            return Ok(futures::stream::pending().boxed());
        };
        let items = futures::stream::iter(script.items);
        if script.then_pending {
            Ok(items.chain(futures::stream::pending()).boxed())
        } else {
            Ok(items.boxed())
        }
    }

    async fn import_game(&self, pgn: &str) -> RemoteResult<RemoteGame> {
        let mut imported = self.imported.lock().unwrap();
        imported.push(pgn.to_string());
        let n = imported.len();
        Ok(RemoteGame {
            id: format!("imp{n}"),
            url: format!("https://example.org/imp{n}"),
        })
    }
}

pub fn remote_game(id: &str) -> RemoteGame {
    RemoteGame {
        id: id.into(),
        url: format!("https://example.org/{id}"),
    }
}

pub fn game_state(id: &str, moves: &str) -> RemoteGameState {
    RemoteGameState {
        game_id: id.into(),
        client_color: Color::White,
        moves: moves.into(),
        winner: None,
    }
}

// ── Board ───────────────────────────────────────────────────────

/// Hands out queued pipes, one per connect.
#[derive(Default)]
pub struct PipeConnector {
    pipes: Mutex<VecDeque<DuplexStream>>,
}

impl PipeConnector {
    /// Queues a pipe and returns the board end.
    pub fn add_board(&self) -> FakeBoard {
        let (app, board) = tokio::io::duplex(64 * 1024);
        self.pipes.lock().unwrap().push_back(app);
        FakeBoard::new(board)
    }
}

#[async_trait]
impl BoardConnector for PipeConnector {
    async fn connect(&self, _device: &BoardDevice) -> io::Result<Box<dyn BoardStream>> {
        match self.pipes.lock().unwrap().pop_front() {
            Some(pipe) => Ok(Box::new(pipe)),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no board in range")),
        }
    }
}

/// The board end of a pipe.
pub struct FakeBoard {
    reader: FrameReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeBoard {
    fn new(stream: DuplexStream) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: FrameReader::new(read),
            writer: write,
        }
    }

    pub async fn send(&mut self, message: &ServerToClientMessage) {
        write_frame(&mut self.writer, &message.to_frame())
            .await
            .unwrap();
    }

    pub async fn snapshot(&mut self, game_id: Option<&str>, pgn: &str) {
        let msg = ServerToClientMessage::json(
            ServerAction::StateChanged,
            &DeviceSnapshot {
                game_id: game_id.map(str::to_string),
                pgn: Some(pgn.to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        self.send(&msg).await;
    }

    pub async fn play(&mut self, uci: &str, should_send: bool) {
        let msg = ServerToClientMessage::json(
            ServerAction::OnMove,
            &MovePayload {
                uci: uci.to_string(),
                pgn: Some(format!("pgn after {uci}")),
                should_send,
            },
        )
        .unwrap();
        self.send(&msg).await;
    }

    /// Reads the next message the app sent to the board.
    pub async fn recv(&mut self) -> ClientToServerMessage {
        let frame = tokio::time::timeout(Duration::from_secs(60), self.reader.next_frame())
            .await
            .expect("board received nothing")
            .unwrap()
            .expect("pipe closed");
        ClientToServerMessage::from_frame(frame).unwrap()
    }
}

/// Waits for the next engine event.
pub async fn next_event(rx: &mut broadcast::Receiver<SyncEvent>) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("no event")
        .unwrap()
}

// ── Engine harness ──────────────────────────────────────────────

pub struct Harness {
    pub engine: SyncEngine,
    pub service: Arc<MockService>,
    pub connector: Arc<PipeConnector>,
    pub session: Arc<SessionStore>,
    pub board: FakeBoard,
}

/// Builds an engine over `service` with a connected fake board.
pub async fn harness(service: Arc<MockService>) -> Harness {
    let connector = Arc::new(PipeConnector::default());
    let board = connector.add_board();
    let manager = Arc::new(ConnectionManager::new(
        Arc::clone(&connector) as Arc<dyn BoardConnector>,
        ConnectionConfig::default(),
    ));
    let session = Arc::new(SessionStore::open_in_memory().unwrap());
    let engine = SyncEngine::new(
        SyncConfig::default(),
        manager,
        Arc::clone(&service) as Arc<dyn ChessService>,
        Arc::clone(&session),
    );

    let mut state = engine.connection_state();
    engine.set_target_device(Some(BoardDevice::new("board-1")));
    wait_until(&mut state, |s| *s == ConnectionState::Connected).await;

    Harness {
        engine,
        service,
        connector,
        session,
        board,
    }
}

/// Waits for a watched value to satisfy `pred`.
pub async fn wait_until<T, F>(rx: &mut watch::Receiver<T>, mut pred: F)
where
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(Duration::from_secs(120), async {
        while !pred(&rx.borrow_and_update()) {
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("condition not reached");
}

/// Polls `check` until it returns true.
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(120), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached");
}

/// Lets spawned tasks run without advancing the clock much.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Queues `game` with a stream that stays open after `states`, starts the
/// online session and waits until it streams.
pub async fn stream_game(h: &Harness, game: &RemoteGame, states: Vec<RemoteGameState>) {
    h.service.push_game_start(Ok(Some(game.clone())));
    h.service
        .push_stream(states.into_iter().map(Ok).collect(), true);
    let mut status = h.engine.online_status();
    h.engine.start_online_game();
    wait_until(&mut status, |s| *s == OnlineStatus::Streaming).await;
}
