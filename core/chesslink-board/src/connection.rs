//! Connection lifecycle for a single board.
//!
//! The manager owns at most one physical connection. While a target device is
//! set it runs a reconnect loop: connect, consume frames into the board model,
//! and on any failure wait a fixed interval and try again. Replacing the target
//! aborts the loop, which drops the socket.

use crate::error::{BoardError, BoardResult};
use crate::model::{BoardEvent, BoardModel};
use crate::protocol::ClientToServerMessage;
use crate::transport::{BoardConnector, FramedTransport};
use chesslink_types::{BoardDevice, BoardState, ConnectionState, GameInfo};
use futures::StreamExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for the connection manager.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Wait between a failed or dropped connection and the next attempt.
    pub reconnect_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(2500),
        }
    }
}

/// The live link. `generation` changes every time the target changes, so a
/// loop that has been replaced can no longer publish.
#[derive(Default)]
struct Link {
    generation: u64,
    transport: Option<Arc<FramedTransport>>,
}

struct Shared {
    model: BoardModel,
    link: Mutex<Link>,
    attempts: AtomicU32,
}

impl Shared {
    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, generation: u64, state: ConnectionState) -> bool {
        let link = self.link();
        if link.generation != generation {
            return false;
        }
        self.model.set_connection_state(state);
        true
    }

    fn attach(&self, generation: u64, transport: Arc<FramedTransport>) -> bool {
        let mut link = self.link();
        if link.generation != generation {
            return false;
        }
        link.transport = Some(transport);
        self.model.set_connection_state(ConnectionState::Connected);
        true
    }

    fn detach(&self, generation: u64) {
        let mut link = self.link();
        if link.generation == generation {
            link.transport = None;
        }
    }
}

struct Target {
    device: Option<BoardDevice>,
    task: Option<JoinHandle<()>>,
}

/// Owns the board connection and the board model.
pub struct ConnectionManager {
    config: ConnectionConfig,
    connector: Arc<dyn BoardConnector>,
    shared: Arc<Shared>,
    target: Mutex<Target>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn BoardConnector>, config: ConnectionConfig) -> Self {
        Self {
            config,
            connector,
            shared: Arc::new(Shared {
                model: BoardModel::new(),
                link: Mutex::new(Link::default()),
                attempts: AtomicU32::new(0),
            }),
            target: Mutex::new(Target {
                device: None,
                task: None,
            }),
        }
    }

    fn target(&self) -> MutexGuard<'_, Target> {
        self.target.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Selects the board to stay connected to, or `None` to disconnect.
    ///
    /// Re-targeting the currently connected device is a no-op. Anything else
    /// cancels the running loop and starts a fresh one. Must be called from
    /// within a Tokio runtime.
    pub fn set_target_device(&self, device: Option<BoardDevice>) {
        let mut target = self.target();

        if let Some(dev) = &device {
            let loop_alive = target.task.as_ref().is_some_and(|t| !t.is_finished());
            if target.device.as_ref() == Some(dev)
                && loop_alive
                && self.shared.model.current_connection_state().is_connected()
            {
                debug!(device = %dev, "already connected to target board");
                return;
            }
        }

        if let Some(task) = target.task.take() {
            task.abort();
        }
        let generation = {
            let mut link = self.shared.link();
            link.generation += 1;
            link.transport = None;
            link.generation
        };
        target.device = device.clone();

        match device {
            None => {
                info!("board target cleared");
                self.shared.model.set_connection_state(ConnectionState::Disconnected);
            }
            Some(device) => {
                info!(device = %device, "board target set");
                let task = tokio::spawn(run_reconnect_loop(
                    Arc::clone(&self.shared),
                    Arc::clone(&self.connector),
                    device,
                    generation,
                    self.config.reconnect_delay,
                ));
                target.task = Some(task);
            }
        }
    }

    /// Returns the device currently targeted.
    pub fn target_device(&self) -> Option<BoardDevice> {
        self.target().device.clone()
    }

    /// Sends a message over the live connection.
    ///
    /// Fails immediately with `NotConnected` when there is none.
    pub async fn write_message(&self, message: &ClientToServerMessage) -> BoardResult<()> {
        let transport = self
            .shared
            .link()
            .transport
            .clone()
            .ok_or(BoardError::NotConnected)?;
        transport.send(message).await
    }

    /// Publishes a state from the adapter/pairing layer.
    ///
    /// Ignored while a reconnect loop owns the connection state.
    pub fn report_adapter_state(&self, state: ConnectionState) {
        if !state.is_adapter_state() {
            warn!(%state, "ignoring non-adapter state report");
            return;
        }
        let target = self.target();
        if target.task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!(%state, "reconnect loop active, ignoring adapter state");
            return;
        }
        self.shared.model.set_connection_state(state);
    }

    /// Number of transport-level connect attempts made so far.
    pub fn connect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Stops retrying and closes any live connection.
    pub fn shutdown(&self) {
        self.set_target_device(None);
    }

    // ── Observables ──────────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.model.connection_state()
    }

    pub fn game_info(&self) -> watch::Receiver<Option<GameInfo>> {
        self.shared.model.game_info()
    }

    pub fn board_state(&self) -> watch::Receiver<BoardState> {
        self.shared.model.board_state()
    }

    pub fn events(&self) -> broadcast::Receiver<BoardEvent> {
        self.shared.model.events()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.target().task.take() {
            task.abort();
        }
    }
}

async fn run_reconnect_loop(
    shared: Arc<Shared>,
    connector: Arc<dyn BoardConnector>,
    device: BoardDevice,
    generation: u64,
    delay: Duration,
) {
    loop {
        let attempt = shared.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if !shared.publish(generation, ConnectionState::Connecting) {
            return;
        }
        info!(device = %device, attempt, "connecting to board");

        match connector.connect(&device).await {
            Ok(stream) => {
                let transport = Arc::new(FramedTransport::new(stream));
                match transport.receive() {
                    Ok(mut incoming) => {
                        if !shared.attach(generation, Arc::clone(&transport)) {
                            return;
                        }
                        info!(device = %device, "board connected");

                        let result: BoardResult<()> = async {
                            while let Some(message) = incoming.next().await {
                                let message = message?;
                                if let Err(e) = shared.model.apply(&message) {
                                    warn!(action = ?message.action, error = %e, "dropping malformed board payload");
                                }
                            }
                            Ok(())
                        }
                        .await;

                        shared.detach(generation);
                        transport.close().await;
                        match result {
                            Ok(()) => info!(device = %device, "board closed the connection"),
                            Err(e) => warn!(device = %device, error = %e, "board connection lost"),
                        }
                    }
                    Err(e) => warn!(error = %e, "transport rejected receive"),
                }
            }
            Err(e) => {
                warn!(device = %device, error = %e, "board connect failed");
            }
        }

        if !shared.publish(generation, ConnectionState::Disconnected) {
            return;
        }
        tokio::time::sleep(delay).await;
    }
}
