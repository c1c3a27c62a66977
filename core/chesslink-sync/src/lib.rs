//! Board/remote synchronization engine for chesslink.
//!
//! Reconciles the physical board with a remote broadcast or online game:
//! board moves go to the server, server game states go back to the board,
//! and transient failures are retried while everything else is surfaced
//! once as a [`SyncEvent`].
//!
//! # Example
//!
//! ```no_run
//! use chesslink_board::{ConnectionConfig, ConnectionManager, TcpConnector};
//! use chesslink_remote::{RemoteClient, RemoteConfig, SessionStore};
//! use chesslink_sync::{SyncConfig, SyncEngine};
//! use chesslink_types::BoardDevice;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Arc::new(SessionStore::open("chesslink.db")?);
//! let remote = Arc::new(RemoteClient::new(RemoteConfig::default(), Arc::clone(&session))?);
//! let board = Arc::new(ConnectionManager::new(
//!     Arc::new(TcpConnector),
//!     ConnectionConfig::default(),
//! ));
//!
//! let engine = SyncEngine::new(SyncConfig::default(), board, remote, session);
//! engine.set_target_device(Some(BoardDevice::new("127.0.0.1:7000")));
//! engine.start_broadcast().await?;
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod online;
mod processes;
pub mod slot;
pub mod state;

pub use engine::{SyncConfig, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use slot::LatestTask;
pub use state::{BroadcastStatus, OnlineStatus, SyncEvent};
