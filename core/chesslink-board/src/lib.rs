//! Board link for chesslink.
//!
//! Talks to a physical chessboard over an unreliable byte stream:
//! - **Frame**: `action || length (u32 BE) || body` encoding
//! - **Protocol**: action codes and JSON payloads in both directions
//! - **Transport**: single-writer framed connection with a lazy receive stream
//! - **Model**: observable last-known board state
//! - **Connection**: target selection and the reconnect loop
//!
//! # Example
//!
//! ```no_run
//! use chesslink_board::{ConnectionConfig, ConnectionManager, TcpConnector};
//! use chesslink_types::BoardDevice;
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let manager = ConnectionManager::new(Arc::new(TcpConnector), ConnectionConfig::default());
//! manager.set_target_device(Some(BoardDevice::new("127.0.0.1:7000")));
//!
//! let mut state = manager.connection_state();
//! while !state.borrow_and_update().is_connected() {
//!     state.changed().await.unwrap();
//! }
//! # }
//! ```

pub mod connection;
mod error;
pub mod frame;
pub mod model;
pub mod protocol;
pub mod transport;

pub use connection::{ConnectionConfig, ConnectionManager};
pub use error::{BoardError, BoardResult};
pub use frame::{Frame, FrameReader, HEADER_LEN, MAX_FRAME_BODY};
pub use model::{BoardEvent, BoardModel};
pub use protocol::{
    ArchiveRequest, ClientAction, ClientToServerMessage, DeviceError, DeviceSnapshot,
    MovePayload, PgnFile, PgnFileList, Preferences, ServerAction, ServerToClientMessage,
    StartGameRequest, BOARD_SERVICE_UUID,
};
pub use transport::{BoardConnector, BoardStream, FramedTransport, TcpConnector};
