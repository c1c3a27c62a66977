//! Remote session client for chesslink.
//!
//! Wraps the chess server's broadcast and board APIs:
//! - **Client**: authenticated calls with classified failures
//! - **Rate limit**: sliding request budget plus 429 cool-down
//! - **Stream**: line-delimited game and event streams
//! - **Session**: durable tournament and credential storage
//!
//! The sync engine talks to the server only through [`ChessService`].

pub mod client;
mod error;
pub mod rate_limit;
pub mod service;
pub mod session;
pub mod stream;

pub use client::{Account, RemoteClient, RemoteConfig};
pub use error::{RemoteError, RemoteResult};
pub use rate_limit::RateLimiter;
pub use service::{ChessService, GameStateStream};
pub use session::{Credentials, SessionStore};
pub use stream::{GameStreamDecoder, NdjsonLines, STANDARD_START_FEN, SUPPORTED_SPEEDS};
