//! Device connectivity state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connectivity of the physical board, as seen by the connection manager.
///
/// Exactly one value is current at any time. Only the connection manager
/// writes it; everyone else observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    /// The host has no usable Bluetooth hardware.
    NoDeviceSupport,
    /// The adapter is switched off.
    Disabled,
    /// The adapter is being switched on.
    TurningOn,
    /// No connection and none in progress.
    #[default]
    Disconnected,
    /// Scanning for a board failed; needs the user to retry.
    ScanFailed,
    /// Pairing or connecting failed in a way that needs the user to retry.
    ConnectFailed,
    /// Looking for nearby boards.
    Scanning,
    /// Waiting for the user to pick a board.
    AwaitingUserInput,
    /// Companion pairing in progress.
    Pairing,
    /// Socket connect in progress.
    Connecting,
    /// Frames are flowing.
    Connected,
}

impl ConnectionState {
    /// Returns whether a live connection exists.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns whether this state only changes after user or adapter action.
    ///
    /// The reconnect loop never settles in one of these for plain I/O failures.
    pub fn needs_intervention(&self) -> bool {
        matches!(
            self,
            Self::NoDeviceSupport | Self::Disabled | Self::ScanFailed | Self::ConnectFailed
        )
    }

    /// Returns whether this state belongs to the adapter/pairing layer rather
    /// than to the reconnect loop.
    pub fn is_adapter_state(&self) -> bool {
        !matches!(self, Self::Connecting | Self::Connected | Self::Disconnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoDeviceSupport => "no device support",
            Self::Disabled => "disabled",
            Self::TurningOn => "turning on",
            Self::Disconnected => "disconnected",
            Self::ScanFailed => "scan failed",
            Self::ConnectFailed => "connect failed",
            Self::Scanning => "scanning",
            Self::AwaitingUserInput => "awaiting user input",
            Self::Pairing => "pairing",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(s)
    }
}
