//! Connection lifecycle state

use serde::{Deserialize, Serialize};

/// Connection state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No socket and nothing scheduled
    #[default]
    Disconnected,
    /// Socket requested, waiting for the open event
    Connecting,
    /// Socket open, heartbeat running
    Open,
    /// Socket dropped, reconnect timer armed
    ReconnectPending,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Whether the manager will (re)establish a socket without being asked
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::ReconnectPending => "reconnect_pending",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
