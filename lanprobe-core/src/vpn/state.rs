//! VPN connection state as reported by the client
//!
//! Defines the state machine the connection controller drives and the
//! mapping from the client's `connectionstate` strings onto it.

use serde::{Deserialize, Serialize};

/// VPN connection states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,

    /// Attempting to establish connection
    Connecting,

    /// Successfully connected
    Connected,

    /// Disconnecting
    Disconnecting,

    /// Tunnel lost while connected, client is trying to recover
    Interrupted,

    /// Client is re-establishing an existing connection
    Reconnecting,

    /// The client reported something we do not recognise
    Error(String),
}

impl ConnectionState {
    /// Parse the output of `get connectionstate`
    ///
    /// Unknown text is kept verbatim in `Error` so it shows up in timeouts.
    pub fn from_client(raw: &str) -> Self {
        match raw.trim() {
            "Disconnected" => Self::Disconnected,
            "Connecting" | "StillConnecting" => Self::Connecting,
            "Connected" => Self::Connected,
            "Disconnecting" => Self::Disconnecting,
            "Interrupted" => Self::Interrupted,
            "Reconnecting" | "StillReconnecting" | "DisconnectingToReconnect" => Self::Reconnecting,
            other => Self::Error(other.to_string()),
        }
    }

    /// Whether the client has settled (no transition in progress)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Connected | Self::Disconnected)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnecting => write!(f, "disconnecting"),
            ConnectionState::Interrupted => write!(f, "interrupted"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
            ConnectionState::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}
