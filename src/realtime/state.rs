//! Connection state machine

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RealtimeError, Result};

/// State of a realtime connection manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    /// No connection, nothing in flight (a retry may be pending)
    #[default]
    Closed,
    /// Handshake in progress
    Connecting,
    /// Transport is open, subscription not yet acknowledged
    Opened,
    /// Server has answered; incident events are flowing
    Connected,
    /// `disconnect()` was called, waiting for the close to land
    Disconnecting,
    /// Retry ceiling exceeded; terminal until the caller intervenes
    Failed,
}

impl ManagerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagerState::Closed => "closed",
            ManagerState::Connecting => "connecting",
            ManagerState::Opened => "opened",
            ManagerState::Connected => "connected",
            ManagerState::Disconnecting => "disconnecting",
            ManagerState::Failed => "failed",
        }
    }

    /// Whether a transport connection is (being) established
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ManagerState::Connecting | ManagerState::Opened | ManagerState::Connected
        )
    }

    /// Apply a trigger, returning the next state.
    ///
    /// Every state change of the manager goes through this function.
    pub fn next(self, trigger: Trigger) -> Result<ManagerState> {
        use ManagerState::*;
        use Trigger::*;

        let next = match (self, trigger) {
            (Closed, ConnectStarted) => Connecting,
            (Closed, RetriesExhausted) => Failed,
            (_, DisconnectRequested) => Disconnecting,
            (_, HealthCheckReset) => Closed,
            (Connecting, SocketOpened) => Opened,
            (Opened | Connected, MessageReceived) => Connected,
            (Connecting | Opened | Connected | Closed | Disconnecting, SocketClosed) => Closed,
            (Connecting | Opened | Connected | Closed, SocketErrored) => Closed,
            (Disconnecting, SocketErrored) => Disconnecting,
            (from, trigger) => return Err(RealtimeError::InvalidTransition { from, trigger }),
        };

        Ok(next)
    }
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs that move the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// A new connection attempt was started
    ConnectStarted,
    /// A connect was requested after the retry ceiling was exceeded
    RetriesExhausted,
    /// The caller asked for a deliberate shutdown
    DisconnectRequested,
    /// Keep-alive probe found no usable connection
    HealthCheckReset,
    SocketOpened,
    MessageReceived,
    SocketClosed,
    SocketErrored,
}
