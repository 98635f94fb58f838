//! Error types for the Argus realtime client

use thiserror::Error;

use crate::realtime::{ManagerState, Trigger};

/// Result type alias for realtime client operations
pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Main error type for the realtime client
#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid transition: {trigger:?} is not allowed in state {from}")]
    InvalidTransition { from: ManagerState, trigger: Trigger },

    #[error("Realtime service has stopped")]
    ServiceStopped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RealtimeError {
    /// Check if error is recovered by the reconnect loop
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RealtimeError::WebSocket(_) | RealtimeError::Transport(_) | RealtimeError::Io(_)
        )
    }
}
