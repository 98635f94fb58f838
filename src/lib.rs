//! Argus realtime - live incident feed client
//!
//! Subscribes to the Argus backend's realtime WebSocket endpoint and keeps
//! the subscription alive across network failures, delivering incident
//! changes to application callbacks in the order the server sends them.

pub mod config;
pub mod error;
pub mod realtime;
pub mod types;

pub use config::RealtimeSettings;
pub use error::{RealtimeError, Result};
pub use realtime::{IncidentEvent, ManagerState, RealtimeConfig, RealtimeService};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
