//! Realtime incident updates over WebSocket
//!
//! Keeps one subscription to the Argus realtime endpoint alive, delivers
//! incident changes to application callbacks, and reconnects with
//! exponential backoff until a retry ceiling is reached.

mod callbacks;
mod events;
mod manager;
mod retry;
mod service;
mod state;
mod timer;
mod transport;
mod websocket;

pub use callbacks::{ConfigPatch, IncidentCallback, IncidentsCallback, RealtimeConfig, StateObserver};
pub use events::{ClientMessage, IncidentEvent, MessageError, MessageType, ServerMessage};
pub use manager::{ManagerId, RealtimeConnectionManager};
pub use retry::{RetryState, BACKOFF_FACTOR};
pub use service::RealtimeService;
pub use state::{ManagerState, Trigger};
pub use timer::TokioScheduler;
pub use transport::{
    ConnectionHandle, ConnectionId, RetryScheduler, TimerId, Transport, TransportEvent,
};
pub use websocket::{TransportSink, WsHandle, WsTransport};
