//! Seams between the connection manager and the outside world
//!
//! The manager never touches sockets or clocks directly. It opens
//! connections through a [`Transport`], talks to them through a
//! [`ConnectionHandle`], and arms reconnect timers through a
//! [`RetryScheduler`]. Whatever drives the manager feeds the resulting
//! [`TransportEvent`]s and timer fires back in, one at a time.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::Result;

/// Generation number of a connection handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Generation number of a reconnect timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Something that happened on a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed
    Open,
    /// A text frame arrived
    Message(String),
    /// The connection is gone. Sent exactly once per connection, last.
    Close { code: Option<u16>, reason: String },
    /// Handshake or stream failure; a `Close` follows
    Error(String),
}

/// A live connection owned by the manager
pub trait ConnectionHandle: Send {
    /// Queue a text frame
    fn send(&mut self, text: String) -> Result<()>;

    /// Start closing; completion is reported as [`TransportEvent::Close`]
    fn close(&mut self);

    /// Whether the underlying connection is fully closed
    fn is_closed(&self) -> bool;
}

/// Opens connections to the realtime endpoint
pub trait Transport: Send {
    type Handle: ConnectionHandle;

    /// Start connecting. Events for the new connection are tagged with `id`.
    fn open(&mut self, endpoint: &Url, id: ConnectionId) -> Result<Self::Handle>;
}

/// One-shot timer facility for reconnects
pub trait RetryScheduler: Send {
    /// Arm a timer that reports `id` after `delay`
    fn schedule(&mut self, id: TimerId, delay: Duration);

    /// Disarm a timer; unknown or already fired ids are ignored
    fn cancel(&mut self, id: TimerId);
}
