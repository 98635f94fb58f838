//! Realtime connection manager
//!
//! Owns at most one connection to the realtime endpoint, subscribes to the
//! incident feed once the socket opens, forwards incident events to the
//! configured callbacks in arrival order, and reconnects with exponential
//! backoff after an unexpected close until the retry ceiling is passed.
//!
//! The manager is synchronous and single-owner: callers must deliver
//! commands, transport events and timer fires one at a time.

use std::fmt;

use tracing::{debug, error, info, warn};
use url::Url;

use super::callbacks::{ConfigPatch, RealtimeConfig, StateObserver};
use super::events::{ClientMessage, IncidentEvent, MessageError, MessageType, ServerMessage};
use super::retry::RetryState;
use super::state::{ManagerState, Trigger};
use super::transport::{
    ConnectionHandle, ConnectionId, RetryScheduler, TimerId, Transport, TransportEvent,
};
use crate::config::RealtimeSettings;
use crate::error::Result;

/// Identifier of a manager instance, used in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManagerId(pub u64);

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rts-{}", self.0)
    }
}

pub struct RealtimeConnectionManager<T: Transport, S: RetryScheduler> {
    id: ManagerId,
    endpoint: Url,
    max_retries: u32,
    transport: T,
    scheduler: S,
    config: RealtimeConfig,
    observer: Option<StateObserver>,
    state: ManagerState,
    retry: RetryState,
    handle: Option<T::Handle>,
    /// Connection whose events are still accepted. Outlives `handle` after a
    /// deliberate disconnect so the final close can be recognised.
    connection: Option<ConnectionId>,
    snapshot_received: bool,
    pending_timer: Option<TimerId>,
    next_connection: u64,
    next_timer: u64,
}

impl<T: Transport, S: RetryScheduler> RealtimeConnectionManager<T, S> {
    pub fn new(
        id: ManagerId,
        settings: &RealtimeSettings,
        config: RealtimeConfig,
        transport: T,
        scheduler: S,
    ) -> Result<Self> {
        Ok(Self {
            id,
            endpoint: settings.endpoint()?,
            max_retries: settings.max_retries,
            transport,
            scheduler,
            config,
            observer: None,
            state: ManagerState::Closed,
            retry: RetryState::new(settings.initial_retry_interval),
            handle: None,
            connection: None,
            snapshot_received: false,
            pending_timer: None,
            next_connection: 0,
            next_timer: 0,
        })
    }

    pub fn id(&self) -> ManagerId {
        self.id
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn retry(&self) -> &RetryState {
        &self.retry
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Whether a connection handle is currently held
    pub fn has_connection(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether a reconnect timer is armed
    pub fn has_pending_retry(&self) -> bool {
        self.pending_timer.is_some()
    }

    pub fn set_config(&mut self, patch: ConfigPatch) {
        self.config.merge(patch);
    }

    pub fn set_state_observer(&mut self, observer: StateObserver) {
        self.observer = Some(observer);
    }

    pub fn clear_state_observer(&mut self) {
        self.observer = None;
    }

    /// Start a connection attempt.
    ///
    /// Only legal while `closed` with no handle; otherwise logged and ignored.
    pub fn connect(&mut self) {
        if self.state == ManagerState::Failed {
            warn!(
                manager = %self.id,
                "connect() called on a failed manager, ignoring; call disconnect() first"
            );
            return;
        }
        if self.state != ManagerState::Closed || self.handle.is_some() {
            warn!(
                manager = %self.id,
                state = %self.state,
                "connect() called while a connection exists, ignoring"
            );
            return;
        }

        if self.retry.is_exhausted(self.max_retries) {
            error!(
                manager = %self.id,
                retries = self.retry.retries(),
                max_retries = self.max_retries,
                "Retry ceiling exceeded, giving up"
            );
            self.cancel_retry_timer();
            self.transition(Trigger::RetriesExhausted);
            return;
        }

        self.cancel_retry_timer();
        self.transition(Trigger::ConnectStarted);

        self.next_connection += 1;
        let id = ConnectionId(self.next_connection);
        self.connection = Some(id);
        self.snapshot_received = false;

        info!(manager = %self.id, connection = %id, endpoint = %self.endpoint, "Connecting");
        match self.transport.open(&self.endpoint, id) {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => {
                error!(manager = %self.id, connection = %id, "Failed to open connection: {}", e);
                self.on_close(id, None, e.to_string());
            }
        }
    }

    /// Deliberately shut down. Legal from any state.
    pub fn disconnect(&mut self) {
        info!(manager = %self.id, state = %self.state, "Disconnecting");
        self.cancel_retry_timer();
        self.retry.reset();
        self.transition(Trigger::DisconnectRequested);

        match self.handle.take() {
            Some(mut handle) => handle.close(),
            None => {
                // Nothing will report a close; finish now.
                self.connection = None;
                self.transition(Trigger::SocketClosed);
            }
        }
    }

    /// Keep-alive probe: reconnect if there is no usable connection
    pub fn check_connection(&mut self) {
        debug!(manager = %self.id, state = %self.state, "Checking connection");
        if self.state == ManagerState::Failed {
            debug!(manager = %self.id, "Manager has failed, not reconnecting");
            return;
        }

        let alive = self.handle.as_ref().is_some_and(|h| !h.is_closed());
        if alive {
            return;
        }

        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
        self.connection = None;
        self.transition(Trigger::HealthCheckReset);
        self.connect();
    }

    /// Feed an event reported by the transport
    pub fn handle_transport_event(&mut self, connection: ConnectionId, event: TransportEvent) {
        if self.connection != Some(connection) {
            debug!(
                manager = %self.id,
                connection = %connection,
                ?event,
                "Dropping event from abandoned connection"
            );
            return;
        }

        match event {
            TransportEvent::Open => self.on_open(connection),
            TransportEvent::Message(text) => self.on_message(connection, &text),
            TransportEvent::Close { code, reason } => self.on_close(connection, code, reason),
            TransportEvent::Error(message) => self.on_error(connection, &message),
        }
    }

    /// Feed a reconnect timer fire
    pub fn handle_retry_timer(&mut self, timer: TimerId) {
        if self.pending_timer != Some(timer) {
            debug!(manager = %self.id, timer = %timer, "Ignoring cancelled retry timer");
            return;
        }

        self.cancel_retry_timer();
        debug!(manager = %self.id, retries = self.retry.retries(), "Retry timer fired");
        self.connect();
    }

    fn on_open(&mut self, connection: ConnectionId) {
        if self.state == ManagerState::Disconnecting {
            debug!(manager = %self.id, connection = %connection, "Opened after disconnect, ignoring");
            return;
        }

        info!(manager = %self.id, connection = %connection, "Realtime socket opened");
        if !self.transition(Trigger::SocketOpened) {
            return;
        }

        let subscribe = match ClientMessage::Subscribe.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(manager = %self.id, "Failed to encode subscribe request: {}", e);
                return;
            }
        };

        if let Some(handle) = self.handle.as_mut() {
            if let Err(e) = handle.send(subscribe) {
                error!(manager = %self.id, connection = %connection, "Failed to subscribe: {}", e);
            }
        }
    }

    fn on_message(&mut self, connection: ConnectionId, text: &str) {
        if !matches!(self.state, ManagerState::Opened | ManagerState::Connected) {
            debug!(
                manager = %self.id,
                connection = %connection,
                state = %self.state,
                "Dropping message outside of an open session"
            );
            return;
        }

        let parsed = ServerMessage::parse(text);

        match parsed {
            Err(ref e) if !e.is_envelope() => {
                warn!(manager = %self.id, connection = %connection, "Discarding message: {}", e);
                return;
            }
            Err(ref e @ MessageError::InvalidBody { kind: MessageType::Subscribed, .. }) => {
                // A session without a snapshot is closed and retried.
                error!(manager = %self.id, connection = %connection, "Subscription failed, closing: {}", e);
                if let Some(handle) = self.handle.as_mut() {
                    handle.close();
                }
                return;
            }
            _ => {}
        }

        if self.state == ManagerState::Opened {
            // First answer from the server; the connection is healthy.
            self.retry.reset();
            self.transition(Trigger::MessageReceived);
        }

        let message = match parsed {
            Ok(message) => message,
            Err(e) => {
                error!(manager = %self.id, connection = %connection, "Discarding message: {}", e);
                return;
            }
        };

        if matches!(message, ServerMessage::Subscribed { .. }) {
            if self.snapshot_received {
                warn!(manager = %self.id, connection = %connection, "Duplicate subscription snapshot, ignoring");
                return;
            }
            self.snapshot_received = true;
        } else if !self.snapshot_received {
            warn!(
                manager = %self.id,
                connection = %connection,
                message_type = ?message.message_type(),
                "Incident change before subscription snapshot, ignoring"
            );
            return;
        }

        debug!(
            manager = %self.id,
            connection = %connection,
            message_type = ?message.message_type(),
            "Incident message"
        );
        self.config.dispatch(IncidentEvent::from(message));
    }

    fn on_close(&mut self, connection: ConnectionId, code: Option<u16>, reason: String) {
        self.handle = None;
        self.connection = None;

        if self.state == ManagerState::Disconnecting {
            info!(manager = %self.id, connection = %connection, "Realtime socket disconnected (purposefully closed)");
            self.transition(Trigger::SocketClosed);
            return;
        }

        warn!(
            manager = %self.id,
            connection = %connection,
            code = ?code,
            reason = %reason,
            "Realtime socket was closed"
        );
        self.transition(Trigger::SocketClosed);

        self.retry.record_failure();
        if self.retry.is_exhausted(self.max_retries) {
            error!(
                manager = %self.id,
                retries = self.retry.retries(),
                max_retries = self.max_retries,
                "Retry ceiling exceeded, giving up"
            );
            self.transition(Trigger::RetriesExhausted);
            return;
        }

        let delay = self.retry.take_delay();
        self.cancel_retry_timer();
        self.next_timer += 1;
        let timer = TimerId(self.next_timer);
        self.pending_timer = Some(timer);
        self.scheduler.schedule(timer, delay);

        info!(
            manager = %self.id,
            retries = self.retry.retries(),
            delay_ms = delay.as_millis() as u64,
            "Scheduled reconnect"
        );
    }

    fn on_error(&mut self, connection: ConnectionId, message: &str) {
        error!(manager = %self.id, connection = %connection, "Realtime socket error, closing: {}", message);

        if let Some(handle) = self.handle.as_mut() {
            handle.close();
        }
        if self.state != ManagerState::Disconnecting {
            self.transition(Trigger::SocketErrored);
        }
    }

    fn cancel_retry_timer(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            self.scheduler.cancel(timer);
        }
    }

    fn transition(&mut self, trigger: Trigger) -> bool {
        let previous = self.state;
        match previous.next(trigger) {
            Ok(next) => {
                self.state = next;
                if previous != next {
                    info!(manager = %self.id, from = %previous, to = %next, "State change");
                    if let Some(observer) = self.observer.as_mut() {
                        observer(previous, next);
                    }
                }
                true
            }
            Err(e) => {
                warn!(manager = %self.id, "{}", e);
                false
            }
        }
    }
}

impl<T: Transport, S: RetryScheduler> fmt::Debug for RealtimeConnectionManager<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConnectionManager")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint.as_str())
            .field("state", &self.state)
            .field("retry", &self.retry)
            .field("connection", &self.connection)
            .field("pending_timer", &self.pending_timer)
            .finish()
    }
}
