//! Async realtime service
//!
//! Runs a [`RealtimeConnectionManager`] inside a tokio task. Commands from
//! [`RealtimeService`] handles, transport events and timer fires are all
//! handled by that one task, one at a time, so the manager sees a strictly
//! serialized event stream.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::callbacks::{ConfigPatch, RealtimeConfig, StateObserver};
use super::manager::{ManagerId, RealtimeConnectionManager};
use super::state::ManagerState;
use super::timer::TokioScheduler;
use super::websocket::WsTransport;
use crate::config::RealtimeSettings;
use crate::error::{RealtimeError, Result};

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(0);

/// Commands for the service task
enum Command {
    Connect,
    Disconnect,
    CheckConnection,
    SetConfig(ConfigPatch),
    SetObserver(StateObserver),
    ClearObserver,
    /// Disconnect and stop the task
    Shutdown,
}

/// Handle to a running realtime service
#[derive(Clone)]
pub struct RealtimeService {
    id: ManagerId,
    sender: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ManagerState>,
}

impl RealtimeService {
    /// Start the service task. The manager starts `closed`; call
    /// [`connect`](Self::connect) to open the feed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(settings: RealtimeSettings, config: RealtimeConfig) -> Result<Self> {
        let id = ManagerId(NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed));

        let (sender, mut commands) = mpsc::unbounded_channel::<Command>();
        let (transport_tx, mut transport_events) = mpsc::unbounded_channel();
        let (timer_tx, mut timer_fires) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ManagerState::Closed);

        let transport = WsTransport::new(transport_tx, settings.auth_token.clone());
        let scheduler = TokioScheduler::new(timer_tx);
        let mut manager =
            RealtimeConnectionManager::new(id, &settings, config, transport, scheduler)?;

        let mut health_check = settings.health_check_interval.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        tokio::spawn(async move {
            tracing::info!(manager = %id, endpoint = %manager.endpoint(), "Realtime service started");

            loop {
                tokio::select! {
                    command = commands.recv() => match command {
                        Some(Command::Connect) => manager.connect(),
                        Some(Command::Disconnect) => manager.disconnect(),
                        Some(Command::CheckConnection) => manager.check_connection(),
                        Some(Command::SetConfig(patch)) => manager.set_config(patch),
                        Some(Command::SetObserver(observer)) => manager.set_state_observer(observer),
                        Some(Command::ClearObserver) => manager.clear_state_observer(),
                        Some(Command::Shutdown) | None => {
                            manager.disconnect();
                            state_tx.send_replace(manager.state());
                            break;
                        }
                    },
                    Some((connection, event)) = transport_events.recv() => {
                        manager.handle_transport_event(connection, event);
                    }
                    Some(timer) = timer_fires.recv() => {
                        manager.handle_retry_timer(timer);
                    }
                    _ = next_tick(&mut health_check) => {
                        manager.check_connection();
                    }
                }

                state_tx.send_if_modified(|current| {
                    let next = manager.state();
                    if *current == next {
                        false
                    } else {
                        *current = next;
                        true
                    }
                });
            }

            tracing::info!(manager = %id, "Realtime service stopped");
        });

        Ok(Self { id, sender, state })
    }

    pub fn id(&self) -> ManagerId {
        self.id
    }

    /// Latest known state
    pub fn state(&self) -> ManagerState {
        *self.state.borrow()
    }

    /// Receiver that is notified whenever the state changes
    pub fn watch_state(&self) -> watch::Receiver<ManagerState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`
    pub async fn wait_for_state<F>(&self, predicate: F) -> Result<ManagerState>
    where
        F: FnMut(&ManagerState) -> bool,
    {
        let mut receiver = self.state.clone();
        let state = receiver
            .wait_for(predicate)
            .await
            .map_err(|_| RealtimeError::ServiceStopped)?;
        Ok(*state)
    }

    pub fn connect(&self) -> Result<()> {
        self.send(Command::Connect)
    }

    pub fn disconnect(&self) -> Result<()> {
        self.send(Command::Disconnect)
    }

    pub fn check_connection(&self) -> Result<()> {
        self.send(Command::CheckConnection)
    }

    pub fn set_config(&self, patch: ConfigPatch) -> Result<()> {
        self.send(Command::SetConfig(patch))
    }

    pub fn set_state_observer<F>(&self, observer: F) -> Result<()>
    where
        F: FnMut(ManagerState, ManagerState) + Send + 'static,
    {
        self.send(Command::SetObserver(Box::new(observer)))
    }

    pub fn clear_state_observer(&self) -> Result<()> {
        self.send(Command::ClearObserver)
    }

    /// Disconnect and stop the service task
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.sender
            .send(command)
            .map_err(|_| RealtimeError::ServiceStopped)
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
