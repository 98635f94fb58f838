//! Deterministic transport and clock for driving the manager in tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use url::Url;

use argus_realtime::realtime::{
    ConnectionHandle, ConnectionId, IncidentEvent, ManagerId, ManagerState,
    RealtimeConfig, RealtimeConnectionManager, RetryScheduler, TimerId, Transport,
    TransportEvent,
};
use argus_realtime::{RealtimeSettings, Result};

#[derive(Default)]
pub struct Wire {
    pub opened: Vec<ConnectionId>,
    pub sent: Vec<(ConnectionId, String)>,
    pub closed: Vec<ConnectionId>,
}

pub struct FakeTransport(pub Arc<Mutex<Wire>>);

pub struct FakeHandle {
    id: ConnectionId,
    wire: Arc<Mutex<Wire>>,
    closed: bool,
}

impl ConnectionHandle for FakeHandle {
    fn send(&mut self, text: String) -> Result<()> {
        self.wire.lock().sent.push((self.id, text));
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        self.wire.lock().closed.push(self.id);
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Transport for FakeTransport {
    type Handle = FakeHandle;

    fn open(&mut self, _endpoint: &Url, id: ConnectionId) -> Result<FakeHandle> {
        self.0.lock().opened.push(id);
        Ok(FakeHandle {
            id,
            wire: self.0.clone(),
            closed: false,
        })
    }
}

/// Scheduled timer as seen by a virtual clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub id: TimerId,
    pub delay: Duration,
    /// Virtual time at which the timer fires
    pub due: Duration,
}

#[derive(Default)]
pub struct Clock {
    pub now: Duration,
    pub scheduled: Vec<ScheduledTimer>,
    pub pending: Option<ScheduledTimer>,
}

pub struct ManualScheduler(pub Arc<Mutex<Clock>>);

impl RetryScheduler for ManualScheduler {
    fn schedule(&mut self, id: TimerId, delay: Duration) {
        let mut clock = self.0.lock();
        let timer = ScheduledTimer {
            id,
            delay,
            due: clock.now + delay,
        };
        clock.scheduled.push(timer);
        clock.pending = Some(timer);
    }

    fn cancel(&mut self, id: TimerId) {
        let mut clock = self.0.lock();
        if clock.pending.map(|t| t.id) == Some(id) {
            clock.pending = None;
        }
    }
}

pub struct Driver {
    pub manager: RealtimeConnectionManager<FakeTransport, ManualScheduler>,
    pub wire: Arc<Mutex<Wire>>,
    pub clock: Arc<Mutex<Clock>>,
    pub events: tokio::sync::mpsc::UnboundedReceiver<IncidentEvent>,
    pub states: Arc<Mutex<Vec<ManagerState>>>,
}

pub fn driver(max_retries: u32, initial_interval: Duration) -> Driver {
    let wire = Arc::new(Mutex::new(Wire::default()));
    let clock = Arc::new(Mutex::new(Clock::default()));
    let (tx, events) = tokio::sync::mpsc::unbounded_channel();

    let settings = RealtimeSettings::new("ws://argus.test/ws")
        .unwrap()
        .with_max_retries(max_retries)
        .unwrap()
        .with_initial_retry_interval(initial_interval)
        .unwrap();

    let mut manager = RealtimeConnectionManager::new(
        ManagerId(0),
        &settings,
        RealtimeConfig::forwarding(tx),
        FakeTransport(wire.clone()),
        ManualScheduler(clock.clone()),
    )
    .unwrap();

    let states = Arc::new(Mutex::new(Vec::new()));
    let log = states.clone();
    manager.set_state_observer(Box::new(move |_, next| log.lock().push(next)));

    Driver {
        manager,
        wire,
        clock,
        events,
        states,
    }
}

impl Driver {
    pub fn current(&self) -> ConnectionId {
        *self.wire.lock().opened.last().expect("no connection opened")
    }

    pub fn connections_opened(&self) -> usize {
        self.wire.lock().opened.len()
    }

    pub fn open(&mut self) {
        let id = self.current();
        self.manager.handle_transport_event(id, TransportEvent::Open);
    }

    pub fn send_text(&mut self, text: &str) {
        let id = self.current();
        self.manager
            .handle_transport_event(id, TransportEvent::Message(text.to_string()));
    }

    pub fn close(&mut self) {
        let id = self.current();
        self.close_connection(id);
    }

    pub fn close_connection(&mut self, id: ConnectionId) {
        self.manager.handle_transport_event(
            id,
            TransportEvent::Close {
                code: Some(1006),
                reason: "abnormal closure".into(),
            },
        );
    }

    /// Advance the virtual clock to the pending timer and fire it
    pub fn advance_to_retry(&mut self) -> Option<ScheduledTimer> {
        let timer = {
            let mut clock = self.clock.lock();
            let timer = clock.pending.take()?;
            clock.now = timer.due;
            timer
        };
        self.manager.handle_retry_timer(timer.id);
        Some(timer)
    }

    pub fn scheduled(&self) -> Vec<ScheduledTimer> {
        self.clock.lock().scheduled.clone()
    }

    pub fn drain_events(&mut self) -> Vec<IncidentEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

pub fn incident_json(pk: i64) -> serde_json::Value {
    serde_json::json!({
        "pk": pk,
        "start_time": "2021-06-28T08:29:06.143000+02:00",
        "end_time": "infinity",
        "stateful": true,
        "details_url": "https://nav.example.org/devices/1",
        "description": format!("Incident {}", pk),
        "ticket_url": "",
        "open": true,
        "acked": false,
        "level": 3,
        "source": {"pk": 1, "name": "nav", "type": "nav"},
        "source_incident_id": format!("{}", 1000 + pk),
        "tags": [{"added_by": 1, "added_time": "2021-06-28T08:29:06+02:00", "tag": "host=sw1"}]
    })
}
