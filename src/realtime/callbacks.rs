//! Application callbacks for incident events

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::events::IncidentEvent;
use super::state::ManagerState;
use crate::types::Incident;

pub type IncidentsCallback = Arc<dyn Fn(Vec<Incident>) + Send + Sync>;
pub type IncidentCallback = Arc<dyn Fn(Incident) + Send + Sync>;

/// Hook informed of every state change as `(previous, next)`
pub type StateObserver = Box<dyn FnMut(ManagerState, ManagerState) + Send>;

/// Callbacks and flags for a realtime manager
#[derive(Clone)]
pub struct RealtimeConfig {
    /// Called once per subscription with the full incident list
    pub on_incidents_initial: IncidentsCallback,
    pub on_incident_added: IncidentCallback,
    pub on_incident_modified: IncidentCallback,
    pub on_incident_removed: IncidentCallback,
    /// Reserved, currently has no effect
    pub restart_on_failure: bool,
    /// Reserved, currently has no effect
    pub fallback_to_interval: bool,
}

impl RealtimeConfig {
    pub fn new<I, A, M, R>(on_initial: I, on_added: A, on_modified: M, on_removed: R) -> Self
    where
        I: Fn(Vec<Incident>) + Send + Sync + 'static,
        A: Fn(Incident) + Send + Sync + 'static,
        M: Fn(Incident) + Send + Sync + 'static,
        R: Fn(Incident) + Send + Sync + 'static,
    {
        Self {
            on_incidents_initial: Arc::new(on_initial),
            on_incident_added: Arc::new(on_added),
            on_incident_modified: Arc::new(on_modified),
            on_incident_removed: Arc::new(on_removed),
            restart_on_failure: true,
            fallback_to_interval: true,
        }
    }

    /// Callbacks that ignore every event
    pub fn noop() -> Self {
        Self::new(|_| {}, |_| {}, |_| {}, |_| {})
    }

    /// Callbacks that forward every event, in order, into a channel
    pub fn forwarding(tx: mpsc::UnboundedSender<IncidentEvent>) -> Self {
        let initial = tx.clone();
        let added = tx.clone();
        let modified = tx.clone();
        let removed = tx;
        Self::new(
            move |incidents| {
                let _ = initial.send(IncidentEvent::Initial(incidents));
            },
            move |incident| {
                let _ = added.send(IncidentEvent::Added(incident));
            },
            move |incident| {
                let _ = modified.send(IncidentEvent::Modified(incident));
            },
            move |incident| {
                let _ = removed.send(IncidentEvent::Removed(incident));
            },
        )
    }

    /// Route an event to the matching callback
    pub fn dispatch(&self, event: IncidentEvent) {
        match event {
            IncidentEvent::Initial(incidents) => (self.on_incidents_initial)(incidents),
            IncidentEvent::Added(incident) => (self.on_incident_added)(incident),
            IncidentEvent::Modified(incident) => (self.on_incident_modified)(incident),
            IncidentEvent::Removed(incident) => (self.on_incident_removed)(incident),
        }
    }

    /// Shallow-merge a partial update; unset fields keep their value
    pub fn merge(&mut self, patch: ConfigPatch) {
        if let Some(f) = patch.on_incidents_initial {
            self.on_incidents_initial = f;
        }
        if let Some(f) = patch.on_incident_added {
            self.on_incident_added = f;
        }
        if let Some(f) = patch.on_incident_modified {
            self.on_incident_modified = f;
        }
        if let Some(f) = patch.on_incident_removed {
            self.on_incident_removed = f;
        }
        if let Some(flag) = patch.restart_on_failure {
            self.restart_on_failure = flag;
        }
        if let Some(flag) = patch.fallback_to_interval {
            self.fallback_to_interval = flag;
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("restart_on_failure", &self.restart_on_failure)
            .field("fallback_to_interval", &self.fallback_to_interval)
            .finish_non_exhaustive()
    }
}

/// Partial update for [`RealtimeConfig`]
#[derive(Clone, Default)]
pub struct ConfigPatch {
    pub on_incidents_initial: Option<IncidentsCallback>,
    pub on_incident_added: Option<IncidentCallback>,
    pub on_incident_modified: Option<IncidentCallback>,
    pub on_incident_removed: Option<IncidentCallback>,
    pub restart_on_failure: Option<bool>,
    pub fallback_to_interval: Option<bool>,
}

impl ConfigPatch {
    pub fn on_incidents_initial(mut self, f: impl Fn(Vec<Incident>) + Send + Sync + 'static) -> Self {
        self.on_incidents_initial = Some(Arc::new(f));
        self
    }

    pub fn on_incident_added(mut self, f: impl Fn(Incident) + Send + Sync + 'static) -> Self {
        self.on_incident_added = Some(Arc::new(f));
        self
    }

    pub fn on_incident_modified(mut self, f: impl Fn(Incident) + Send + Sync + 'static) -> Self {
        self.on_incident_modified = Some(Arc::new(f));
        self
    }

    pub fn on_incident_removed(mut self, f: impl Fn(Incident) + Send + Sync + 'static) -> Self {
        self.on_incident_removed = Some(Arc::new(f));
        self
    }

    pub fn restart_on_failure(mut self, flag: bool) -> Self {
        self.restart_on_failure = Some(flag);
        self
    }

    pub fn fallback_to_interval(mut self, flag: bool) -> Self {
        self.fallback_to_interval = Some(flag);
        self
    }
}

impl fmt::Debug for ConfigPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigPatch")
            .field("on_incidents_initial", &self.on_incidents_initial.is_some())
            .field("on_incident_added", &self.on_incident_added.is_some())
            .field("on_incident_modified", &self.on_incident_modified.is_some())
            .field("on_incident_removed", &self.on_incident_removed.is_some())
            .field("restart_on_failure", &self.restart_on_failure)
            .field("fallback_to_interval", &self.fallback_to_interval)
            .finish()
    }
}
