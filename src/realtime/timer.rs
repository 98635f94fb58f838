//! Tokio-backed reconnect timer

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::transport::{RetryScheduler, TimerId};

/// Arms at most one sleeping task at a time; fires are reported on a channel
pub struct TokioScheduler {
    fired: mpsc::UnboundedSender<TimerId>,
    pending: Option<(TimerId, JoinHandle<()>)>,
}

impl TokioScheduler {
    pub fn new(fired: mpsc::UnboundedSender<TimerId>) -> Self {
        Self {
            fired,
            pending: None,
        }
    }

    fn abort_pending(&mut self) {
        if let Some((_, task)) = self.pending.take() {
            task.abort();
        }
    }
}

impl RetryScheduler for TokioScheduler {
    fn schedule(&mut self, id: TimerId, delay: Duration) {
        self.abort_pending();

        let fired = self.fired.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fired.send(id);
        });
        self.pending = Some((id, task));
    }

    fn cancel(&mut self, id: TimerId) {
        if matches!(self.pending, Some((pending, _)) if pending == id) {
            self.abort_pending();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.abort_pending();
    }
}
