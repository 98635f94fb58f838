//! Reconnect bookkeeping with exponential backoff

use std::time::Duration;

/// Multiplier applied to the retry delay after every scheduled retry
pub const BACKOFF_FACTOR: u32 = 2;

/// Retry counter and the delay to use for the next reconnect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    retries: u32,
    retry_interval: Duration,
    initial_interval: Duration,
}

impl RetryState {
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            retries: 0,
            retry_interval: initial_interval,
            initial_interval,
        }
    }

    /// Number of reconnects scheduled since the last reset
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Delay the next scheduled reconnect will use
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn reset(&mut self) {
        self.retries = 0;
        self.retry_interval = self.initial_interval;
    }

    /// Count a lost connection
    pub fn record_failure(&mut self) {
        self.retries = self.retries.saturating_add(1);
    }

    /// Whether the counter has passed the ceiling
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.retries > max_retries
    }

    /// Take the delay for the retry being scheduled now.
    ///
    /// This is the only place the backoff factor is applied.
    pub fn take_delay(&mut self) -> Duration {
        let delay = self.retry_interval;
        self.retry_interval = self.retry_interval.saturating_mul(BACKOFF_FACTOR);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double() {
        let mut retry = RetryState::new(Duration::from_secs(1));
        let delays: Vec<u64> = (0..5)
            .map(|_| {
                retry.record_failure();
                retry.take_delay().as_secs()
            })
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
        assert_eq!(retry.retries(), 5);
    }

    #[test]
    fn test_reset_restores_initial_values() {
        let mut retry = RetryState::new(Duration::from_millis(250));
        retry.record_failure();
        retry.take_delay();
        retry.reset();
        assert_eq!(retry.retries(), 0);
        assert_eq!(retry.retry_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_exhaustion_is_strictly_greater() {
        let mut retry = RetryState::new(Duration::from_secs(1));
        retry.record_failure();
        retry.record_failure();
        assert!(!retry.is_exhausted(2));
        retry.record_failure();
        assert!(retry.is_exhausted(2));
    }
}
