//! Adaptive delay computation for progress polling.

use mp_protocol::PollConfig;
use std::time::Duration;

/// How long to wait between progress queries.
///
/// Young steps are polled aggressively; once a step has run past the early
/// window the fallback delay backs off. A server-suggested delay replaces
/// the fallback, and no delay is ever shorter than the minimum interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub min_interval: Duration,
    pub early_interval: Duration,
    pub late_interval: Duration,
    pub early_window: Duration,
    pub error_retry: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for PollSchedule {
    fn from(config: &PollConfig) -> Self {
        Self {
            min_interval: Duration::from_millis(config.min_interval_ms),
            early_interval: Duration::from_millis(config.early_interval_ms),
            late_interval: Duration::from_millis(config.late_interval_ms),
            early_window: Duration::from_millis(config.early_window_ms),
            error_retry: Duration::from_millis(config.error_retry_ms),
        }
    }
}

impl PollSchedule {
    /// Delay before the first tick.
    pub fn first_delay(&self) -> Duration {
        self.min_interval
    }

    /// Fallback delay for a poller that has been running for `elapsed`.
    pub fn fallback(&self, elapsed: Duration) -> Duration {
        if elapsed < self.early_window {
            self.early_interval
        } else {
            self.late_interval
        }
    }

    /// Delay after a successful tick.
    pub fn next_delay(&self, elapsed: Duration, suggested_ms: Option<u64>) -> Duration {
        let delay = suggested_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.fallback(elapsed));
        delay.max(self.min_interval)
    }

    /// Delay after an inconclusive tick.
    pub fn retry_delay(&self) -> Duration {
        self.error_retry.max(self.min_interval)
    }
}
