//! Indeterminate progress for steps without a progress endpoint.

use crate::progress::FeedHandle;
use crate::state::board::{ProgressToken, StatusBoard};
use mp_protocol::PollConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shape of the cosmetic progress curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerConfig {
    pub interval: Duration,
    pub step: u8,
    /// Highest percentage shown; always below 100.
    pub cap: u8,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for TickerConfig {
    fn from(config: &PollConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.ticker_interval_ms.max(1)),
            step: config.ticker_step.max(1),
            cap: config.ticker_cap.min(99),
        }
    }
}

/// Starts cosmetic progress tasks.
pub struct Ticker;

impl Ticker {
    /// Advance the step's percentage by `config.step` every interval until
    /// it reaches `config.cap`, then hold it there until stopped.
    pub fn start(token: ProgressToken, board: Arc<StatusBoard>, config: TickerConfig) -> FeedHandle {
        let cancel = CancellationToken::new();
        let child = cancel.clone();

        let task = tokio::spawn(async move {
            let cap = config.cap.min(99);
            let mut percent: u8 = 0;
            let mut interval = tokio::time::interval(config.interval);
            // The first tick of an interval completes immediately.
            interval.tick().await;

            while percent < cap {
                tokio::select! {
                    _ = child.cancelled() => return,
                    _ = interval.tick() => {}
                }
                percent = percent.saturating_add(config.step).min(cap);
                if !board.report_progress(token, f64::from(percent), None) {
                    return;
                }
            }
        });

        FeedHandle::new(cancel, task)
    }
}
