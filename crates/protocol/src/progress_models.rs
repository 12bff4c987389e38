//! Progress snapshots returned by progress-query endpoints.
//!
//! A snapshot is ephemeral: every poll tick produces a fresh one that
//! supersedes the previous snapshot for display purposes only.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Coarse status reported alongside the percentage.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
pub enum ProgressState {
    Pending,
    Running,
    Done,
    Error,
}

/// One reading from a progress endpoint.
///
/// Every field is optional on the wire:
///
/// ```json
/// {
///   "percent": 42,
///   "status": "running",
///   "message": "Enriching batch 3 of 7",
///   "hasResultFile": false,
///   "nextPollMs": 2000
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Completion percentage, nominally 0 to 100.
    #[serde(default)]
    pub percent: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProgressState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Whether the step's result artifact already exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_result_file: Option<bool>,

    /// Server-suggested delay before the next poll.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_poll_ms: Option<u64>,
}

impl ProgressSnapshot {
    /// Percentage clamped into `[0, 100]`. Non-finite values read as 0.
    pub fn clamped_percent(&self) -> f64 {
        if self.percent.is_finite() {
            self.percent.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    pub fn has_result(&self) -> bool {
        self.has_result_file.unwrap_or(false)
    }

    /// Whether a poller observing this snapshot should stop polling.
    pub fn is_terminal(&self) -> bool {
        self.clamped_percent() >= 100.0
            || self.has_result()
            || matches!(
                self.status,
                Some(ProgressState::Done) | Some(ProgressState::Error)
            )
    }
}
