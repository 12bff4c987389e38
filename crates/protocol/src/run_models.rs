//! Run-level models: runner states, run status and the log trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::step_models::StepKey;

/// States of a single step execution.
///
/// Normal flow: Idle -> Deciding -> Starting -> Running -> Succeeded
///
/// Terminal states are Succeeded, Failed and Skipped. Deciding only happens
/// for resumable steps; the others go straight from Idle to Starting.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerState {
    Idle,
    Deciding,
    Skipped,
    Starting,
    Running,
    Succeeded,
    Failed,
}

impl RunnerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunnerState::Skipped | RunnerState::Succeeded | RunnerState::Failed
        )
    }
}

/// Why a step was skipped without calling its remote procedure.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// The completion rule was already satisfied by existing artifacts.
    ExistingOutput,

    /// The step was already complete and the user declined a rerun.
    Declined,

    /// The run was halted while the rerun confirmation was pending.
    Halted,
}

/// Serializable outcome of one step within a run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeKind {
    Succeeded,
    Skipped,
    Failed,
}

/// Per-step entry of a [`RunSummary`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub step: StepKey,
    pub outcome: OutcomeKind,
    pub message: String,

    /// Number of remote calls made, including auto-continuations.
    pub calls: u32,
}

/// Final status of a whole run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Every selected step succeeded or was skipped.
    Completed,

    /// A step failed and the run stopped there.
    Failed,

    /// The run was halted explicitly before finishing.
    Halted,
}

/// One timestamped line of a run's log trail.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct LogEntry {
    #[ts(type = "string")]
    pub at: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            message: message.into(),
        }
    }
}

/// Serializable summary of a finished run.
#[derive(Serialize, Deserialize, Debug, Clone, TS)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    #[ts(type = "string")]
    pub run_id: Uuid,
    pub project_id: String,
    pub status: RunStatus,
    pub steps: Vec<StepReport>,
    pub log: Vec<LogEntry>,
    #[ts(type = "string")]
    pub started_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub completed_at: DateTime<Utc>,
}
