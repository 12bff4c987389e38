//! Engine to front-end communication protocol.
//!
//! The engine pushes an [`Event`] through an unbounded channel for every
//! observable change: status transitions, progress readings, log lines and
//! confirmation prompts. Front-ends render from this stream and never read
//! engine state directly.
//!
//! Uses tagged enum serialization for TypeScript compatibility:
//! ```json
//! {
//!   "type": "stepProgressUpdate",
//!   "payload": {
//!     "project_id": "acme-dental",
//!     "step": "keyword-enrichment",
//!     "percent": 42.0,
//!     "message": "Enriching batch 3 of 7"
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::run_models::{LogEntry, RunStatus};
use crate::step_models::{StepKey, StepStatus};

/// Events sent from the engine to a front-end.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A run has acquired the session and is about to execute its steps.
    RunStarted {
        #[ts(type = "string")]
        run_id: Uuid,
        project_id: String,
        steps: Vec<StepKey>,
    },

    /// A step's status has changed.
    StepStatusUpdate {
        project_id: String,
        step: StepKey,
        status: StepStatus,
    },

    /// A fresh progress reading for a running step.
    StepProgressUpdate {
        project_id: String,
        step: StepKey,
        percent: f64,
        message: Option<String>,
    },

    /// One line appended to the run's log trail.
    RunLogLine {
        #[ts(type = "string")]
        run_id: Uuid,
        entry: LogEntry,
    },

    /// The engine is waiting for a yes/no answer.
    ConfirmationRequested { title: String, message: String },

    /// A run has released the session.
    RunFinished {
        #[ts(type = "string")]
        run_id: Uuid,
        project_id: String,
        status: RunStatus,
    },
}
