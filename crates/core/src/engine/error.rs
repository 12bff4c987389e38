//! Errors that prevent a run from starting.
//!
//! A failing step is not a `RunError`: it ends the run with
//! `RunStatus::Failed` and is reported through the run's outcomes.

use mp_protocol::StepKey;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("A project id is required to run pipeline steps")]
    MissingProjectId,

    #[error("A run for project '{0}' is already in progress")]
    Busy(String),

    #[error("Cannot switch projects while a run is in progress")]
    ProjectSwitchWhileBusy,

    #[error("Step '{0}' is not registered")]
    UnknownStep(StepKey),
}
