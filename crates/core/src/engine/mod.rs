//! Pipeline execution engine.
//!
//! - [`StepRunner`] drives one step through its state machine
//! - [`PipelineOrchestrator`] sequences runners for a whole run and owns the
//!   session every run goes through

pub mod error;
pub mod orchestrator;
pub mod runner;

pub use error::RunError;
pub use orchestrator::{PipelineOrchestrator, RunOptions, RunReport};
pub use runner::{StepContext, StepOutcome, StepRunner, EXISTING_OUTPUT_MESSAGE};
