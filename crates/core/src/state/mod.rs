//! Session state shared by the runner and its pollers.
//!
//! This module provides:
//! - `StatusBoard`: per-step status and progress for the active project
//! - `RunLog`: the timestamped log trail of a run
//! - `Session`: busy flag, halt token and active-project tracking

pub mod board;
pub mod run_log;
pub mod session;

pub use board::{ProgressToken, StatusBoard, StepClaim};
pub use run_log::RunLog;
pub use session::{RunGuard, Session};
