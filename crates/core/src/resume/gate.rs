//! Resume decision gate.
//!
//! Before a resumable step starts, its current progress decides how:
//!
//! | Progress                               | Decision                    |
//! |----------------------------------------|-----------------------------|
//! | 100% and result artifact present       | ask; yes = forced rerun     |
//! | between 0% and 100%                    | resume in place             |
//! | nothing recorded                       | fresh start                 |
//! | progress query failed                  | fresh start (fail open)     |

use crate::remote::error::StepError;
use crate::resume::confirm::Confirmer;
use log::warn;
use mp_protocol::ProgressSnapshot;
use std::fmt;

/// Why the gate decided the way it did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecisionReason {
    /// No progress recorded.
    Fresh,
    /// Partial progress will be picked up remotely.
    Resume { percent: f64 },
    /// Completed before; the human was asked.
    AlreadyComplete { rerun: bool },
    /// Progress could not be fetched.
    ProgressUnavailable,
}

/// Whether a step may run and whether it must restart from scratch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResumeDecision {
    pub allow: bool,
    pub force: bool,
    pub reason: DecisionReason,
}

impl ResumeDecision {
    fn start(reason: DecisionReason) -> Self {
        Self {
            allow: true,
            force: false,
            reason,
        }
    }
}

impl fmt::Display for ResumeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            DecisionReason::Fresh => f.write_str("no previous progress, starting fresh"),
            DecisionReason::Resume { percent } => write!(f, "resuming from {percent:.0}%"),
            DecisionReason::AlreadyComplete { rerun: true } => {
                f.write_str("already completed, rerun confirmed")
            }
            DecisionReason::AlreadyComplete { rerun: false } => {
                f.write_str("already completed, rerun declined")
            }
            DecisionReason::ProgressUnavailable => {
                f.write_str("progress unavailable, starting without force")
            }
        }
    }
}

/// Decide how to start a resumable step from its current progress.
///
/// `label` is used in the confirmation prompt.
pub async fn decide(
    label: &str,
    progress: Result<ProgressSnapshot, StepError>,
    confirmer: &dyn Confirmer,
) -> ResumeDecision {
    let snapshot = match progress {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("could not fetch progress for {label}: {e}");
            return ResumeDecision::start(DecisionReason::ProgressUnavailable);
        }
    };

    let percent = snapshot.clamped_percent();
    if percent >= 100.0 && snapshot.has_result() {
        let rerun = confirmer
            .ask(
                &format!("{label} already completed"),
                &format!("{label} has already finished and produced its result. Run it again from scratch?"),
            )
            .await;
        return ResumeDecision {
            allow: rerun,
            force: rerun,
            reason: DecisionReason::AlreadyComplete { rerun },
        };
    }

    if percent > 0.0 && percent < 100.0 {
        return ResumeDecision::start(DecisionReason::Resume { percent });
    }

    ResumeDecision::start(DecisionReason::Fresh)
}
