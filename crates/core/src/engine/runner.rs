//! Single-step state machine.
//!
//! ```text
//! Idle -> Deciding -> Skipped
//!   |        |
//!   +--------+-> Starting -> Running -> Succeeded
//!                              | ^   \
//!                              +-+    -> Failed
//!                       (auto-continuation)
//! ```
//!
//! Every transition is appended to the run's log.

use crate::progress::{FeedHandle, PollSchedule, ProgressPoller, Ticker, TickerConfig};
use crate::registry::StepDef;
use crate::remote::base::{StepRequest, StepResponse};
use crate::remote::cache::CachedArtifacts;
use crate::remote::error::StepError;
use crate::resume::confirm::Confirmer;
use crate::resume::gate::decide;
use crate::state::board::{StepClaim, StatusBoard};
use crate::state::run_log::RunLog;
use log::debug;
use mp_protocol::{GlobalConfig, OutcomeKind, RunnerState, SkipReason, StepKey, StepReport, StepStatus};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Message recorded for steps skipped because their output already exists.
pub const EXISTING_OUTPUT_MESSAGE: &str = "using existing output";

/// Collaborators shared by every step of one run.
pub struct StepContext<'a> {
    pub project_id: &'a str,
    pub board: &'a Arc<StatusBoard>,
    pub log: &'a RunLog,
    pub artifacts: &'a CachedArtifacts,
    pub confirmer: &'a dyn Confirmer,
    pub args: &'a Map<String, Value>,
    /// Cancelled when the run is halted.
    pub halt: &'a CancellationToken,
}

/// Terminal state of one step execution.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Succeeded {
        summary: String,
        payload: Value,
        /// Remote calls made, auto-continuations included.
        calls: u32,
    },
    Skipped(SkipReason),
    Failed {
        error: StepError,
        calls: u32,
    },
}

impl StepOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            StepOutcome::Succeeded { .. } => OutcomeKind::Succeeded,
            StepOutcome::Skipped(_) => OutcomeKind::Skipped,
            StepOutcome::Failed { .. } => OutcomeKind::Failed,
        }
    }

    pub fn state(&self) -> RunnerState {
        match self {
            StepOutcome::Succeeded { .. } => RunnerState::Succeeded,
            StepOutcome::Skipped(_) => RunnerState::Skipped,
            StepOutcome::Failed { .. } => RunnerState::Failed,
        }
    }

    pub fn calls(&self) -> u32 {
        match self {
            StepOutcome::Succeeded { calls, .. } | StepOutcome::Failed { calls, .. } => *calls,
            StepOutcome::Skipped(_) => 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }

    pub fn to_report(&self, step: StepKey) -> StepReport {
        StepReport {
            step,
            outcome: self.kind(),
            message: self.to_string(),
            calls: self.calls(),
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Succeeded { summary, .. } => f.write_str(summary),
            StepOutcome::Skipped(SkipReason::ExistingOutput) => f.write_str(EXISTING_OUTPUT_MESSAGE),
            StepOutcome::Skipped(SkipReason::Declined) => {
                f.write_str("already completed, rerun declined")
            }
            StepOutcome::Skipped(SkipReason::Halted) => {
                f.write_str("halted while awaiting confirmation")
            }
            StepOutcome::Failed { error, .. } => write!(f, "{error}"),
        }
    }
}

/// Drives one step from `Idle` to a terminal state.
pub struct StepRunner {
    poller: Arc<ProgressPoller>,
    ticker: TickerConfig,
    /// Incomplete responses tolerated before giving up; 0 means unbounded.
    max_continuations: u32,
}

impl StepRunner {
    pub fn new(poller: Arc<ProgressPoller>, ticker: TickerConfig, max_continuations: u32) -> Self {
        Self {
            poller,
            ticker,
            max_continuations,
        }
    }

    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(
            Arc::new(ProgressPoller::new(PollSchedule::from(&config.poll))),
            TickerConfig::from(&config.poll),
            config.max_continuations,
        )
    }

    pub fn poller(&self) -> &Arc<ProgressPoller> {
        &self.poller
    }

    pub fn max_continuations(&self) -> u32 {
        self.max_continuations
    }

    fn transition(&self, ctx: &StepContext<'_>, step: &StepDef, state: RunnerState, detail: impl fmt::Display) {
        ctx.log.append(format!("{} [{state:?}] {detail}", step.label));
    }

    /// Execute `step` once, including any auto-continuations.
    ///
    /// Never returns an error: every failure ends in `StepOutcome::Failed`
    /// with the step's status set to `error`.
    pub async fn run(&self, step: &StepDef, ctx: &StepContext<'_>) -> StepOutcome {
        self.transition(ctx, step, RunnerState::Idle, "requested");

        if ctx.project_id.trim().is_empty() {
            let error = StepError::MissingProjectId;
            ctx.board.set(step.key, StepStatus::error(error.to_string()));
            self.transition(ctx, step, RunnerState::Failed, &error);
            return StepOutcome::Failed { error, calls: 0 };
        }

        let mut force = false;
        if let (true, Some(source)) = (step.consults_resume_gate(), step.progress.as_ref()) {
            self.transition(ctx, step, RunnerState::Deciding, "checking previous progress");
            let progress = source.fetch(ctx.project_id).await;
            // Halting cancels a pending confirmation.
            let decision = tokio::select! {
                decision = decide(&step.label, progress, ctx.confirmer) => decision,
                _ = ctx.halt.cancelled() => {
                    self.transition(ctx, step, RunnerState::Skipped, "halted while awaiting confirmation");
                    return StepOutcome::Skipped(SkipReason::Halted);
                }
            };
            if !decision.allow {
                self.transition(ctx, step, RunnerState::Skipped, decision);
                return StepOutcome::Skipped(SkipReason::Declined);
            }
            self.transition(ctx, step, RunnerState::Deciding, decision);
            force = decision.force;
        }

        let claim = match ctx.board.claim(step.key, format!("{} running", step.label)) {
            Ok(claim) => claim,
            Err(error) => {
                // The owner of the live attempt keeps the status.
                self.transition(ctx, step, RunnerState::Failed, &error);
                return StepOutcome::Failed { error, calls: 0 };
            }
        };
        self.transition(
            ctx,
            step,
            RunnerState::Starting,
            if force { "starting from scratch" } else { "starting" },
        );

        let feed = self.start_feed(step, ctx, &claim);
        let request = StepRequest::new(ctx.project_id)
            .with_force(force)
            .with_args(ctx.args.clone());
        let (result, calls) = self.invoke_until_complete(step, ctx, request).await;
        feed.stop().await;

        self.finish(step, ctx, claim, result, calls)
    }

    fn start_feed(&self, step: &StepDef, ctx: &StepContext<'_>, claim: &StepClaim) -> FeedHandle {
        match &step.progress {
            Some(source) => self.poller.start(
                ctx.project_id,
                claim.progress_token(),
                Arc::clone(source),
                Arc::clone(ctx.board),
            ),
            None => Ticker::start(claim.progress_token(), Arc::clone(ctx.board), self.ticker),
        }
    }

    /// Call the remote procedure, re-invoking it while it reports
    /// `incomplete`. Continuations never re-force a restart.
    async fn invoke_until_complete(
        &self,
        step: &StepDef,
        ctx: &StepContext<'_>,
        mut request: StepRequest,
    ) -> (Result<StepResponse, StepError>, u32) {
        let mut calls: u32 = 0;
        let mut continuations: u32 = 0;

        loop {
            if calls == 0 {
                self.transition(ctx, step, RunnerState::Running, "calling remote step");
            }
            calls += 1;

            let response = match step.executor.invoke(&request).await {
                Ok(response) => response,
                Err(error) => return (Err(error), calls),
            };
            if !response.incomplete {
                return (Ok(response), calls);
            }

            continuations += 1;
            if self.max_continuations > 0 && continuations >= self.max_continuations {
                let error = StepError::ContinuationLimit {
                    step: step.key,
                    limit: self.max_continuations,
                };
                return (Err(error), calls);
            }

            debug!("{} incomplete after call {calls}, continuing", step.key);
            self.transition(
                ctx,
                step,
                RunnerState::Running,
                format_args!("incomplete, continuing (call {})", calls + 1),
            );
            request.force = false;
        }
    }

    fn finish(
        &self,
        step: &StepDef,
        ctx: &StepContext<'_>,
        claim: StepClaim,
        result: Result<StepResponse, StepError>,
        calls: u32,
    ) -> StepOutcome {
        match result {
            Ok(response) => {
                let summary = response.summary();
                ctx.board.finish(claim, StepStatus::success(summary.clone()));
                ctx.artifacts.invalidate(ctx.project_id);
                self.transition(ctx, step, RunnerState::Succeeded, &summary);
                StepOutcome::Succeeded {
                    summary,
                    payload: response.payload,
                    calls,
                }
            }
            Err(error) => {
                ctx.board.finish(claim, StepStatus::error(error.to_string()));
                self.transition(ctx, step, RunnerState::Failed, &error);
                StepOutcome::Failed { error, calls }
            }
        }
    }
}
