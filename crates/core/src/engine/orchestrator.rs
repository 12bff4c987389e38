//! Sequencing of step runners for whole-pipeline runs.

use crate::engine::error::RunError;
use crate::engine::runner::{StepContext, StepOutcome, StepRunner, EXISTING_OUTPUT_MESSAGE};
use crate::registry::{StepDef, StepRegistry};
use crate::remote::base::ArtifactStore;
use crate::remote::cache::CachedArtifacts;
use crate::remote::error::StepError;
use crate::resume::confirm::Confirmer;
use crate::state::run_log::RunLog;
use crate::state::session::{RunGuard, Session};
use chrono::{DateTime, Utc};
use log::warn;
use mp_protocol::{
    ArtifactSet, Event, LogEntry, ProgressSnapshot, RunStatus, RunSummary, SkipReason, StepKey,
    StepStatus,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Which steps a run covers and the arguments passed to each of them.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Skip every step before this one.
    pub from: Option<StepKey>,

    /// Run only these steps. Registry order still applies.
    pub only: Option<Vec<StepKey>>,

    /// Extra fields merged into every remote request body.
    pub args: Map<String, Value>,
}

/// Result of one run, in execution order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub project_id: String,
    pub status: RunStatus,
    pub outcomes: Vec<(StepKey, StepOutcome)>,
    pub log: Vec<LogEntry>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    pub fn outcome(&self, key: StepKey) -> Option<&StepOutcome> {
        self.outcomes
            .iter()
            .find(|(step, _)| *step == key)
            .map(|(_, outcome)| outcome)
    }

    /// Remote calls made across every step of the run.
    pub fn total_calls(&self) -> u32 {
        self.outcomes.iter().map(|(_, outcome)| outcome.calls()).sum()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            project_id: self.project_id.clone(),
            status: self.status,
            steps: self
                .outcomes
                .iter()
                .map(|(step, outcome)| outcome.to_report(*step))
                .collect(),
            log: self.log.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Runs steps in registry order, one at a time, for one session.
pub struct PipelineOrchestrator {
    registry: Arc<StepRegistry>,
    session: Arc<Session>,
    runner: StepRunner,
    artifacts: CachedArtifacts,
    confirmer: Arc<dyn Confirmer>,
    events_tx: Option<UnboundedSender<Event>>,
}

impl PipelineOrchestrator {
    pub fn new(
        registry: Arc<StepRegistry>,
        runner: StepRunner,
        store: Arc<dyn ArtifactStore>,
        confirmer: Arc<dyn Confirmer>,
        events_tx: Option<UnboundedSender<Event>>,
    ) -> Self {
        Self {
            registry,
            session: Arc::new(Session::new(events_tx.clone())),
            runner,
            artifacts: CachedArtifacts::new(store),
            confirmer,
            events_tx,
        }
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Ask the current run to stop before its next step, abandoning any
    /// pending rerun confirmation.
    pub fn halt(&self) -> bool {
        self.session.halt()
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(event);
        }
    }

    /// Run the selected steps in order, skipping those whose output exists.
    ///
    /// The session stays busy for the whole run. The run stops at the first
    /// failed step; earlier steps keep their results.
    ///
    /// # Errors
    ///
    /// - `RunError::MissingProjectId` if `project_id` is blank
    /// - `RunError::Busy` if another run holds the session
    pub async fn run_all(&self, project_id: &str, options: &RunOptions) -> Result<RunReport, RunError> {
        let guard = self.session.begin_run(project_id)?;
        let steps = self.registry.select(options.from, options.only.as_deref());
        Ok(self.execute(&guard, steps, &options.args, true).await)
    }

    /// Run one step regardless of existing output.
    ///
    /// Completed work is still protected by the resume gate for resumable
    /// steps.
    ///
    /// # Errors
    ///
    /// Same as [`run_all`](Self::run_all), plus `RunError::UnknownStep`.
    pub async fn run_step(
        &self,
        project_id: &str,
        key: StepKey,
        args: &Map<String, Value>,
    ) -> Result<RunReport, RunError> {
        let step = self.registry.get(key).ok_or(RunError::UnknownStep(key))?;
        let guard = self.session.begin_run(project_id)?;
        Ok(self.execute(&guard, vec![step], args, false).await)
    }

    async fn execute(
        &self,
        guard: &RunGuard<'_>,
        steps: Vec<Arc<StepDef>>,
        args: &Map<String, Value>,
        skip_existing: bool,
    ) -> RunReport {
        let project_id = guard.project_id();
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let log = RunLog::new(run_id, self.events_tx.clone());

        self.emit(Event::RunStarted {
            run_id,
            project_id: project_id.to_string(),
            steps: steps.iter().map(|step| step.key).collect(),
        });
        log.append(format!("Run started for {project_id} ({} steps)", steps.len()));

        let ctx = StepContext {
            project_id,
            board: self.session.board(),
            log: &log,
            artifacts: &self.artifacts,
            confirmer: self.confirmer.as_ref(),
            args,
            halt: guard.halt_token(),
        };

        // Files may have changed since the last run.
        let mut artifacts = if skip_existing {
            self.refresh_artifacts(project_id, ArtifactSet::new()).await
        } else {
            ArtifactSet::new()
        };
        let mut outcomes = Vec::with_capacity(steps.len());
        let mut status = RunStatus::Completed;

        for step in steps {
            if guard.is_halted() {
                log.append(format!("Run halted before {}", step.label));
                status = RunStatus::Halted;
                break;
            }

            if skip_existing && step.completion.is_satisfied(&artifacts) {
                self.session
                    .board()
                    .set(step.key, StepStatus::success(EXISTING_OUTPUT_MESSAGE));
                log.append(format!("{} [Skipped] {EXISTING_OUTPUT_MESSAGE}", step.label));
                outcomes.push((step.key, StepOutcome::Skipped(SkipReason::ExistingOutput)));
                continue;
            }

            let outcome = self.runner.run(&step, &ctx).await;
            let failed = outcome.is_failed();
            if skip_existing && matches!(outcome, StepOutcome::Succeeded { .. }) {
                artifacts = self.refresh_artifacts(project_id, artifacts).await;
            }
            let halted = matches!(outcome, StepOutcome::Skipped(SkipReason::Halted));
            outcomes.push((step.key, outcome));

            if halted {
                log.append(format!("Run halted at {}", step.label));
                status = RunStatus::Halted;
                break;
            }

            if failed {
                log.append(format!("Run stopped: {} failed", step.label));
                status = RunStatus::Failed;
                break;
            }
        }

        log.append(format!("Run finished: {status:?}"));
        self.emit(Event::RunFinished {
            run_id,
            project_id: project_id.to_string(),
            status,
        });

        RunReport {
            run_id,
            project_id: project_id.to_string(),
            status,
            outcomes,
            log: log.entries(),
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// Fresh listing, or `fallback` if the store cannot be reached.
    async fn refresh_artifacts(&self, project_id: &str, fallback: ArtifactSet) -> ArtifactSet {
        match self.artifacts.refresh(project_id).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("could not list artifacts for {project_id}: {e}");
                fallback
            }
        }
    }

    /// Fresh artifact listing for a project.
    pub async fn artifacts(&self, project_id: &str) -> Result<ArtifactSet, StepError> {
        if project_id.trim().is_empty() {
            return Err(StepError::MissingProjectId);
        }
        self.artifacts.refresh(project_id).await
    }

    /// Query the progress endpoint of every pollable step.
    ///
    /// A failing query only affects its own entry.
    pub async fn progress_overview(
        &self,
        project_id: &str,
    ) -> Vec<(StepKey, Result<ProgressSnapshot, StepError>)> {
        let mut overview = Vec::new();
        for step in self.registry.iter() {
            let Some(source) = &step.progress else {
                continue;
            };
            let snapshot = if project_id.trim().is_empty() {
                Err(StepError::MissingProjectId)
            } else {
                source.fetch(project_id).await
            };
            overview.push((step.key, snapshot));
        }
        overview
    }
}
