//! Fixtures wiring scripted collaborators into an orchestrator.

use crate::common::mocks::MemoryArtifacts;
use mp_core::engine::{PipelineOrchestrator, StepRunner};
use mp_core::registry::{StepDef, StepRegistry};
use mp_core::remote::{ProgressSource, StepExecutor};
use mp_core::resume::Confirmer;
use mp_protocol::{CompletionRule, Event, GlobalConfig, StepKey};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// The artifact a test step produces.
pub fn artifact_of(key: StepKey) -> String {
    format!("{key}.json")
}

/// A plain step whose completion rule is its own artifact.
pub fn plain_step(key: StepKey, executor: Arc<dyn StepExecutor>) -> StepDef {
    StepDef::new(key, executor).with_completion(CompletionRule::AllOf(vec![artifact_of(key)]))
}

/// A pollable, resumable step.
pub fn resumable_step(
    key: StepKey,
    executor: Arc<dyn StepExecutor>,
    progress: Arc<dyn ProgressSource>,
) -> StepDef {
    plain_step(key, executor)
        .with_progress(progress)
        .with_resumable(true)
}

/// An orchestrator plus the receiving end of its event stream.
pub struct TestPipeline {
    pub orchestrator: PipelineOrchestrator,
    pub events_rx: UnboundedReceiver<Event>,
}

impl TestPipeline {
    pub fn new(steps: Vec<StepDef>, store: Arc<MemoryArtifacts>, confirmer: Arc<dyn Confirmer>) -> Self {
        Self::with_config(steps, store, confirmer, &GlobalConfig::default())
    }

    pub fn with_config(
        steps: Vec<StepDef>,
        store: Arc<MemoryArtifacts>,
        confirmer: Arc<dyn Confirmer>,
        config: &GlobalConfig,
    ) -> Self {
        let registry = StepRegistry::new(steps).expect("Failed to build registry");
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let orchestrator = PipelineOrchestrator::new(
            Arc::new(registry),
            StepRunner::from_config(config),
            store,
            confirmer,
            Some(events_tx),
        );
        Self {
            orchestrator,
            events_rx,
        }
    }

    /// Every event emitted so far.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }
}
