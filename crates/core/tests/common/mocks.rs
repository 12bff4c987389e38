//! Scripted collaborators for deterministic engine tests.

use async_trait::async_trait;
use mp_core::remote::{ArtifactStore, ProgressSource, StepError, StepExecutor, StepRequest, StepResponse};
use mp_core::resume::Confirmer;
use mp_protocol::{ArtifactSet, ProgressSnapshot, ProgressState};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory artifact store.
pub struct MemoryArtifacts {
    names: Mutex<ArtifactSet>,
    listings: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryArtifacts {
    pub fn new(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            names: Mutex::new(names.iter().map(|name| name.to_string()).collect()),
            listings: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        })
    }

    pub fn add(&self, name: &str) {
        self.names.lock().insert(name.to_string());
    }

    pub fn remove(&self, name: &str) {
        self.names.lock().remove(name);
    }

    pub fn names(&self) -> ArtifactSet {
        self.names.lock().clone()
    }

    /// Number of listing requests served or refused.
    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifacts {
    async fn list_artifacts(&self, _project_id: &str) -> Result<ArtifactSet, StepError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StepError::transport(Some(503), "artifact store unavailable"));
        }
        Ok(self.names())
    }
}

/// Replays scripted responses, then answers "complete" forever.
///
/// Requests are recorded so tests can inspect `force` and the arguments.
/// On a complete response the configured artifacts are added to the store.
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Result<StepResponse, StepError>>>,
    requests: Mutex<Vec<StepRequest>>,
    delay: Option<Duration>,
    produces: Option<(Arc<MemoryArtifacts>, Vec<String>)>,
}

impl ScriptedExecutor {
    pub fn new(script: Vec<Result<StepResponse, StepError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            delay: None,
            produces: None,
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing(error: StepError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// `n` incomplete responses followed by success.
    pub fn incomplete_times(n: usize) -> Self {
        Self::new(
            (0..n)
                .map(|i| Ok(StepResponse::incomplete(json!({ "incomplete": true, "batch": i }))))
                .collect(),
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn producing<I>(mut self, store: Arc<MemoryArtifacts>, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.produces = Some((store, names.into_iter().map(Into::into).collect()));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<StepRequest> {
        self.requests.lock().clone()
    }

    pub fn forces(&self) -> Vec<bool> {
        self.requests.lock().iter().map(|request| request.force).collect()
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn invoke(&self, request: &StepRequest) -> Result<StepResponse, StepError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().pop_front();
        let result = next.unwrap_or_else(|| Ok(StepResponse::complete(json!({ "message": "done" }))));

        if let (Ok(response), Some((store, names))) = (&result, &self.produces) {
            if !response.incomplete {
                for name in names {
                    store.add(name);
                }
            }
        }
        result
    }
}

/// Replays scripted progress readings, then repeats the last one.
pub struct ScriptedProgress {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Result<ProgressSnapshot, StepError>>>,
    last: Mutex<Option<Result<ProgressSnapshot, StepError>>>,
}

impl ScriptedProgress {
    pub fn new(script: Vec<Result<ProgressSnapshot, StepError>>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
        })
    }

    /// A step that has never run.
    pub fn fresh() -> Arc<Self> {
        Self::new(vec![Ok(ProgressSnapshot::default())])
    }

    /// A step that finished and wrote its result file.
    pub fn completed() -> Arc<Self> {
        Self::new(vec![Ok(ProgressSnapshot {
            percent: 100.0,
            status: Some(ProgressState::Done),
            has_result_file: Some(true),
            ..Default::default()
        })])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressSource for ScriptedProgress {
    async fn fetch(&self, _project_id: &str) -> Result<ProgressSnapshot, StepError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(reading) => {
                *self.last.lock() = Some(reading.clone());
                reading
            }
            None => self
                .last
                .lock()
                .clone()
                .unwrap_or_else(|| Ok(ProgressSnapshot::default())),
        }
    }
}

/// Answers every prompt the same way and counts how often it was asked.
pub struct CountingConfirm {
    answer: bool,
    asked: AtomicUsize,
}

impl CountingConfirm {
    pub fn new(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            asked: AtomicUsize::new(0),
        })
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Confirmer for CountingConfirm {
    async fn ask(&self, _title: &str, _message: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

/// Never answers, like a human who walked away from the prompt.
pub struct SilentConfirm {
    asked: AtomicUsize,
}

impl SilentConfirm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            asked: AtomicUsize::new(0),
        })
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Confirmer for SilentConfirm {
    async fn ask(&self, _title: &str, _message: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

pub fn running(percent: f64) -> Result<ProgressSnapshot, StepError> {
    Ok(ProgressSnapshot {
        percent,
        status: Some(ProgressState::Running),
        ..Default::default()
    })
}
