//! Adaptive progress polling for pollable steps.
//!
//! The `ProgressPoller` keeps at most one active poll task per project.
//! Starting a poller for a project revokes the previous one, and every
//! write a task makes is tagged with its attempt's [`ProgressToken`], so the
//! brief overlap between two steps can never produce two writers for the
//! same status entry.

use crate::progress::schedule::PollSchedule;
use crate::progress::FeedHandle;
use crate::remote::base::ProgressSource;
use crate::state::board::{ProgressToken, StatusBoard};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct ActivePoll {
    id: u64,
    cancel: CancellationToken,
    abort: AbortHandle,
}

impl ActivePoll {
    fn revoke(&self) {
        self.cancel.cancel();
        self.abort.abort();
    }
}

/// Everything one poll task needs, moved into the task.
struct PollTask {
    project_id: String,
    token: ProgressToken,
    source: Arc<dyn ProgressSource>,
    board: Arc<StatusBoard>,
    schedule: PollSchedule,
}

/// Starts and tracks poll tasks, at most one per project.
pub struct ProgressPoller {
    schedule: PollSchedule,
    active: Arc<Mutex<HashMap<String, ActivePoll>>>,
    next_id: AtomicU64,
}

impl ProgressPoller {
    pub fn new(schedule: PollSchedule) -> Self {
        Self {
            schedule,
            active: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn schedule(&self) -> PollSchedule {
        self.schedule
    }

    /// Whether a poll task for `project_id` is still running.
    pub fn is_active(&self, project_id: &str) -> bool {
        self.active
            .lock()
            .get(project_id)
            .is_some_and(|poll| !poll.abort.is_finished())
    }

    /// Start polling `source` for the attempt identified by `token`.
    ///
    /// Any poller already running for the same project is revoked first.
    /// The first query happens after the schedule's minimum interval.
    pub fn start(
        &self,
        project_id: &str,
        token: ProgressToken,
        source: Arc<dyn ProgressSource>,
        board: Arc<StatusBoard>,
    ) -> FeedHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let task = PollTask {
            project_id: project_id.to_string(),
            token,
            source,
            board,
            schedule: self.schedule,
        };

        let handle = {
            let mut active = self.active.lock();
            if let Some(previous) = active.remove(project_id) {
                debug!("revoking poller {} for {project_id}", previous.id);
                previous.revoke();
            }

            let join = tokio::spawn(poll_loop(task, cancel.clone()));
            active.insert(
                project_id.to_string(),
                ActivePoll {
                    id,
                    cancel: cancel.clone(),
                    abort: join.abort_handle(),
                },
            );
            FeedHandle::new(cancel, join)
        };

        let active = Arc::clone(&self.active);
        let project = project_id.to_string();
        handle.with_on_stop(Box::new(move || {
            let mut active = active.lock();
            if active.get(&project).is_some_and(|poll| poll.id == id) {
                active.remove(&project);
            }
        }))
    }
}

async fn poll_loop(task: PollTask, cancel: CancellationToken) {
    let started = Instant::now();
    let mut delay = task.schedule.first_delay();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = task.source.fetch(&task.project_id) => result,
        };

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "progress query for {} failed, retrying: {e}",
                    task.token.key
                );
                delay = task.schedule.retry_delay();
                continue;
            }
        };

        if cancel.is_cancelled() {
            return;
        }

        let percent = snapshot.clamped_percent();
        if !task
            .board
            .report_progress(task.token, percent, snapshot.message.clone())
        {
            debug!("poller for {} outlived its attempt", task.token.key);
            return;
        }

        if snapshot.is_terminal() {
            debug!("poller for {} finished at {percent}%", task.token.key);
            return;
        }

        delay = task
            .schedule
            .next_delay(started.elapsed(), snapshot.next_poll_ms);
        debug!(
            "{} at {percent}%, next poll in {}ms",
            task.token.key,
            delay.as_millis()
        );
    }
}
