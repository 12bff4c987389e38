//! Live progress feeds for running steps.
//!
//! A running step gets exactly one feed:
//! - `ProgressPoller` for pollable steps, querying the step's progress
//!   endpoint on an adaptive schedule
//! - `Ticker` for steps without a progress channel, advancing a cosmetic
//!   percentage that never reaches 100
//!
//! Both return a [`FeedHandle`] owned by the runner.

pub mod poller;
pub mod schedule;
pub mod ticker;

pub use poller::ProgressPoller;
pub use schedule::PollSchedule;
pub use ticker::{Ticker, TickerConfig};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type OnStop = Box<dyn FnOnce() + Send>;

/// Owner of a background progress task.
///
/// [`stop`](FeedHandle::stop) revokes the task completely: once it
/// returns, the task has ended and no further tick can fire. Dropping the
/// handle without stopping it cancels and aborts the task as well.
pub struct FeedHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    on_stop: Option<OnStop>,
}

impl FeedHandle {
    fn new(cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            cancel,
            task: Some(task),
            on_stop: None,
        }
    }

    fn with_on_stop(mut self, on_stop: OnStop) -> Self {
        self.on_stop = Some(on_stop);
        self
    }

    /// Whether the task has already ended on its own.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel the task and wait until it has fully ended.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        if let Some(on_stop) = self.on_stop.take() {
            on_stop();
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(on_stop) = self.on_stop.take() {
            on_stop();
        }
    }
}
