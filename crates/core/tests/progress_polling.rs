//! Timing tests for the progress poller, run on a paused clock.

mod common;

use async_trait::async_trait;
use common::running;
use mp_core::progress::{PollSchedule, ProgressPoller};
use mp_core::remote::{ProgressSource, StepError};
use mp_core::state::StatusBoard;
use mp_protocol::{PollConfig, ProgressSnapshot, StepKey};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Records the instant of every query and always reports the same reading.
struct TimedSource {
    started: Instant,
    reading: Result<ProgressSnapshot, StepError>,
    queried_at: Mutex<Vec<Duration>>,
}

impl TimedSource {
    fn new(reading: Result<ProgressSnapshot, StepError>) -> Arc<Self> {
        Arc::new(Self {
            started: Instant::now(),
            reading,
            queried_at: Mutex::new(Vec::new()),
        })
    }

    fn gaps_ms(&self) -> Vec<u128> {
        let at = self.queried_at.lock();
        at.windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect()
    }

    fn calls(&self) -> usize {
        self.queried_at.lock().len()
    }
}

#[async_trait]
impl ProgressSource for TimedSource {
    async fn fetch(&self, _project_id: &str) -> Result<ProgressSnapshot, StepError> {
        self.queried_at.lock().push(self.started.elapsed());
        self.reading.clone()
    }
}

fn board() -> Arc<StatusBoard> {
    let board = Arc::new(StatusBoard::new(None));
    board.reset("acme");
    board
}

#[tokio::test(start_paused = true)]
async fn test_fallback_delay_backs_off_after_early_window() {
    let board = board();
    let claim = board.claim(StepKey::KeywordEnrichment, "Starting").unwrap();
    let source = TimedSource::new(running(10.0));
    let poller = ProgressPoller::new(PollSchedule::default());

    let handle = poller.start("acme", claim.progress_token(), source.clone(), board.clone());
    tokio::time::sleep(Duration::from_millis(18_500)).await;
    handle.stop().await;

    // Queries at 1s..=10s every second, then every 4s.
    let at = source.queried_at.lock().clone();
    assert_eq!(at.first(), Some(&Duration::from_secs(1)));
    assert_eq!(
        source.gaps_ms(),
        vec![1000, 1000, 1000, 1000, 1000, 1000, 1000, 1000, 1000, 4000, 4000]
    );
}

#[tokio::test(start_paused = true)]
async fn test_server_suggestion_is_floored_at_minimum_interval() {
    let board = board();
    let claim = board.claim(StepKey::AdCopy, "Starting").unwrap();
    let source = TimedSource::new(Ok(ProgressSnapshot {
        percent: 12.0,
        next_poll_ms: Some(200),
        ..Default::default()
    }));
    let poller = ProgressPoller::new(PollSchedule::default());

    let handle = poller.start("acme", claim.progress_token(), source.clone(), board.clone());
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    handle.stop().await;

    assert_eq!(source.gaps_ms(), vec![1000, 1000, 1000, 1000]);
}

#[tokio::test(start_paused = true)]
async fn test_late_server_suggestion_overrides_back_off() {
    let board = board();
    let claim = board.claim(StepKey::AdCopy, "Starting").unwrap();
    let source = TimedSource::new(Ok(ProgressSnapshot {
        percent: 60.0,
        next_poll_ms: Some(1500),
        ..Default::default()
    }));
    let config = PollConfig {
        early_window_ms: 0,
        ..Default::default()
    };
    let poller = ProgressPoller::new(PollSchedule::from(&config));

    let handle = poller.start("acme", claim.progress_token(), source.clone(), board.clone());
    tokio::time::sleep(Duration::from_millis(5_600)).await;
    handle.stop().await;

    assert_eq!(source.gaps_ms(), vec![1500, 1500, 1500]);
}

#[tokio::test(start_paused = true)]
async fn test_stopped_poller_never_fires_again() {
    let board = board();
    let claim = board.claim(StepKey::SiteScrape, "Starting").unwrap();
    let source = TimedSource::new(running(25.0));
    let poller = ProgressPoller::new(PollSchedule::default());

    let handle = poller.start("acme", claim.progress_token(), source.clone(), board.clone());
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(source.calls(), 2);

    handle.stop().await;
    assert!(!poller.is_active("acme"));

    // Well past every delay the schedule could choose.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(board.progress(StepKey::SiteScrape).0, 25.0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_board_silences_running_poller() {
    let board = board();
    let claim = board.claim(StepKey::SiteScrape, "Starting").unwrap();
    let source = TimedSource::new(running(25.0));
    let poller = ProgressPoller::new(PollSchedule::default());

    let handle = poller.start("acme", claim.progress_token(), source.clone(), board.clone());
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(source.calls(), 1);

    // A project switch makes the attempt stale; the next tick ends the task.
    board.reset("globex");
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(source.calls(), 2);
    assert!(handle.is_finished());
    assert_eq!(board.progress(StepKey::SiteScrape).0, 0.0);
}
