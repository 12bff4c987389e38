//! Per-session status board.
//!
//! The board holds one [`StepStatus`] and one progress reading per step.
//! Every change is pushed to the front-end as an [`Event`].
//!
//! Only a runner holding a [`StepClaim`] can move a step into or out of
//! `running`. Claims carry an epoch, and progress writes tagged with a stale
//! epoch are dropped, so a late poll tick can never overwrite a newer
//! attempt or the runner's final status.

use crate::remote::error::StepError;
use log::debug;
use mp_protocol::{Event, StepKey, StepState, StepStatus};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Default)]
struct Slot {
    status: StepStatus,
    epoch: u64,
    claimed: bool,
    percent: f64,
    progress_message: Option<String>,
}

#[derive(Debug, Default)]
struct BoardInner {
    project_id: String,
    slots: HashMap<StepKey, Slot>,
    next_epoch: u64,
}

/// Exclusive ownership of a step for one attempt.
///
/// Obtained from [`StatusBoard::claim`] and consumed by
/// [`StatusBoard::finish`].
#[derive(Debug)]
pub struct StepClaim {
    key: StepKey,
    epoch: u64,
}

impl StepClaim {
    pub fn key(&self) -> StepKey {
        self.key
    }

    /// A copyable token allowing progress writes for this attempt only.
    pub fn progress_token(&self) -> ProgressToken {
        ProgressToken {
            key: self.key,
            epoch: self.epoch,
        }
    }
}

/// Write access to a step's progress for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressToken {
    pub key: StepKey,
    pub epoch: u64,
}

/// Status and progress of every step for the active project.
pub struct StatusBoard {
    inner: Mutex<BoardInner>,
    events_tx: Option<UnboundedSender<Event>>,
}

impl StatusBoard {
    pub fn new(events_tx: Option<UnboundedSender<Event>>) -> Self {
        Self {
            inner: Mutex::new(BoardInner::default()),
            events_tx,
        }
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(event);
        }
    }

    fn emit_status(&self, project_id: String, step: StepKey, status: StepStatus) {
        self.emit(Event::StepStatusUpdate {
            project_id,
            step,
            status,
        });
    }

    /// Current status of a step. Unknown steps read as idle.
    pub fn get(&self, key: StepKey) -> StepStatus {
        self.inner
            .lock()
            .slots
            .get(&key)
            .map(|slot| slot.status.clone())
            .unwrap_or_default()
    }

    /// Replace the status of an unclaimed step.
    ///
    /// Returns `false` without writing if a runner currently owns the step
    /// or if `status` is `running`, which only [`claim`](Self::claim) may
    /// set.
    pub fn set(&self, key: StepKey, status: StepStatus) -> bool {
        let project_id = {
            let mut inner = self.inner.lock();
            let slot = inner.slots.entry(key).or_default();
            if slot.claimed || status.status == StepState::Running {
                return false;
            }
            slot.status = status.clone();
            inner.project_id.clone()
        };
        self.emit_status(project_id, key, status);
        true
    }

    /// Take exclusive ownership of a step and mark it running.
    pub fn claim(&self, key: StepKey, message: impl Into<String>) -> Result<StepClaim, StepError> {
        let status = StepStatus::running(message);
        let (project_id, epoch) = {
            let mut inner = self.inner.lock();
            inner.next_epoch += 1;
            let epoch = inner.next_epoch;
            let slot = inner.slots.entry(key).or_default();
            if slot.claimed {
                return Err(StepError::AlreadyRunning(key));
            }
            slot.claimed = true;
            slot.epoch = epoch;
            slot.status = status.clone();
            slot.percent = 0.0;
            slot.progress_message = None;
            (inner.project_id.clone(), epoch)
        };
        self.emit_status(project_id, key, status);
        Ok(StepClaim { key, epoch })
    }

    /// Record a progress reading for the attempt identified by `token`.
    ///
    /// Returns `false` when the attempt is no longer the live one.
    pub fn report_progress(&self, token: ProgressToken, percent: f64, message: Option<String>) -> bool {
        let project_id = {
            let mut inner = self.inner.lock();
            let Some(slot) = inner.slots.get_mut(&token.key) else {
                return false;
            };
            if !slot.claimed || slot.epoch != token.epoch {
                debug!("dropping stale progress for {} (epoch {})", token.key, token.epoch);
                return false;
            }
            slot.percent = percent;
            slot.progress_message = message.clone();
            inner.project_id.clone()
        };
        self.emit(Event::StepProgressUpdate {
            project_id,
            step: token.key,
            percent,
            message,
        });
        true
    }

    /// Release a claim and record the attempt's final status.
    pub fn finish(&self, claim: StepClaim, status: StepStatus) {
        let project_id = {
            let mut inner = self.inner.lock();
            let Some(slot) = inner.slots.get_mut(&claim.key) else {
                return;
            };
            if slot.epoch != claim.epoch {
                return;
            }
            slot.claimed = false;
            slot.status = status.clone();
            if status.status == StepState::Success {
                slot.percent = 100.0;
            }
            inner.project_id.clone()
        };
        self.emit_status(project_id, claim.key, status);
    }

    /// Latest progress reading of a step.
    pub fn progress(&self, key: StepKey) -> (f64, Option<String>) {
        self.inner
            .lock()
            .slots
            .get(&key)
            .map(|slot| (slot.percent, slot.progress_message.clone()))
            .unwrap_or((0.0, None))
    }

    pub fn is_running(&self, key: StepKey) -> bool {
        self.inner
            .lock()
            .slots
            .get(&key)
            .is_some_and(|slot| slot.claimed)
    }

    pub fn project_id(&self) -> String {
        self.inner.lock().project_id.clone()
    }

    /// Status of every step that has been touched this session.
    pub fn snapshot(&self) -> BTreeMap<StepKey, StepStatus> {
        self.inner
            .lock()
            .slots
            .iter()
            .map(|(key, slot)| (*key, slot.status.clone()))
            .collect()
    }

    /// Forget every status and bind the board to another project.
    ///
    /// Outstanding claims become stale: their progress writes and final
    /// status are dropped.
    pub fn reset(&self, project_id: &str) {
        let mut inner = self.inner.lock();
        inner.project_id = project_id.to_string();
        inner.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_get_unknown_step_is_idle() {
        let board = StatusBoard::new(None);
        assert_eq!(board.get(StepKey::Report), StepStatus::idle());
    }

    #[test]
    fn test_set_replaces_exactly_one_key() {
        let board = StatusBoard::new(None);
        assert!(board.set(StepKey::SiteScrape, StepStatus::success("done")));
        assert_eq!(board.get(StepKey::SiteScrape).status, StepState::Success);
        assert_eq!(board.get(StepKey::AdCopy).status, StepState::Idle);
    }

    #[test]
    fn test_set_cannot_write_running_or_touch_claimed_step() {
        let board = StatusBoard::new(None);
        assert!(!board.set(StepKey::AdCopy, StepStatus::running("sneaky")));

        let claim = board.claim(StepKey::AdCopy, "Starting").unwrap();
        assert!(!board.set(StepKey::AdCopy, StepStatus::idle()));
        assert_eq!(board.get(StepKey::AdCopy).status, StepState::Running);

        board.finish(claim, StepStatus::error("boom"));
        assert_eq!(board.get(StepKey::AdCopy), StepStatus::error("boom"));
    }

    #[test]
    fn test_second_claim_is_rejected() {
        let board = StatusBoard::new(None);
        let claim = board.claim(StepKey::KeywordEnrichment, "Starting").unwrap();
        assert_eq!(
            board.claim(StepKey::KeywordEnrichment, "Starting").unwrap_err(),
            StepError::AlreadyRunning(StepKey::KeywordEnrichment)
        );

        board.finish(claim, StepStatus::success("ok"));
        assert!(board.claim(StepKey::KeywordEnrichment, "Again").is_ok());
    }

    #[test]
    fn test_stale_progress_is_dropped() {
        let board = StatusBoard::new(None);
        let first = board.claim(StepKey::SiteScrape, "Starting").unwrap();
        let stale = first.progress_token();
        assert!(board.report_progress(stale, 10.0, None));

        board.finish(first, StepStatus::success("ok"));
        assert!(!board.report_progress(stale, 20.0, None));
        assert_eq!(board.progress(StepKey::SiteScrape).0, 100.0);

        let second = board.claim(StepKey::SiteScrape, "Starting").unwrap();
        assert!(!board.report_progress(stale, 30.0, None));
        assert!(board.report_progress(second.progress_token(), 5.0, Some("page 2".into())));
        assert_eq!(
            board.progress(StepKey::SiteScrape),
            (5.0, Some("page 2".to_string()))
        );
    }

    #[test]
    fn test_reset_clears_statuses() {
        let board = StatusBoard::new(None);
        board.reset("acme");
        board.set(StepKey::Report, StepStatus::success("ok"));
        board.reset("globex");

        assert_eq!(board.project_id(), "globex");
        assert!(board.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_changes_are_emitted_as_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let board = StatusBoard::new(Some(tx));
        board.reset("acme");

        let claim = board.claim(StepKey::SeedKeywords, "Starting").unwrap();
        board.report_progress(claim.progress_token(), 40.0, None);
        board.finish(claim, StepStatus::success("12 seeds"));

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            Event::StepStatusUpdate { ref project_id, step: StepKey::SeedKeywords, ref status }
                if project_id == "acme" && status.status == StepState::Running
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            Event::StepProgressUpdate { percent, .. } if percent == 40.0
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            Event::StepStatusUpdate { status, .. } if status.status == StepState::Success
        ));
    }
}
