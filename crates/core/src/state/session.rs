//! Pipeline session: the owner of the status board and the busy flag.
//!
//! A session tracks one active project at a time. Starting a run takes the
//! busy flag for the run's whole duration, so no step can start while
//! another run holds it. Switching to a different project resets every step
//! status to idle.

use crate::engine::error::RunError;
use crate::state::board::StatusBoard;
use log::info;
use mp_protocol::Event;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

pub struct Session {
    board: Arc<StatusBoard>,
    busy: AtomicBool,
    active_project: Mutex<Option<String>>,
    halt: Mutex<CancellationToken>,
}

impl Session {
    pub fn new(events_tx: Option<UnboundedSender<Event>>) -> Self {
        Self {
            board: Arc::new(StatusBoard::new(events_tx)),
            busy: AtomicBool::new(false),
            active_project: Mutex::new(None),
            halt: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn board(&self) -> &Arc<StatusBoard> {
        &self.board
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn active_project(&self) -> Option<String> {
        self.active_project.lock().clone()
    }

    /// Make `project_id` the active project.
    ///
    /// Returns `true` if the project changed and the board was reset.
    ///
    /// # Errors
    ///
    /// Returns `RunError::ProjectSwitchWhileBusy` if a run is in progress.
    pub fn switch_project(&self, project_id: &str) -> Result<bool, RunError> {
        if self.is_busy() {
            return Err(RunError::ProjectSwitchWhileBusy);
        }
        Ok(self.activate(project_id))
    }

    fn activate(&self, project_id: &str) -> bool {
        let mut active = self.active_project.lock();
        if active.as_deref() == Some(project_id) {
            return false;
        }
        info!("Active project is now {project_id}; step statuses reset");
        self.board.reset(project_id);
        *active = Some(project_id.to_string());
        true
    }

    /// Take the busy flag for a run against `project_id`.
    ///
    /// The flag is released when the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// - `RunError::MissingProjectId` if `project_id` is blank
    /// - `RunError::Busy` if another run holds the session
    pub fn begin_run(&self, project_id: &str) -> Result<RunGuard<'_>, RunError> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(RunError::MissingProjectId);
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let holder = self
                .active_project()
                .unwrap_or_else(|| project_id.to_string());
            return Err(RunError::Busy(holder));
        }

        self.activate(project_id);

        let halt = CancellationToken::new();
        *self.halt.lock() = halt.clone();

        Ok(RunGuard {
            session: self,
            project_id: project_id.to_string(),
            halt,
        })
    }

    /// Ask the current run to stop before its next step.
    ///
    /// An in-flight remote call is allowed to finish; a pending rerun
    /// confirmation is abandoned. Returns `false` when
    /// no run is in progress.
    pub fn halt(&self) -> bool {
        if !self.is_busy() {
            return false;
        }
        self.halt.lock().cancel();
        true
    }
}

/// Proof that a run holds the session's busy flag.
pub struct RunGuard<'a> {
    session: &'a Session,
    project_id: String,
    halt: CancellationToken,
}

impl RunGuard<'_> {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_cancelled()
    }

    /// Token cancelled by [`Session::halt`] for this run.
    pub fn halt_token(&self) -> &CancellationToken {
        &self.halt
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.session.busy.store(false, Ordering::SeqCst);
    }
}
