//! Append-only log trail of a run.

use log::info;
use mp_protocol::{Event, LogEntry};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Timestamped log of every transition within one run.
///
/// Each line is mirrored to the `log` facade and emitted as
/// [`Event::RunLogLine`].
pub struct RunLog {
    run_id: Uuid,
    entries: Mutex<Vec<LogEntry>>,
    events_tx: Option<UnboundedSender<Event>>,
}

impl RunLog {
    pub fn new(run_id: Uuid, events_tx: Option<UnboundedSender<Event>>) -> Self {
        Self {
            run_id,
            entries: Mutex::new(Vec::new()),
            events_tx,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn append(&self, message: impl Into<String>) {
        let entry = LogEntry::now(message);
        info!("[run {}] {}", self.run_id, entry.message);
        self.entries.lock().push(entry.clone());
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(Event::RunLogLine {
                run_id: self.run_id,
                entry,
            });
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|entry| entry.message.contains(needle))
    }
}
