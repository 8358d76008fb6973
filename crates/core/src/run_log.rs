//! Per-invocation log sink.
//!
//! Every component receives a `&RunLog` for the document it is working on.
//! Entries are mirrored to the `log` facade and returned with the
//! processing result, so two runs never share log state.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Instant;

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Pipeline stage that produced the entry (e.g. "read", "rewrite").
    pub stage: String,

    pub message: String,

    /// Milliseconds since the run started.
    pub elapsed_ms: u64,
}

/// Log sink scoped to a single document-processing run.
#[derive(Debug)]
pub struct RunLog {
    started: Instant,
    entries: Mutex<Vec<LogEntry>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Record an informational entry.
    pub fn info(&self, stage: &str, message: impl Into<String>) {
        let message = message.into();
        log::info!("[{}] {}", stage, message);
        self.push(stage, message);
    }

    /// Record a debug entry.
    pub fn debug(&self, stage: &str, message: impl Into<String>) {
        let message = message.into();
        log::debug!("[{}] {}", stage, message);
        self.push(stage, message);
    }

    /// Record a warning.
    pub fn warn(&self, stage: &str, message: impl Into<String>) {
        let message = message.into();
        log::warn!("[{}] {}", stage, message);
        self.push(stage, message);
    }

    /// Snapshot of the entries recorded so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Consume the sink and return its entries.
    pub fn into_entries(self) -> Vec<LogEntry> {
        match self.entries.into_inner() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn push(&self, stage: &str, message: String) {
        let entry = LogEntry {
            stage: stage.to_string(),
            message,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        };
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}
