//! Activity log: most-recent-first record of engine decisions
//!
//! Entries are mirrored to `tracing` so operators see the same story in the
//! process log that users see in the dashboard.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

use shared::{ActivityLogEntry, Severity};

use crate::clock::Clock;

/// Bounded, newest-first activity log
pub struct ActivityLog {
    entries: RwLock<VecDeque<ActivityLogEntry>>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl ActivityLog {
    pub fn new(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    /// Prepend an entry, dropping the oldest once the bound is reached
    pub fn record(&self, message: impl Into<String>, severity: Severity) {
        let entry = ActivityLogEntry {
            timestamp: self.clock.now(),
            message: message.into(),
            severity,
        };

        match severity {
            Severity::Warning => tracing::warn!(severity = %severity, "{}", entry.message),
            Severity::Info | Severity::Action => {
                tracing::info!(severity = %severity, "{}", entry.message)
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push_front(entry);
        entries.truncate(self.max_entries);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(message, Severity::Info);
    }

    pub fn action(&self, message: impl Into<String>) {
        self.record(message, Severity::Action);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.record(message, Severity::Warning);
    }

    /// Up to `limit` entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<ActivityLogEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
