//! Collection of per-item failures.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

use posthaste_core::ErrorRecord;

/// Append-only log of failed items, shared by all workers.
#[derive(Debug, Default)]
pub struct ErrorLog {
    records: Mutex<Vec<ErrorRecord>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failed item.
    pub fn record(&self, record: ErrorRecord) {
        debug!(name = %record.name, "{record}");
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every record collected so far, in arrival order.
    pub fn drain(&self) -> Vec<ErrorRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
