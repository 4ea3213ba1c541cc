//! Progress counters, live snapshots and the final job report.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use posthaste_core::{ErrorRecord, Operation};

/// Snapshots kept for slow subscribers before they start lagging.
const PROGRESS_CHANNEL_SIZE: usize = 64;

/// Create the sender half of a progress channel.
pub(crate) fn progress_channel() -> broadcast::Sender<TransferProgress> {
    broadcast::channel(PROGRESS_CHANNEL_SIZE).0
}

/// A point-in-time view of a running job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub operation: Operation,
    /// Items handed to the queue so far.
    pub enqueued: usize,
    /// Items that finished successfully.
    pub completed: usize,
    /// Items that produced an error record.
    pub failed: usize,
    /// Payload bytes moved by successful items.
    pub bytes: u64,
    /// Items waiting in the queue.
    pub queue_depth: usize,
}

impl TransferProgress {
    /// Items that have finished either way.
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }
}

/// Lock-free job counters with an optional broadcast of snapshots.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    operation: Operation,
    enqueued: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    bytes: AtomicU64,
    started: Instant,
    tx: broadcast::Sender<TransferProgress>,
}

impl ProgressTracker {
    /// Publish snapshots on an existing channel.
    pub fn with_sender(operation: Operation, tx: broadcast::Sender<TransferProgress>) -> Self {
        Self {
            operation,
            enqueued: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            bytes: AtomicU64::new(0),
            started: Instant::now(),
            tx,
        }
    }

    pub fn add_enqueued(&self, count: usize) {
        self.enqueued.fetch_add(count, Ordering::Relaxed);
    }

    pub fn item_completed(&self, bytes: u64, queue_depth: usize) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.publish(queue_depth);
    }

    pub fn item_failed(&self, queue_depth: usize) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.publish(queue_depth);
    }

    fn publish(&self, queue_depth: usize) {
        if self.tx.receiver_count() > 0 {
            // Lagging or departed receivers are not our problem.
            let _ = self.tx.send(self.snapshot(queue_depth));
        }
    }

    pub fn snapshot(&self, queue_depth: usize) -> TransferProgress {
        TransferProgress {
            operation: self.operation,
            enqueued: self.enqueued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            queue_depth,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Totals for a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSummary {
    pub completed: usize,
    pub failed: usize,
    pub bytes: u64,
    pub reauths: usize,
    pub duration: Duration,
}

/// Outcome of a job that ran to the end.
///
/// A job that finishes with error records is degraded, not failed: every
/// other item was still attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReport {
    pub operation: Operation,
    pub container: String,
    pub errors: Vec<ErrorRecord>,
    pub summary: TransferSummary,
}

impl TransferReport {
    /// True when no item failed.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn summary(&self) -> &TransferSummary {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshots_are_broadcast() {
        let tx = progress_channel();
        let mut rx = tx.subscribe();
        let tracker = ProgressTracker::with_sender(Operation::Delete, tx);

        tracker.add_enqueued(3);
        tracker.item_completed(0, 2);
        tracker.item_failed(1);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.completed, 1);
        assert_eq!(first.queue_depth, 2);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.failed, 1);
        assert_eq!(second.processed(), 2);
        assert_eq!(second.enqueued, 3);
    }

    #[test]
    fn test_report_success() {
        let summary = TransferSummary {
            completed: 1,
            failed: 0,
            bytes: 10,
            reauths: 0,
            duration: Duration::from_secs(1),
        };
        let mut report = TransferReport {
            operation: Operation::Upload,
            container: "media".to_string(),
            errors: Vec::new(),
            summary,
        };
        assert!(report.is_success());

        report
            .errors
            .push(ErrorRecord::exception("a", "media", "boom"));
        assert!(!report.is_success());
    }
}
