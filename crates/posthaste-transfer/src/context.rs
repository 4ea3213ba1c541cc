//! State shared by every task of a running job.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use posthaste_core::{Operation, TransferConfig, WorkItem};

use crate::aggregator::ErrorLog;
use crate::progress::ProgressTracker;
use crate::queue::WorkQueue;
use crate::session::Session;
use crate::store::ObjectStore;

pub(crate) struct TransferContext {
    pub config: TransferConfig,
    pub operation: Operation,
    pub store: Arc<dyn ObjectStore>,
    pub session: Arc<Session>,
    pub queue: Arc<WorkQueue<WorkItem>>,
    pub errors: ErrorLog,
    pub progress: ProgressTracker,
    /// Download root; `None` for uploads and deletes.
    pub destination: Option<PathBuf>,
    /// Cancelled on a fatal error or from outside the job.
    pub cancel: CancellationToken,
}

impl TransferContext {
    pub fn container(&self) -> &str {
        &self.config.container
    }
}
