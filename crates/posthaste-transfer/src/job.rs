//! Job orchestration: start the session, spawn workers, feed the queue and
//! collect the report.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use posthaste_core::{Credentials, Operation, TransferConfig, UploadItem, WorkItem};
use posthaste_scan::{LocalScanner, ScanConfig};

use crate::aggregator::ErrorLog;
use crate::context::TransferContext;
use crate::error::TransferError;
use crate::identity::{Authenticator, IdentityClient};
use crate::listing::Lister;
use crate::progress::{
    ProgressTracker, TransferProgress, TransferReport, TransferSummary, progress_channel,
};
use crate::queue::{Producer, WorkQueue};
use crate::session::Session;
use crate::store::ObjectStore;
use crate::swift::SwiftStore;

type Tasks = JoinSet<Result<(), TransferError>>;

/// Where a job's work items come from.
enum Feed {
    /// A fixed list, already in enqueue order.
    Items(Vec<UploadItem>),
    /// A container listing, one item per object name.
    Listing(fn(String) -> WorkItem),
}

/// A bulk transfer against one container.
///
/// Each run authenticates, starts `threads` workers and a producer, and
/// returns a [`TransferReport`] once every item has been attempted. Fatal
/// errors abort all tasks and are returned as [`TransferError`].
pub struct TransferJob {
    config: TransferConfig,
    store: Arc<dyn ObjectStore>,
    authenticator: Arc<dyn Authenticator>,
    cancel: CancellationToken,
    progress: broadcast::Sender<TransferProgress>,
}

impl TransferJob {
    /// Create a job with explicit store and authenticator implementations.
    pub fn new(
        config: TransferConfig,
        store: Arc<dyn ObjectStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            config,
            store,
            authenticator,
            cancel: CancellationToken::new(),
            progress: progress_channel(),
        }
    }

    /// Create a job that talks HTTP to the identity service and Swift.
    pub fn with_credentials(
        config: TransferConfig,
        credentials: Credentials,
    ) -> Result<Self, TransferError> {
        let store = Arc::new(SwiftStore::new(&config)?);
        let authenticator = Arc::new(IdentityClient::new(credentials, &config)?);
        Ok(Self::new(config, store, authenticator))
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Receive a progress snapshot after each finished item.
    pub fn subscribe(&self) -> broadcast::Receiver<TransferProgress> {
        self.progress.subscribe()
    }

    /// Token that cancels the job when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Upload every regular file under the scan root.
    pub async fn upload(&self, scan: ScanConfig) -> Result<TransferReport, TransferError> {
        let scan = tokio::task::spawn_blocking(move || LocalScanner::new().scan(&scan)).await??;
        info!(
            root = %scan.root.display(),
            files = scan.items.len(),
            bytes = scan.total_bytes,
            warnings = scan.warnings.len(),
            duration = ?scan.scan_duration,
            "scan complete"
        );
        self.run(Operation::Upload, None, Feed::Items(scan.items))
            .await
    }

    /// Upload the given files, largest first.
    pub async fn upload_items(
        &self,
        mut items: Vec<UploadItem>,
    ) -> Result<TransferReport, TransferError> {
        items.sort_by(|a, b| b.size.cmp(&a.size));
        self.run(Operation::Upload, None, Feed::Items(items)).await
    }

    /// Download every object of the container below `destination`.
    pub async fn download(
        &self,
        destination: impl Into<PathBuf>,
    ) -> Result<TransferReport, TransferError> {
        let destination = destination.into();
        tokio::fs::create_dir_all(&destination)
            .await
            .map_err(|source| TransferError::Destination {
                path: destination.clone(),
                source,
            })?;
        self.run(
            Operation::Download,
            Some(destination),
            Feed::Listing(|name| WorkItem::download(name)),
        )
        .await
    }

    /// Delete every object of the container.
    pub async fn delete(&self) -> Result<TransferReport, TransferError> {
        self.run(Operation::Delete, None, Feed::Listing(|name| WorkItem::delete(name)))
            .await
    }

    async fn run(
        &self,
        operation: Operation,
        destination: Option<PathBuf>,
        feed: Feed,
    ) -> Result<TransferReport, TransferError> {
        let session = Arc::new(
            Session::start(self.authenticator.clone(), self.config.reauth_limit()).await?,
        );
        let (queue, producer) = WorkQueue::new(self.config.queue_ceiling);
        let cancel = self.cancel.child_token();

        let ctx = Arc::new(TransferContext {
            config: self.config.clone(),
            operation,
            store: self.store.clone(),
            session: session.clone(),
            queue,
            errors: ErrorLog::new(),
            progress: ProgressTracker::with_sender(operation, self.progress.clone()),
            destination,
            cancel: cancel.clone(),
        });

        info!(
            operation = %operation,
            container = %self.config.container,
            threads = self.config.threads,
            "starting job"
        );

        // Workers run before anything is enqueued, so a full queue always drains.
        let mut tasks: Tasks = JoinSet::new();
        for id in 0..self.config.threads {
            tasks.spawn(crate::worker::run_worker(ctx.clone(), id));
        }

        match feed {
            Feed::Items(items) => {
                tasks.spawn(feed_items(ctx.clone(), producer, items));
            }
            Feed::Listing(make_item) => {
                let lister = Lister::new(ctx.clone(), producer, make_item);
                let initial = tokio::select! {
                    _ = cancel.cancelled() => Err(TransferError::Cancelled),
                    initial = lister.list_initial() => initial,
                };
                match initial {
                    Ok(Some(marker)) => {
                        tasks.spawn(lister.list_remaining(marker));
                    }
                    Ok(None) => drop(lister),
                    Err(err) => {
                        drop(lister);
                        cancel.cancel();
                        // A worker that failed first is why the listing was cancelled.
                        return Err(match supervise(&cancel, tasks).await {
                            Err(fatal) if !matches!(fatal, TransferError::Cancelled) => fatal,
                            _ => {
                                error!(error = %err, "initial listing failed");
                                err
                            }
                        });
                    }
                }
            }
        }

        supervise(&cancel, tasks).await?;

        let errors = ctx.errors.drain();
        let snapshot = ctx.progress.snapshot(ctx.queue.len());
        let report = TransferReport {
            operation,
            container: self.config.container.clone(),
            summary: TransferSummary {
                completed: snapshot.completed,
                failed: errors.len(),
                bytes: snapshot.bytes,
                reauths: session.reauth_count(),
                duration: ctx.progress.elapsed(),
            },
            errors,
        };

        if report.is_success() {
            info!(completed = report.summary.completed, "job finished");
        } else {
            warn!(
                completed = report.summary.completed,
                failed = report.summary.failed,
                "job finished with errors"
            );
        }
        Ok(report)
    }
}

/// Push pre-built upload items in order.
async fn feed_items(
    ctx: Arc<TransferContext>,
    producer: Producer<WorkItem>,
    items: Vec<UploadItem>,
) -> Result<(), TransferError> {
    for item in items {
        tokio::select! {
            _ = ctx.cancel.cancelled() => return Ok(()),
            _ = producer.push(WorkItem::Upload(item)) => ctx.progress.add_enqueued(1),
        }
    }
    Ok(())
}

/// Wait for every task; on the first fatal error cancel and abort the rest.
///
/// Tasks that stop because of the cancellation are not the cause, so a
/// later non-cancellation error replaces a `Cancelled` one.
async fn supervise(cancel: &CancellationToken, mut tasks: Tasks) -> Result<(), TransferError> {
    let mut fatal: Option<TransferError> = None;
    while let Some(joined) = tasks.join_next().await {
        let err = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => err,
            Err(join) if join.is_cancelled() => continue,
            Err(join) => TransferError::Task(join),
        };
        match fatal {
            None => {
                error!(error = %err, "aborting job");
                cancel.cancel();
                tasks.abort_all();
                fatal = Some(err);
            }
            Some(TransferError::Cancelled) if !matches!(err, TransferError::Cancelled) => {
                fatal = Some(err);
            }
            Some(_) => {}
        }
    }
    fatal.map_or(Ok(()), Err)
}
