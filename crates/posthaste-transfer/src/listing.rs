//! Paginated container listing feeding the work queue.

use std::sync::Arc;

use tracing::{debug, info, warn};

use posthaste_core::WorkItem;

use crate::context::TransferContext;
use crate::error::TransferError;
use crate::queue::Producer;
use crate::store::Listing;

/// Lists a container page by page and enqueues one item per object name.
///
/// Holding a `Lister` keeps the queue open; dropping it tells the workers
/// no more names are coming.
pub(crate) struct Lister {
    ctx: Arc<TransferContext>,
    producer: Producer<WorkItem>,
    make_item: fn(String) -> WorkItem,
}

impl Lister {
    pub fn new(
        ctx: Arc<TransferContext>,
        producer: Producer<WorkItem>,
        make_item: fn(String) -> WorkItem,
    ) -> Self {
        Self {
            ctx,
            producer,
            make_item,
        }
    }

    /// Fetch and enqueue the first page.
    ///
    /// Returns the marker for the next page when this one was full. Any
    /// failure other than an expired token is fatal.
    pub async fn list_initial(&self) -> Result<Option<String>, TransferError> {
        let ctx = &self.ctx;
        let page_size = ctx.config.page_size;

        let names = loop {
            let session = ctx.session.current();
            let fatal = |reason: String| TransferError::Listing {
                container: ctx.container().to_string(),
                reason,
            };

            match ctx
                .store
                .list_objects(&session.endpoint, &session.token, ctx.container(), None, page_size)
                .await
            {
                Ok(Listing::Page(names)) => break names,
                Ok(Listing::Failed(resp)) if resp.is_unauthorized() => {
                    ctx.session.refresh(&session).await?;
                }
                Ok(Listing::Failed(resp)) => {
                    return Err(fatal(format!("HTTP {}", resp.status)));
                }
                Ok(Listing::Unparsable) => {
                    return Err(fatal("unparsable listing response".to_string()));
                }
                Err(err) => return Err(fatal(err.to_string())),
            }
        };

        let marker = next_marker(&names, page_size);
        info!(
            container = %ctx.container(),
            count = names.len(),
            more = marker.is_some(),
            "listed first page"
        );
        self.enqueue(names).await;
        Ok(marker)
    }

    /// Keep listing from `marker` until a short, empty or unreadable page.
    ///
    /// Expired tokens are refreshed and the same marker retried. Other
    /// failures are retried after a delay until too many happen in a row,
    /// at which point the listing is treated as complete.
    pub async fn list_remaining(self, mut marker: String) -> Result<(), TransferError> {
        let ctx = self.ctx.clone();
        let page_size = ctx.config.page_size;
        let mut failures = 0u32;

        loop {
            if ctx.cancel.is_cancelled() {
                return Ok(());
            }

            let session = ctx.session.current();
            let result = ctx
                .store
                .list_objects(
                    &session.endpoint,
                    &session.token,
                    ctx.container(),
                    Some(&marker),
                    page_size,
                )
                .await;

            let failure = match result {
                Ok(Listing::Page(names)) if names.is_empty() => break,
                Ok(Listing::Page(names)) => {
                    failures = 0;
                    if !self.wait_for_room().await {
                        return Ok(());
                    }

                    let next = next_marker(&names, page_size);
                    debug!(marker = %marker, count = names.len(), "listed page");
                    self.enqueue(names).await;
                    match next {
                        Some(next) => {
                            marker = next;
                            continue;
                        }
                        None => break,
                    }
                }
                Ok(Listing::Unparsable) => {
                    warn!(marker = %marker, "unparsable listing page, stopping");
                    break;
                }
                Ok(Listing::Failed(resp)) if resp.is_unauthorized() => {
                    info!(marker = %marker, "listing token expired");
                    ctx.session.refresh(&session).await?;
                    continue;
                }
                Ok(Listing::Failed(resp)) => format!("HTTP {}", resp.status),
                Err(err) => err.to_string(),
            };

            failures += 1;
            if failures > ctx.config.max_listing_errors {
                warn!(
                    marker = %marker,
                    failures,
                    "too many listing errors, treating listing as complete"
                );
                break;
            }
            warn!(marker = %marker, failures, error = %failure, "listing page failed, retrying");
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(ctx.config.listing_retry_delay) => {}
            }
        }

        info!(container = %ctx.container(), "listing finished");
        Ok(())
    }

    /// Wait until the queue is below its ceiling. Returns false if cancelled.
    async fn wait_for_room(&self) -> bool {
        let ceiling = self.ctx.config.queue_ceiling;
        loop {
            let depth = self.producer.depth();
            if depth < ceiling {
                return true;
            }
            info!(depth, ceiling, "queue over ceiling, pausing listing");
            tokio::select! {
                _ = self.ctx.cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.ctx.config.backpressure_poll) => {}
            }
        }
    }

    async fn enqueue(&self, names: Vec<String>) {
        let count = names.len();
        for name in names {
            tokio::select! {
                _ = self.ctx.cancel.cancelled() => return,
                _ = self.producer.push((self.make_item)(name)) => {}
            }
        }
        self.ctx.progress.add_enqueued(count);
    }
}

/// The last name of a full page, or `None` if the listing ended.
fn next_marker(names: &[String], page_size: usize) -> Option<String> {
    if names.len() >= page_size {
        names.last().cloned()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("obj-{i:05}")).collect()
    }

    #[test]
    fn test_next_marker() {
        assert_eq!(next_marker(&names(3), 3).as_deref(), Some("obj-00002"));
        assert_eq!(next_marker(&names(2), 3), None);
        assert_eq!(next_marker(&[], 3), None);
    }
}
