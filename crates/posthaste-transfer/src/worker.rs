//! The worker loop: pull an item, run it, record the outcome.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use posthaste_core::{ErrorRecord, MAX_OBJECT_SIZE, UploadItem, WorkItem};

use crate::context::TransferContext;
use crate::error::{StoreError, TransferError};
use crate::session::SessionToken;
use crate::store::{ObjectResponse, expected_status};

/// How a single item ended.
#[derive(Debug)]
pub(crate) enum ItemOutcome {
    Transferred { bytes: u64 },
    Failed(ErrorRecord),
}

/// Run items until the queue is closed and drained.
///
/// Only fatal conditions (authentication, re-auth limit, cancellation) end
/// a worker with an error; everything else becomes an error record.
pub(crate) async fn run_worker(ctx: Arc<TransferContext>, id: usize) -> Result<(), TransferError> {
    info!(worker = id, operation = %ctx.operation, "worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(TransferError::Cancelled),
            next = ctx.queue.pop() => next,
        };
        let Some(item) = next else {
            break;
        };

        debug!(worker = id, operation = %item.operation(), name = %item.name(), "processing");
        let outcome = match process(&ctx, &item).await {
            Ok(outcome) => outcome,
            Err(err) => {
                // Stop the producers too; they may be blocked on a full queue.
                ctx.cancel.cancel();
                return Err(err);
            }
        };
        match outcome {
            ItemOutcome::Transferred { bytes } => {
                ctx.progress.item_completed(bytes, ctx.queue.len());
            }
            ItemOutcome::Failed(record) => {
                ctx.errors.record(record);
                ctx.progress.item_failed(ctx.queue.len());
            }
        }
    }

    info!(worker = id, "worker finished");
    Ok(())
}

async fn process(ctx: &TransferContext, item: &WorkItem) -> Result<ItemOutcome, TransferError> {
    let failed = |message: String| -> Result<ItemOutcome, TransferError> {
        Ok(ItemOutcome::Failed(ErrorRecord::exception(
            item.name(),
            ctx.container(),
            message,
        )))
    };

    let dest = match item {
        WorkItem::Upload(upload) if upload.exceeds_object_limit() => {
            return failed(oversized_message(upload));
        }
        WorkItem::Download { name } => {
            let root = ctx.destination.as_deref().unwrap_or(Path::new("."));
            match download_path(root, name) {
                Ok(path) if name.ends_with('/') => {
                    return match tokio::fs::create_dir_all(&path).await {
                        Ok(()) => Ok(ItemOutcome::Transferred { bytes: 0 }),
                        Err(err) => failed(StoreError::io(path, err).to_string()),
                    };
                }
                Ok(path) => Some(path),
                Err(err) => return failed(err.to_string()),
            }
        }
        _ => None,
    };

    let mut session = ctx.session.current();
    loop {
        match attempt(ctx, item, &session, dest.as_deref()).await {
            Ok(resp) if resp.status == expected_status(item.operation()) => {
                return Ok(ItemOutcome::Transferred { bytes: resp.bytes });
            }
            Ok(resp) if resp.is_unauthorized() => {
                debug!(name = %item.name(), "token expired, retrying item");
                session = ctx.session.refresh(&session).await?;
            }
            Ok(resp) => {
                return Ok(ItemOutcome::Failed(
                    resp.into_record(item.name(), ctx.container()),
                ));
            }
            Err(err) => return failed(err.to_string()),
        }
    }
}

/// One request for `item` with the given token.
async fn attempt(
    ctx: &TransferContext,
    item: &WorkItem,
    session: &SessionToken,
    dest: Option<&Path>,
) -> Result<ObjectResponse, StoreError> {
    let (endpoint, token, container) = (&*session.endpoint, &*session.token, ctx.container());
    match item {
        WorkItem::Upload(upload) => ctx.store.put_object(endpoint, token, container, upload).await,
        WorkItem::Download { name } => {
            let dest = dest.ok_or_else(|| StoreError::UnsafeName { name: name.clone() })?;
            ctx.store
                .get_object(endpoint, token, container, name, dest)
                .await
        }
        WorkItem::Delete { name } => {
            ctx.store
                .delete_object(endpoint, token, container, name)
                .await
        }
    }
}

fn oversized_message(item: &UploadItem) -> String {
    format!(
        "File is {} bytes; objects must be smaller than {} bytes",
        item.size, MAX_OBJECT_SIZE
    )
}

/// Local path for a downloaded object under `root`.
///
/// Names that are absolute or contain `..` are rejected.
pub fn download_path(root: &Path, name: &str) -> Result<PathBuf, StoreError> {
    let unsafe_name = || StoreError::UnsafeName {
        name: name.to_string(),
    };

    let relative = Path::new(name);
    let mut has_normal = false;
    for component in relative.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_name());
            }
        }
    }
    if !has_normal {
        return Err(unsafe_name());
    }
    Ok(root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_path_nested() {
        let path = download_path(Path::new("/data"), "photos/2024/cat.jpg").unwrap();
        assert_eq!(path, PathBuf::from("/data/photos/2024/cat.jpg"));
    }

    #[test]
    fn test_download_path_rejects_escapes() {
        for name in ["../etc/passwd", "a/../../b", "/etc/passwd", "", "./"] {
            assert!(
                matches!(
                    download_path(Path::new("/data"), name),
                    Err(StoreError::UnsafeName { .. })
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_oversized_message() {
        let item = UploadItem::new("/tmp/big", "big", MAX_OBJECT_SIZE);
        assert!(oversized_message(&item).contains("5368709120 bytes"));
    }
}
