//! Concurrent bulk transfer engine for Swift object storage.
//!
//! A [`TransferJob`] authenticates once, then runs a fixed pool of workers
//! that pull [`WorkItem`]s from a bounded [`WorkQueue`]. Items come from a
//! local scan (uploads) or from a paginated container listing that runs in
//! the background and pauses while the queue is full (downloads and
//! deletes).
//!
//! Expired tokens are refreshed through a shared [`Session`] so concurrent
//! expirations cost a single identity request. Per-item failures are
//! collected as [`ErrorRecord`]s in the final [`TransferReport`]; only
//! authentication problems and an unreadable first listing page abort a job.
//!
//! # Example
//!
//! ```no_run
//! use posthaste_core::{Credentials, IdentityScheme, TransferConfig};
//! use posthaste_transfer::TransferJob;
//!
//! # async fn run() -> Result<(), posthaste_transfer::TransferError> {
//! let config = TransferConfig::new("backups");
//! let credentials = Credentials::new(IdentityScheme::ApiKey, "alice", "secret", "DFW");
//! let job = TransferJob::with_credentials(config, credentials)?;
//!
//! let report = job.delete().await?;
//! println!("{} failures", report.errors.len());
//! # Ok(())
//! # }
//! ```
//!
//! [`WorkItem`]: posthaste_core::WorkItem
//! [`ErrorRecord`]: posthaste_core::ErrorRecord

mod aggregator;
mod context;
mod error;
mod identity;
mod job;
mod listing;
mod progress;
mod queue;
mod session;
mod store;
mod swift;
mod worker;

pub use aggregator::ErrorLog;
pub use error::{AuthError, StoreError, TransferError};
pub use identity::{
    Authenticator, CatalogEndpoint, CatalogService, Grant, IdentityClient, parse_grant,
    request_body, select_endpoint,
};
pub use job::TransferJob;
pub use progress::{TransferProgress, TransferReport, TransferSummary};
pub use queue::{Producer, WorkQueue};
pub use session::{Session, SessionToken};
pub use store::{Listing, ObjectResponse, ObjectStore, expected_status, prepare_destination};
pub use swift::{SwiftStore, listing_url, object_url};
pub use worker::download_path;

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("posthaste/", env!("CARGO_PKG_VERSION"));
