//! Error types for authentication, storage requests and whole jobs.

use std::path::PathBuf;

use thiserror::Error;

use posthaste_core::ScanError;

/// Errors from exchanging credentials for a token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity request never produced a response.
    #[error("Identity request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The identity service answered with a non-success status.
    #[error("Identity service rejected the credentials (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The identity response could not be understood.
    #[error("Malformed identity response: {message}")]
    Malformed { message: String },

    /// The catalog has no storage endpoint for the requested region/interface.
    #[error("No {interface} endpoint for service {service} in region {region}")]
    EndpointNotFound {
        service: String,
        region: String,
        interface: String,
    },
}

/// Errors from a single storage request that produced no usable response.
///
/// These become item-level error records; they never abort a job.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection, timeout or body transfer failure.
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Local file I/O failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The endpoint cannot be combined with the container/object name.
    #[error("Invalid object URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// A downloaded object would land outside the destination directory.
    #[error("Refusing to write object outside the destination: {name}")]
    UnsafeName { name: String },

    /// The name has `.` or `..` segments, which URLs always resolve away.
    #[error("Object name cannot be addressed over HTTP: {name}")]
    UnaddressableName { name: String },

    /// A file changed size between the scan and its upload.
    #[error("{path} changed size since it was scanned ({expected} -> {actual} bytes)")]
    SizeChanged {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

impl StoreError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Conditions that abort an entire job.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Initial authentication or a re-authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Tokens keep expiring; credential exchange is assumed to be broken.
    #[error("Re-authenticated {attempts} times, exceeding the limit of {limit}")]
    ReauthLimitExceeded { attempts: usize, limit: usize },

    /// The first listing page could not be retrieved.
    #[error("Failed to list container {container}: {reason}")]
    Listing { container: String, reason: String },

    /// The upload root could not be scanned.
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    /// The download destination could not be prepared.
    #[error("Cannot use destination {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// A job task panicked or was aborted.
    #[error("Job task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The job was cancelled from outside.
    #[error("Job cancelled")]
    Cancelled,
}
