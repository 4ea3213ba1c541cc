//! Local directory scanning for posthaste uploads.
//!
//! This crate walks an upload root with jwalk and turns every regular file
//! into an [`UploadItem`] whose object name is the file's path relative to
//! the root, joined with `/`.
//!
//! - **Parallel traversal** via jwalk/rayon
//! - **Largest first**: items come back sorted by descending size, so big
//!   slow transfers start early and overlap with the many small ones
//! - **Exclusions** via glob patterns matched against object names
//!
//! # Example
//!
//! ```rust,no_run
//! use posthaste_scan::{LocalScanner, ScanConfig};
//!
//! let config = ScanConfig::new("/path/to/upload");
//! let scan = LocalScanner::new().scan(&config).unwrap();
//!
//! println!("{} files, {} bytes", scan.items.len(), scan.total_bytes);
//! ```

mod config;
mod scanner;

pub use config::{ScanConfig, ScanConfigBuilder};
pub use scanner::{LocalScan, LocalScanner, object_name};

// Re-export core types for convenience
pub use posthaste_core::{ScanError, ScanWarning, UploadItem, WarningKind};
