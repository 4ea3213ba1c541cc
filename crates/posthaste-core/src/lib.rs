//! Core types and configuration for posthaste.
//!
//! This crate provides the data model shared by the scanning and transfer
//! crates: work items, credentials, per-item error records, the engine
//! configuration and the optional settings file.

mod config;
mod credentials;
mod error;
mod item;
mod record;
mod settings;

pub use config::{TransferConfig, TransferConfigBuilder};
pub use credentials::{Credentials, IdentityScheme, ServiceSelector, DEFAULT_AUTH_URL};
pub use error::{ConfigError, ScanError, ScanWarning, WarningKind};
pub use item::{Operation, UploadItem, WorkItem, MAX_OBJECT_SIZE};
pub use record::{ErrorDetail, ErrorRecord};
pub use settings::Settings;
