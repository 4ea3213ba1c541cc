//! Units of transfer work.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Largest object the storage service accepts in a single PUT (5 GiB).
///
/// Uploads of this size or larger are rejected before any request is made.
pub const MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// The kind of operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Upload,
    Download,
    Delete,
}

impl Operation {
    /// Past-tense verb used in summaries.
    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Upload => "Uploaded",
            Self::Download => "Downloaded",
            Self::Delete => "Deleted",
        }
    }
}

/// A local file to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadItem {
    /// Absolute path of the file on disk.
    pub path: PathBuf,
    /// Object name: the path relative to the upload root, `/`-separated.
    pub name: String,
    /// File size in bytes at scan time.
    pub size: u64,
}

impl UploadItem {
    /// Create a new upload item.
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size,
        }
    }

    /// Whether the file is too large to upload as a single object.
    pub fn exceeds_object_limit(&self) -> bool {
        self.size >= MAX_OBJECT_SIZE
    }
}

/// One unit of work pulled from the queue by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkItem {
    /// Upload a local file.
    Upload(UploadItem),
    /// Download a remote object.
    Download { name: String },
    /// Delete a remote object.
    Delete { name: String },
}

impl WorkItem {
    /// Create a download item.
    pub fn download(name: impl Into<String>) -> Self {
        Self::Download { name: name.into() }
    }

    /// Create a delete item.
    pub fn delete(name: impl Into<String>) -> Self {
        Self::Delete { name: name.into() }
    }

    /// Create a work item of the given remote operation for an object name.
    ///
    /// Returns `None` for [`Operation::Upload`], which needs a local file.
    pub fn remote(operation: Operation, name: impl Into<String>) -> Option<Self> {
        match operation {
            Operation::Upload => None,
            Operation::Download => Some(Self::download(name)),
            Operation::Delete => Some(Self::delete(name)),
        }
    }

    /// The object name this item addresses.
    pub fn name(&self) -> &str {
        match self {
            Self::Upload(item) => &item.name,
            Self::Download { name } | Self::Delete { name } => name,
        }
    }

    /// The operation this item performs.
    pub fn operation(&self) -> Operation {
        match self {
            Self::Upload(_) => Operation::Upload,
            Self::Download { .. } => Operation::Download,
            Self::Delete { .. } => Operation::Delete,
        }
    }
}

impl From<UploadItem> for WorkItem {
    fn from(item: UploadItem) -> Self {
        Self::Upload(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_limit_boundary() {
        let at_limit = UploadItem::new("/tmp/big", "big", MAX_OBJECT_SIZE);
        let below = UploadItem::new("/tmp/big", "big", MAX_OBJECT_SIZE - 1);

        assert_eq!(MAX_OBJECT_SIZE, 5_368_709_120);
        assert!(at_limit.exceeds_object_limit());
        assert!(!below.exceeds_object_limit());
    }

    #[test]
    fn test_operation_parse_and_display() {
        assert_eq!("delete".parse::<Operation>().unwrap(), Operation::Delete);
        assert_eq!(Operation::Download.to_string(), "download");
        assert_eq!(Operation::Upload.past_tense(), "Uploaded");
    }

    #[test]
    fn test_remote_items() {
        assert!(WorkItem::remote(Operation::Upload, "a").is_none());
        let item = WorkItem::remote(Operation::Delete, "photos/a.jpg").unwrap();
        assert_eq!(item.name(), "photos/a.jpg");
        assert_eq!(item.operation(), Operation::Delete);
    }
}
