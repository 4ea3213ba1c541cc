//! The object storage seam used by the lister and workers.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use posthaste_core::{ErrorRecord, Operation, UploadItem};

use crate::error::StoreError;

/// What came back from a storage request.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectResponse {
    pub status: StatusCode,
    pub headers: BTreeMap<String, String>,
    /// Body parsed as JSON. Only populated for unexpected statuses.
    pub body: Option<Value>,
    /// Payload bytes moved by the request.
    pub bytes: u64,
}

impl ObjectResponse {
    /// A response with a status and nothing else.
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: None,
            bytes: 0,
        }
    }

    /// Attach a transferred byte count.
    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = bytes;
        self
    }

    /// Whether the token was rejected.
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// Turn an unexpected response into an item error record.
    pub fn into_record(self, name: impl Into<String>, container: impl Into<String>) -> ErrorRecord {
        ErrorRecord::response(name, container, self.status.as_u16(), self.headers, self.body)
    }
}

/// One listing request's outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// Object names in ascending order (possibly empty).
    Page(Vec<String>),
    /// A success status with a body that is not a name array.
    Unparsable,
    /// A non-success status.
    Failed(ObjectResponse),
}

/// Requests against a container, authorized by a token and endpoint.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch up to `limit` names sorting after `marker`.
    async fn list_objects(
        &self,
        endpoint: &str,
        token: &str,
        container: &str,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<Listing, StoreError>;

    /// Upload a local file as an object.
    async fn put_object(
        &self,
        endpoint: &str,
        token: &str,
        container: &str,
        item: &UploadItem,
    ) -> Result<ObjectResponse, StoreError>;

    /// Download an object to `dest`. The file is only written on success.
    async fn get_object(
        &self,
        endpoint: &str,
        token: &str,
        container: &str,
        name: &str,
        dest: &Path,
    ) -> Result<ObjectResponse, StoreError>;

    /// Delete an object.
    async fn delete_object(
        &self,
        endpoint: &str,
        token: &str,
        container: &str,
        name: &str,
    ) -> Result<ObjectResponse, StoreError>;
}

/// The status that counts as success for an operation.
pub fn expected_status(operation: Operation) -> StatusCode {
    match operation {
        Operation::Upload => StatusCode::CREATED,
        Operation::Download => StatusCode::OK,
        Operation::Delete => StatusCode::NO_CONTENT,
    }
}

/// Create the parent directories of `dest`.
pub async fn prepare_destination(dest: &Path) -> Result<(), StoreError> {
    let Some(parent) = dest.parent() else {
        return Ok(());
    };
    match tokio::fs::create_dir_all(parent).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && parent.is_dir() => Ok(()),
        Err(e) => Err(StoreError::io(parent, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_statuses() {
        assert_eq!(expected_status(Operation::Upload), StatusCode::CREATED);
        assert_eq!(expected_status(Operation::Download), StatusCode::OK);
        assert_eq!(expected_status(Operation::Delete), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_into_record() {
        let mut response = ObjectResponse::status(StatusCode::NOT_FOUND);
        response
            .headers
            .insert("x-trans-id".to_string(), "tx123".to_string());
        let record = response.into_record("a.txt", "media");

        assert_eq!(record.status_code(), Some(404));
        assert_eq!(record.name, "a.txt");
    }

    #[tokio::test]
    async fn test_prepare_destination_nested() {
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("a/b/c.txt");

        prepare_destination(&dest).await.unwrap();
        prepare_destination(&dest).await.unwrap();
        assert!(temp.path().join("a/b").is_dir());
    }
}
