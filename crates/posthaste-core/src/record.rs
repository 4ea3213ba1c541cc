//! Per-item failure records.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a single item failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    /// The service answered with an unexpected status.
    Response {
        status_code: u16,
        headers: BTreeMap<String, String>,
        /// Response body parsed as JSON, or null when it is not JSON.
        response: Option<Value>,
    },
    /// The request never produced a response, or local work failed.
    Exception { exception: String },
}

/// A failed work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Object (or file) name of the item.
    pub name: String,
    /// Container the job operates on.
    pub container: String,
    #[serde(flatten)]
    pub detail: ErrorDetail,
}

impl ErrorRecord {
    /// Record an unexpected response status.
    pub fn response(
        name: impl Into<String>,
        container: impl Into<String>,
        status_code: u16,
        headers: BTreeMap<String, String>,
        response: Option<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            container: container.into(),
            detail: ErrorDetail::Response {
                status_code,
                headers,
                response,
            },
        }
    }

    /// Record a failure that produced no response.
    pub fn exception(
        name: impl Into<String>,
        container: impl Into<String>,
        exception: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            container: container.into(),
            detail: ErrorDetail::Exception {
                exception: exception.into(),
            },
        }
    }

    /// Status code of the failing response, if there was one.
    pub fn status_code(&self) -> Option<u16> {
        match self.detail {
            ErrorDetail::Response { status_code, .. } => Some(status_code),
            ErrorDetail::Exception { .. } => None,
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            ErrorDetail::Response {
                status_code,
                response,
                ..
            } => {
                write!(f, "{}/{}: HTTP {}", self.container, self.name, status_code)?;
                if let Some(body) = response {
                    write!(f, " {body}")?;
                }
                Ok(())
            }
            ErrorDetail::Exception { exception } => {
                write!(f, "{}/{}: {}", self.container, self.name, exception)
            }
        }
    }
}
