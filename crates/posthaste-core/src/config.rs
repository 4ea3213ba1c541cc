//! Transfer engine configuration.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a single transfer job.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate", error = "ConfigError"))]
pub struct TransferConfig {
    /// Container to operate on.
    pub container: String,

    /// Number of concurrently running workers.
    #[builder(default = "10")]
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Maximum number of names requested per listing page.
    #[builder(default = "10_000")]
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Queue depth above which producers stop enqueuing.
    #[builder(default = "50_000")]
    #[serde(default = "default_queue_ceiling")]
    pub queue_ceiling: usize,

    /// How long the background lister sleeps while the queue is over its ceiling.
    #[builder(default = "Duration::from_secs(30)")]
    #[serde(default = "default_backpressure_poll")]
    pub backpressure_poll: Duration,

    /// Consecutive listing failures tolerated before listing is treated as finished.
    #[builder(default = "10")]
    #[serde(default = "default_max_listing_errors")]
    pub max_listing_errors: u32,

    /// Delay between retries of a failed listing page.
    #[builder(default = "Duration::from_secs(1)")]
    #[serde(default = "default_listing_retry_delay")]
    pub listing_retry_delay: Duration,

    /// Re-authentications allowed on top of the worker count.
    #[builder(default = "10")]
    #[serde(default = "default_reauth_headroom")]
    pub reauth_headroom: usize,

    /// Buffer size used when writing downloaded bodies to disk.
    #[builder(default = "64 * 1024")]
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// TCP connect timeout for every request.
    #[builder(default = "Duration::from_secs(30)")]
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Whole-request timeout (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub request_timeout: Option<Duration>,
}

fn default_threads() -> usize {
    10
}

fn default_page_size() -> usize {
    10_000
}

fn default_queue_ceiling() -> usize {
    50_000
}

fn default_backpressure_poll() -> Duration {
    Duration::from_secs(30)
}

fn default_max_listing_errors() -> u32 {
    10
}

fn default_listing_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_reauth_headroom() -> usize {
    10
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

impl TransferConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.container {
            Some(ref container) if container.is_empty() => {
                return Err("Container name cannot be empty".to_string());
            }
            None => return Err("Container name is required".to_string()),
            _ => {}
        }
        if self.threads == Some(0) {
            return Err("Thread count must be at least 1".to_string());
        }
        if self.page_size == Some(0) {
            return Err("Page size must be at least 1".to_string());
        }
        if self.queue_ceiling == Some(0) {
            return Err("Queue ceiling must be at least 1".to_string());
        }
        if self.chunk_size == Some(0) {
            return Err("Chunk size must be at least 1".to_string());
        }
        Ok(())
    }
}

impl TransferConfig {
    /// Create a new config builder.
    pub fn builder() -> TransferConfigBuilder {
        TransferConfigBuilder::default()
    }

    /// Create a config with defaults for the given container.
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            threads: default_threads(),
            page_size: default_page_size(),
            queue_ceiling: default_queue_ceiling(),
            backpressure_poll: default_backpressure_poll(),
            max_listing_errors: default_max_listing_errors(),
            listing_retry_delay: default_listing_retry_delay(),
            reauth_headroom: default_reauth_headroom(),
            chunk_size: default_chunk_size(),
            connect_timeout: default_connect_timeout(),
            request_timeout: None,
        }
    }

    /// Number of re-authentications after which the job is aborted.
    pub fn reauth_limit(&self) -> usize {
        self.threads + self.reauth_headroom
    }
}
