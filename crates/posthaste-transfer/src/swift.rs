//! HTTP implementation of [`ObjectStore`] for Swift-compatible storage.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, HeaderMap};
use reqwest::{Body, Response, StatusCode, Url};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::ReaderStream;
use tracing::trace;

use posthaste_core::{TransferConfig, UploadItem};

use crate::error::StoreError;
use crate::store::{Listing, ObjectResponse, ObjectStore, prepare_destination};
use crate::USER_AGENT;

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
}

/// Swift object storage over HTTPS.
pub struct SwiftStore {
    http: reqwest::Client,
    chunk_size: usize,
}

impl SwiftStore {
    /// Build a store with the job's timeouts and buffer sizes.
    pub fn new(config: &TransferConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.threads);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            chunk_size: config.chunk_size,
        })
    }
}

/// `{endpoint}/{container}[/{name}]`, percent-encoding each path segment.
///
/// Slashes inside `name` stay path separators. Names with `.` or `..`
/// segments are refused: every encoding of them is a dot segment to URL
/// parsers, so the request would reach a different object.
pub fn object_url(endpoint: &str, container: &str, name: Option<&str>) -> Result<Url, StoreError> {
    let invalid = |message: &str| StoreError::InvalidUrl {
        url: endpoint.to_string(),
        message: message.to_string(),
    };

    if let Some(name) = name.filter(|name| name.split('/').any(|s| s == "." || s == "..")) {
        return Err(StoreError::UnaddressableName {
            name: name.to_string(),
        });
    }

    let mut url = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| invalid("endpoint cannot be a base URL"))?;
        segments.pop_if_empty().push(container);
        if let Some(name) = name {
            segments.extend(name.split('/'));
        }
    }
    Ok(url)
}

/// Container URL with the listing query.
pub fn listing_url(
    endpoint: &str,
    container: &str,
    marker: Option<&str>,
    limit: usize,
) -> Result<Url, StoreError> {
    let mut url = object_url(endpoint, container, None)?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("format", "json")
            .append_pair("limit", &limit.to_string());
        if let Some(marker) = marker {
            query.append_pair("marker", marker);
        }
    }
    Ok(url)
}

/// The scanned size, as long as the file on disk still has it.
fn scanned_length(item: &UploadItem, actual: u64) -> Result<u64, StoreError> {
    if actual == item.size {
        Ok(item.size)
    } else {
        Err(StoreError::SizeChanged {
            path: item.path.clone(),
            expected: item.size,
            actual,
        })
    }
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
        .collect()
}

/// Capture an unexpected response: headers plus the body if it is JSON.
async fn unexpected(resp: Response) -> ObjectResponse {
    let status = resp.status();
    let headers = header_map(resp.headers());
    let body = match resp.bytes().await {
        Ok(bytes) => serde_json::from_slice(&bytes).ok(),
        Err(_) => None,
    };
    ObjectResponse {
        status,
        headers,
        body,
        bytes: 0,
    }
}

#[async_trait]
impl ObjectStore for SwiftStore {
    async fn list_objects(
        &self,
        endpoint: &str,
        token: &str,
        container: &str,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<Listing, StoreError> {
        let url = listing_url(endpoint, container, marker, limit)?;
        trace!(url = %url, "listing");

        let resp = self
            .http
            .get(url)
            .header(AUTH_TOKEN_HEADER, token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        match resp.status() {
            StatusCode::NO_CONTENT => Ok(Listing::Page(Vec::new())),
            status if status.is_success() => {
                let bytes = resp.bytes().await?;
                Ok(match serde_json::from_slice::<Vec<ListedObject>>(&bytes) {
                    Ok(objects) => Listing::Page(objects.into_iter().map(|o| o.name).collect()),
                    Err(_) => Listing::Unparsable,
                })
            }
            _ => Ok(Listing::Failed(unexpected(resp).await)),
        }
    }

    async fn put_object(
        &self,
        endpoint: &str,
        token: &str,
        container: &str,
        item: &UploadItem,
    ) -> Result<ObjectResponse, StoreError> {
        let url = object_url(endpoint, container, Some(&item.name))?;
        let file = File::open(&item.path)
            .await
            .map_err(|e| StoreError::io(&item.path, e))?;
        let actual = file
            .metadata()
            .await
            .map_err(|e| StoreError::io(&item.path, e))?
            .len();
        let length = scanned_length(item, actual)?;
        trace!(url = %url, bytes = length, "uploading");

        let resp = self
            .http
            .put(url)
            .header(AUTH_TOKEN_HEADER, token)
            .header(CONTENT_LENGTH, length)
            .body(Body::wrap_stream(ReaderStream::with_capacity(file, self.chunk_size)))
            .send()
            .await?;

        if resp.status() == StatusCode::CREATED {
            return Ok(ObjectResponse::status(resp.status()).with_bytes(length));
        }
        Ok(unexpected(resp).await)
    }

    async fn get_object(
        &self,
        endpoint: &str,
        token: &str,
        container: &str,
        name: &str,
        dest: &Path,
    ) -> Result<ObjectResponse, StoreError> {
        let url = object_url(endpoint, container, Some(name))?;
        trace!(url = %url, dest = %dest.display(), "downloading");

        let mut resp = self
            .http
            .get(url)
            .header(AUTH_TOKEN_HEADER, token)
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            return Ok(unexpected(resp).await);
        }

        prepare_destination(dest).await?;
        let file = File::create(dest)
            .await
            .map_err(|e| StoreError::io(dest, e))?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut written = 0u64;

        while let Some(chunk) = resp.chunk().await? {
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| StoreError::io(dest, e))?;
            written += chunk.len() as u64;
        }
        writer.flush().await.map_err(|e| StoreError::io(dest, e))?;

        Ok(ObjectResponse::status(StatusCode::OK).with_bytes(written))
    }

    async fn delete_object(
        &self,
        endpoint: &str,
        token: &str,
        container: &str,
        name: &str,
    ) -> Result<ObjectResponse, StoreError> {
        let url = object_url(endpoint, container, Some(name))?;
        trace!(url = %url, "deleting");

        let resp = self
            .http
            .delete(url)
            .header(AUTH_TOKEN_HEADER, token)
            .send()
            .await?;

        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(ObjectResponse::status(resp.status()));
        }
        Ok(unexpected(resp).await)
    }
}
