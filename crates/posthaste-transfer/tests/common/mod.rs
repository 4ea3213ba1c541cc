//! In-memory identity service and object store for engine tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use posthaste_core::{TransferConfig, UploadItem};
use posthaste_transfer::{
    AuthError, Authenticator, Grant, Listing, ObjectResponse, ObjectStore, StoreError,
    prepare_destination,
};

pub const ENDPOINT: &str = "https://storage.example.test/v1/AUTH_test";

/// Config with test-sized intervals.
pub fn config(container: &str, threads: usize) -> TransferConfig {
    TransferConfig::builder()
        .container(container)
        .threads(threads)
        .backpressure_poll(Duration::from_millis(5))
        .listing_retry_delay(Duration::from_millis(1))
        .build()
        .unwrap()
}

pub fn object_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("obj-{i:05}")).collect()
}

/// Hands out `token-0`, `token-1`, ... and counts calls.
#[derive(Default)]
pub struct FakeAuthenticator {
    calls: AtomicUsize,
    delay: Duration,
    reject: bool,
}

impl FakeAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for FakeAuthenticator {
    async fn authenticate(&self) -> Result<Grant, AuthError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.reject {
            return Err(AuthError::Rejected {
                status: 401,
                body: "{\"unauthorized\": {\"code\": 401}}".to_string(),
            });
        }
        Ok(Grant {
            token: format!("token-{n}"),
            endpoint: ENDPOINT.to_string(),
        })
    }
}

#[derive(Default)]
struct StoreState {
    /// Names returned by listings.
    listed: BTreeSet<String>,
    /// Names that can be fetched or deleted.
    objects: BTreeMap<String, Vec<u8>>,
    expired: HashSet<String>,
    list_calls: usize,
    failing_list_calls: HashSet<usize>,
    unparsable_list_calls: HashSet<usize>,
    expire_on_list_call: Option<usize>,
    broken: HashSet<String>,
    list_markers: Vec<Option<String>>,
    puts: Vec<String>,
    gets: Vec<String>,
    deletes: Vec<String>,
}

/// A single-container object store kept in memory.
pub struct FakeStore {
    container: String,
    latency: Duration,
    reject_all: bool,
    reject_objects: bool,
    state: Mutex<StoreState>,
}

impl FakeStore {
    pub fn new(container: &str) -> Self {
        Self {
            container: container.to_string(),
            latency: Duration::ZERO,
            reject_all: false,
            reject_objects: false,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Add objects whose body is their own name.
    pub fn with_objects<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut state = self.state.lock().unwrap();
            for name in names {
                let name = name.into();
                state.listed.insert(name.clone());
                state.objects.insert(name.clone(), name.into_bytes());
            }
        }
        self
    }

    pub fn with_object(self, name: &str, body: &[u8]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.listed.insert(name.to_string());
            state.objects.insert(name.to_string(), body.to_vec());
        }
        self
    }

    /// Names that show up in listings but no longer exist.
    pub fn with_phantoms<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut state = self.state.lock().unwrap();
            state.listed.extend(names.into_iter().map(Into::into));
        }
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Answer every request with 401.
    pub fn rejecting_all_tokens(mut self) -> Self {
        self.reject_all = true;
        self
    }

    /// Serve listings normally but answer object requests with 401.
    pub fn rejecting_object_tokens(mut self) -> Self {
        self.reject_objects = true;
        self
    }

    pub fn expire_token(&self, token: &str) {
        self.state.lock().unwrap().expired.insert(token.to_string());
    }

    /// Answer these listing calls (0-based) with 500.
    pub fn fail_list_calls(&self, calls: Range<usize>) {
        self.state.lock().unwrap().failing_list_calls.extend(calls);
    }

    /// Answer this listing call (0-based) with a body that is not a listing.
    pub fn unparsable_list_call(&self, call: usize) {
        self.state.lock().unwrap().unparsable_list_calls.insert(call);
    }

    /// Expire whatever token the given listing call carries.
    pub fn expire_on_list_call(&self, call: usize) {
        self.state.lock().unwrap().expire_on_list_call = Some(call);
    }

    /// Fail requests for this name at the transport level.
    pub fn break_object(&self, name: &str) {
        self.state.lock().unwrap().broken.insert(name.to_string());
    }

    pub fn list_markers(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().list_markers.clone()
    }

    pub fn puts(&self) -> Vec<String> {
        self.state.lock().unwrap().puts.clone()
    }

    pub fn gets(&self) -> Vec<String> {
        self.state.lock().unwrap().gets.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().unwrap().deletes.clone()
    }

    pub fn object(&self, name: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().objects.get(name).cloned()
    }

    fn authorized(&self, state: &StoreState, token: &str) -> bool {
        !self.reject_all && !state.expired.contains(token)
    }

    fn object_authorized(&self, state: &StoreState, token: &str) -> bool {
        !self.reject_objects && self.authorized(state, token)
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn transport_error(name: &str) -> StoreError {
        StoreError::io(
            name,
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset by peer"),
        )
    }
}

fn not_found() -> ObjectResponse {
    let mut resp = ObjectResponse::status(StatusCode::NOT_FOUND);
    resp.headers
        .insert("content-type".to_string(), "text/html; charset=UTF-8".to_string());
    resp
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn list_objects(
        &self,
        endpoint: &str,
        token: &str,
        container: &str,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<Listing, StoreError> {
        assert_eq!(endpoint, ENDPOINT);
        self.pause().await;

        let mut state = self.state.lock().unwrap();
        let call = state.list_calls;
        state.list_calls += 1;
        state.list_markers.push(marker.map(str::to_string));

        if state.expire_on_list_call == Some(call) {
            state.expired.insert(token.to_string());
        }
        if !self.authorized(&state, token) {
            return Ok(Listing::Failed(ObjectResponse::status(StatusCode::UNAUTHORIZED)));
        }
        if container != self.container {
            return Ok(Listing::Failed(not_found()));
        }
        if state.failing_list_calls.contains(&call) {
            return Ok(Listing::Failed(ObjectResponse::status(
                StatusCode::INTERNAL_SERVER_ERROR,
            )));
        }
        if state.unparsable_list_calls.contains(&call) {
            return Ok(Listing::Unparsable);
        }

        let names = match marker {
            Some(marker) => state
                .listed
                .range::<str, _>((
                    std::ops::Bound::Excluded(marker),
                    std::ops::Bound::Unbounded,
                ))
                .take(limit)
                .cloned()
                .collect(),
            None => state.listed.iter().take(limit).cloned().collect(),
        };
        Ok(Listing::Page(names))
    }

    async fn put_object(
        &self,
        _endpoint: &str,
        token: &str,
        container: &str,
        item: &UploadItem,
    ) -> Result<ObjectResponse, StoreError> {
        self.pause().await;
        let body = tokio::fs::read(&item.path)
            .await
            .map_err(|e| StoreError::io(&item.path, e))?;

        let mut state = self.state.lock().unwrap();
        if !self.object_authorized(&state, token) {
            return Ok(ObjectResponse::status(StatusCode::UNAUTHORIZED));
        }
        if state.broken.contains(&item.name) {
            return Err(Self::transport_error(&item.name));
        }
        if container != self.container {
            return Ok(not_found());
        }

        let bytes = body.len() as u64;
        state.puts.push(item.name.clone());
        state.listed.insert(item.name.clone());
        state.objects.insert(item.name.clone(), body);
        Ok(ObjectResponse::status(StatusCode::CREATED).with_bytes(bytes))
    }

    async fn get_object(
        &self,
        _endpoint: &str,
        token: &str,
        _container: &str,
        name: &str,
        dest: &Path,
    ) -> Result<ObjectResponse, StoreError> {
        self.pause().await;

        let body = {
            let mut state = self.state.lock().unwrap();
            if !self.object_authorized(&state, token) {
                return Ok(ObjectResponse::status(StatusCode::UNAUTHORIZED));
            }
            if state.broken.contains(name) {
                return Err(Self::transport_error(name));
            }
            state.gets.push(name.to_string());
            match state.objects.get(name) {
                Some(body) => body.clone(),
                None => return Ok(not_found()),
            }
        };

        prepare_destination(dest).await?;
        tokio::fs::write(dest, &body)
            .await
            .map_err(|e| StoreError::io(dest, e))?;
        Ok(ObjectResponse::status(StatusCode::OK).with_bytes(body.len() as u64))
    }

    async fn delete_object(
        &self,
        _endpoint: &str,
        token: &str,
        _container: &str,
        name: &str,
    ) -> Result<ObjectResponse, StoreError> {
        self.pause().await;

        let mut state = self.state.lock().unwrap();
        if !self.object_authorized(&state, token) {
            return Ok(ObjectResponse::status(StatusCode::UNAUTHORIZED));
        }
        if state.broken.contains(name) {
            return Err(Self::transport_error(name));
        }
        state.deletes.push(name.to_string());
        state.listed.remove(name);
        match state.objects.remove(name) {
            Some(_) => Ok(ObjectResponse::status(StatusCode::NO_CONTENT)),
            None => Ok(not_found()),
        }
    }
}
