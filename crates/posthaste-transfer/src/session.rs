//! Shared authentication state with serialized, deduplicated refresh.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::TransferError;
use crate::identity::{Authenticator, Grant};

/// A token/endpoint pair tagged with the refresh that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub endpoint: String,
    /// 0 for the initial authentication, incremented by every refresh.
    pub generation: u64,
}

/// Authentication state shared by all workers and the lister.
///
/// Readers take a cheap snapshot with [`Session::current`]. When a request
/// comes back 401 the caller hands its snapshot to [`Session::refresh`];
/// refreshes are serialized, and callers whose snapshot is already outdated
/// receive the newer token without another identity round trip.
pub struct Session {
    authenticator: Arc<dyn Authenticator>,
    state: RwLock<Arc<SessionToken>>,
    refresh_lock: Mutex<()>,
    refreshes: AtomicUsize,
    limit: usize,
}

impl Session {
    /// Authenticate once and build a session.
    pub async fn start(
        authenticator: Arc<dyn Authenticator>,
        limit: usize,
    ) -> Result<Self, TransferError> {
        let Grant { token, endpoint } = authenticator.authenticate().await?;
        info!(endpoint = %endpoint, "authenticated");

        Ok(Self {
            authenticator,
            state: RwLock::new(Arc::new(SessionToken {
                token,
                endpoint,
                generation: 0,
            })),
            refresh_lock: Mutex::new(()),
            refreshes: AtomicUsize::new(0),
            limit,
        })
    }

    /// The current token.
    pub fn current(&self) -> Arc<SessionToken> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace `stale` with a fresh token.
    ///
    /// If another caller already refreshed past `stale`, the newer token is
    /// returned and nothing is counted. Otherwise this counts one refresh and
    /// fails with [`TransferError::ReauthLimitExceeded`] once the count goes
    /// past the limit.
    pub async fn refresh(&self, stale: &SessionToken) -> Result<Arc<SessionToken>, TransferError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.current();
        if current.generation != stale.generation {
            debug!(generation = current.generation, "token already refreshed");
            return Ok(current);
        }

        let attempts = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        if attempts > self.limit {
            warn!(attempts, limit = self.limit, "re-authentication limit exceeded");
            return Err(TransferError::ReauthLimitExceeded {
                attempts,
                limit: self.limit,
            });
        }

        let Grant { token, endpoint } = self.authenticator.authenticate().await?;
        let fresh = Arc::new(SessionToken {
            token,
            endpoint,
            generation: current.generation + 1,
        });
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = fresh.clone();
        info!(generation = fresh.generation, attempts, "re-authenticated");

        Ok(fresh)
    }

    /// Number of refreshes performed (or attempted past the limit).
    pub fn reauth_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Refreshes allowed before the job is aborted.
    pub fn limit(&self) -> usize {
        self.limit
    }
}
