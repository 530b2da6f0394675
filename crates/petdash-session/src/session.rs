//! Resilient session wrapper for one authenticated remote API.
//!
//! A [`ResilientSession`] owns the login state for its API. Every remote call
//! goes through [`ResilientSession::call`], which hides session expiry from
//! callers: on an [`RemoteError::AuthExpired`] it logs in once and retries
//! the operation once. The retry budget is never more than one.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{RemoteError, Result};
use crate::store::{Credentials, SharedSessionStore, StoredSession};

/// Default freshness window for persisted sessions (30 minutes).
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(30 * 60);

// ============================================================================
// Authenticator Trait
// ============================================================================

/// The login half of a remote API client.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Name used in logs and as the default store key.
    fn name(&self) -> &str;

    /// Perform a full credential-based login.
    async fn login(&self) -> Result<Credentials>;

    /// Release connection resources. Must be safe to call repeatedly.
    async fn close(&self) {}
}

// ============================================================================
// SessionState & SessionConfig
// ============================================================================

/// Snapshot of a session's login state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub authenticated: bool,
    pub credentials: Option<Credentials>,
    pub last_renewed_at: Option<DateTime<Utc>>,
}

/// Configuration for a [`ResilientSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Key under which the session is persisted.
    pub store_key: String,

    /// Persisted sessions older than this are ignored at startup.
    pub freshness_window: Duration,

    /// Re-persist the session timestamp after each successful call.
    pub persist_on_success: bool,
}

impl SessionConfig {
    pub fn new(store_key: impl Into<String>) -> Self {
        Self {
            store_key: store_key.into(),
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            persist_on_success: true,
        }
    }

    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn with_persist_on_success(mut self, enabled: bool) -> Self {
        self.persist_on_success = enabled;
        self
    }
}

// ============================================================================
// ResilientSession
// ============================================================================

/// Authenticated remote API wrapper with a single retry on session expiry.
///
/// Concurrent calls that fail on the same expired session may each log in
/// again; logins are idempotent and infrequent, so they aren't serialized.
pub struct ResilientSession<A> {
    api: Arc<A>,
    store: SharedSessionStore,
    config: SessionConfig,
    state: RwLock<SessionState>,
    login_count: AtomicU64,
}

impl<A: Authenticator> ResilientSession<A> {
    /// Create an unauthenticated session. Call [`initialize`](Self::initialize)
    /// to restore a persisted session, or let the first call log in.
    pub fn new(api: Arc<A>, store: SharedSessionStore, config: SessionConfig) -> Self {
        Self {
            api,
            store,
            config,
            state: RwLock::new(SessionState::default()),
            login_count: AtomicU64::new(0),
        }
    }

    /// The wrapped API client.
    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Whether the session currently holds credentials.
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.authenticated
    }

    /// Number of successful logins performed by this instance.
    pub fn login_count(&self) -> u64 {
        self.login_count.load(Ordering::SeqCst)
    }

    /// Restore a fresh persisted session, or log in.
    pub async fn initialize(&self) -> Result<()> {
        let key = &self.config.store_key;

        match self.store.load(key).await {
            Ok(Some(stored)) if stored.is_fresh(self.config.freshness_window, Utc::now()) => {
                let mut state = self.state.write().await;
                *state = SessionState {
                    authenticated: true,
                    credentials: Some(stored.credentials),
                    last_renewed_at: Some(stored.saved_at),
                };
                info!(api = self.api.name(), "Restored persisted session");
                return Ok(());
            }
            Ok(Some(stored)) => {
                info!(
                    api = self.api.name(),
                    saved_at = %stored.saved_at,
                    "Persisted session is stale, logging in"
                );
            }
            Ok(None) => {
                info!(api = self.api.name(), "No persisted session, logging in");
            }
            Err(e) => {
                warn!(api = self.api.name(), error = %e, "Could not load persisted session");
            }
        }

        self.login().await.map(|_| ())
    }

    /// Log in with full credentials, replacing any existing session.
    ///
    /// Transient failures (network down) are returned as-is; every other
    /// failure is reported as [`RemoteError::AuthFailed`].
    pub async fn login(&self) -> Result<Credentials> {
        match self.api.login().await {
            Ok(credentials) => {
                let now = Utc::now();
                {
                    let mut state = self.state.write().await;
                    *state = SessionState {
                        authenticated: true,
                        credentials: Some(credentials.clone()),
                        last_renewed_at: Some(now),
                    };
                }
                self.login_count.fetch_add(1, Ordering::SeqCst);
                info!(api = self.api.name(), "Login successful");

                self.persist(&credentials, now).await;
                Ok(credentials)
            }
            Err(e) => {
                {
                    let mut state = self.state.write().await;
                    state.authenticated = false;
                    state.credentials = None;
                }
                error!(api = self.api.name(), error = %e, "Login failed");

                Err(match e {
                    RemoteError::Transient(_) | RemoteError::AuthFailed(_) => e,
                    other => RemoteError::AuthFailed(other.to_string()),
                })
            }
        }
    }

    /// Run `op` against the remote API with the current credentials.
    ///
    /// On [`RemoteError::AuthExpired`], performs exactly one login. If that
    /// login fails the call returns [`RemoteError::AuthFailed`] without
    /// retrying; otherwise `op` is retried exactly once and its result is
    /// returned unchanged. Other errors propagate with no retry.
    pub async fn call<'a, T, F, Fut>(&'a self, op: F) -> Result<T>
    where
        F: Fn(&'a A, Credentials) -> Fut,
        Fut: Future<Output = Result<T>> + 'a,
    {
        let credentials = self.current_credentials().await?;

        match op(self.api.as_ref(), credentials).await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(RemoteError::AuthExpired(reason)) => {
                warn!(api = self.api.name(), reason = %reason, "Session expired, re-logging in");
                self.invalidate().await;

                let credentials = self.login().await.map_err(|e| {
                    RemoteError::AuthFailed(format!(
                        "re-login after session expiry ({}) failed: {}",
                        reason, e
                    ))
                })?;

                let result = op(self.api.as_ref(), credentials).await;
                if result.is_ok() {
                    self.record_success().await;
                }
                result
            }
            Err(e) => Err(e),
        }
    }

    /// Release the underlying connection and forget the in-memory session.
    ///
    /// The persisted session is kept so a restart can reuse it.
    pub async fn close(&self) {
        {
            let mut state = self.state.write().await;
            *state = SessionState::default();
        }
        self.api.close().await;
        debug!(api = self.api.name(), "Session closed");
    }

    async fn current_credentials(&self) -> Result<Credentials> {
        {
            let state = self.state.read().await;
            if state.authenticated
                && let Some(credentials) = &state.credentials
            {
                return Ok(credentials.clone());
            }
        }

        debug!(api = self.api.name(), "No active session, logging in");
        self.login().await
    }

    async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.authenticated = false;
        state.credentials = None;
    }

    async fn record_success(&self) {
        if !self.config.persist_on_success {
            return;
        }

        let now = Utc::now();
        let credentials = {
            let mut state = self.state.write().await;
            state.last_renewed_at = Some(now);
            state.credentials.clone()
        };

        if let Some(credentials) = credentials {
            self.persist(&credentials, now).await;
        }
    }

    async fn persist(&self, credentials: &Credentials, saved_at: DateTime<Utc>) {
        let stored = StoredSession {
            credentials: credentials.clone(),
            saved_at,
        };
        if let Err(e) = self.store.save(&self.config.store_key, &stored).await {
            warn!(api = self.api.name(), error = %e, "Failed to persist session");
        }
    }
}
