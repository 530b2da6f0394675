//! Durable storage for session credentials.
//!
//! Sessions are persisted so a restart can reuse a recent login instead of
//! hitting the remote login endpoint again. A stored session older than the
//! freshness window is treated exactly like a missing one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Default directory name for session files within the data directory.
pub const SESSIONS_DIR: &str = "sessions";

// ============================================================================
// Credentials & StoredSession
// ============================================================================

/// Opaque session credentials issued by a remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// Session or bearer token.
    pub token: String,

    /// Vendor metadata that must survive a restart (region, user id, ...).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Credentials {
    /// Create credentials from a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// Attach a metadata field.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A persisted session plus the time it was last renewed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub credentials: Credentials,
    pub saved_at: DateTime<Utc>,
}

impl StoredSession {
    /// Stamp credentials with the current time.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            saved_at: Utc::now(),
        }
    }

    /// Whether the session is still inside the freshness window at `now`.
    pub fn is_fresh(&self, window: Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.saved_at);
        match chrono::Duration::from_std(window) {
            Ok(window) => age <= window,
            Err(_) => true,
        }
    }
}

// ============================================================================
// SessionStore Trait
// ============================================================================

/// Durable key/value storage for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Load a stored session, if one exists.
    async fn load(&self, key: &str) -> StoreResult<Option<StoredSession>>;

    /// Save (replace) a stored session.
    async fn save(&self, key: &str, session: &StoredSession) -> StoreResult<()>;

    /// Delete a stored session. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Shared session store for use across async contexts.
pub type SharedSessionStore = Arc<dyn SessionStore>;

// ============================================================================
// FileSessionStore
// ============================================================================

/// One JSON file per session key.
#[derive(Debug)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Store sessions under `<data_dir>/sessions`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join(SESSIONS_DIR),
        }
    }

    /// Store sessions directly in `dir`.
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory holding the session files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a key. Anything outside `[A-Za-z0-9_-]` becomes `_`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, key: &str) -> StoreResult<Option<StoredSession>> {
        let path = self.path_for(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        let session: StoredSession = serde_json::from_str(&content)?;
        Ok(Some(session))
    }

    async fn save(&self, key: &str, session: &StoredSession) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| io_error(&path, e))?;

        tracing::debug!(key = %key, path = %path.display(), "Session saved");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

// ============================================================================
// MemorySessionStore (for testing)
// ============================================================================

/// In-memory session store for testing.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, StoredSession>>,
    save_count: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a stored session.
    pub fn with_session(key: &str, session: StoredSession) -> Self {
        let store = Self::new();
        store.sessions.lock().insert(key.to_string(), session);
        store
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    /// Current stored value for a key.
    pub fn get(&self, key: &str) -> Option<StoredSession> {
        self.sessions.lock().get(key).cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, key: &str) -> StoreResult<Option<StoredSession>> {
        Ok(self.sessions.lock().get(key).cloned())
    }

    async fn save(&self, key: &str, session: &StoredSession) -> StoreResult<()> {
        self.sessions
            .lock()
            .insert(key.to_string(), session.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.sessions.lock().remove(key);
        Ok(())
    }
}
