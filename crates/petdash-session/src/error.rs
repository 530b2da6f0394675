//! Error types for remote calls and session storage.

/// Result type alias for remote calls.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Typed failure kinds produced at the point a remote call fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Network error, timeout, rate limiting, or 5xx. Worth retrying later.
    #[error("Transient remote failure: {0}")]
    Transient(String),

    /// The remote no longer accepts the current session.
    #[error("Session expired: {0}")]
    AuthExpired(String),

    /// Credentials were rejected, or re-login after expiry failed.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote answered with something we can't use.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    /// Check if this failure is expected to clear up on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }

    /// Check if this is an authentication error (expired or failed).
    pub fn is_auth(&self) -> bool {
        matches!(self, RemoteError::AuthExpired(_) | RemoteError::AuthFailed(_))
    }

    /// Check if this is a session expiry signal.
    pub fn is_expired(&self) -> bool {
        matches!(self, RemoteError::AuthExpired(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Protocol(e.to_string())
        } else {
            RemoteError::Transient(e.to_string())
        }
    }
}

/// Errors from the durable session store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to read or write a session file.
    #[error("session store I/O error at '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Stored session could not be (de)serialized.
    #[error("session store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
