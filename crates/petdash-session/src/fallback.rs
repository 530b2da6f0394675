//! Ordered candidate operations.
//!
//! Some vendor APIs expose the same data through several endpoints, only
//! some of which work for a given account or firmware. A [`FallbackChain`]
//! tries each candidate in order and keeps a record of why each one failed.

use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::RemoteError;

/// One failed candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub name: String,
    pub error: RemoteError,
}

/// Why a chain produced no value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FallbackError {
    /// The chain had nothing to try.
    #[error("no candidate operations configured")]
    Empty,

    /// An authentication failure stopped the chain. Trying other candidates
    /// with a dead session would fail the same way.
    #[error("candidate '{name}' hit an authentication error: {error}")]
    Aborted { name: String, error: RemoteError },

    /// Every candidate failed.
    #[error("all {} candidates failed: {}", .attempts.len(), summarize(.attempts))]
    Exhausted { attempts: Vec<AttemptFailure> },
}

fn summarize(attempts: &[AttemptFailure]) -> String {
    attempts
        .iter()
        .map(|a| format!("{} ({})", a.name, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<FallbackError> for RemoteError {
    /// Collapse a chain failure into a single kind. Auth errors pass through
    /// untouched so a surrounding session can re-login.
    fn from(e: FallbackError) -> Self {
        let message = e.to_string();
        match e {
            FallbackError::Aborted { error, .. } => error,
            FallbackError::Empty => RemoteError::Protocol(message),
            FallbackError::Exhausted { attempts } => {
                if attempts
                    .iter()
                    .all(|a| matches!(a.error, RemoteError::NotFound(_)))
                {
                    RemoteError::NotFound(message)
                } else if attempts.iter().any(|a| a.error.is_transient()) {
                    RemoteError::Transient(message)
                } else {
                    RemoteError::Protocol(message)
                }
            }
        }
    }
}

type CandidateOp<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T, RemoteError>> + Send + 'a>;

/// Declarative, ordered list of candidate operations.
pub struct FallbackChain<'a, T> {
    candidates: Vec<(String, CandidateOp<'a, T>)>,
}

impl<'a, T: Send + 'a> FallbackChain<'a, T> {
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    /// Append a candidate. Candidates run in the order they were added.
    pub fn candidate<F, Fut>(mut self, name: impl Into<String>, op: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'a,
    {
        self.candidates
            .push((name.into(), Box::new(move || op().boxed())));
        self
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Run candidates in order until one succeeds.
    pub async fn run(self) -> Result<T, FallbackError> {
        if self.candidates.is_empty() {
            return Err(FallbackError::Empty);
        }

        let mut attempts = Vec::new();
        for (name, op) in self.candidates {
            match op().await {
                Ok(value) => {
                    if !attempts.is_empty() {
                        tracing::debug!(
                            candidate = %name,
                            failed_before = attempts.len(),
                            "Fallback candidate succeeded"
                        );
                    }
                    return Ok(value);
                }
                Err(error) if error.is_auth() => {
                    return Err(FallbackError::Aborted { name, error });
                }
                Err(error) => {
                    tracing::debug!(candidate = %name, error = %error, "Fallback candidate failed");
                    attempts.push(AttemptFailure { name, error });
                }
            }
        }

        Err(FallbackError::Exhausted { attempts })
    }
}

impl<'a, T: Send + 'a> Default for FallbackChain<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}
