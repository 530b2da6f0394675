//! Error types for refresh operations.

use petdash_scheduler::SchedulerError;
use petdash_session::RemoteError;

use crate::report::RefreshReport;

/// Error type for refresh operations.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// No source is registered under this name.
    #[error("unknown refresh source '{0}'")]
    UnknownSource(String),

    /// A remote call failed after the session's own recovery.
    #[error("{source_name}: {error}")]
    Remote {
        source_name: String,
        #[source]
        error: RemoteError,
    },

    /// The remote answered with data we couldn't interpret.
    #[error("{source_name}: unexpected payload: {message}")]
    Payload {
        source_name: String,
        message: String,
    },

    /// A forced refresh where some, but not all, sources failed.
    #[error(
        "{} of {} sources failed: {}",
        .report.failed_count(),
        .report.sources.len(),
        .report.failure_summary()
    )]
    Partial { report: RefreshReport },

    /// A forced refresh where every source failed.
    #[error("all sources failed: {}", .report.failure_summary())]
    AllFailed { report: RefreshReport },

    /// Job registration failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl RefreshError {
    pub fn remote(source_name: &str, error: RemoteError) -> Self {
        RefreshError::Remote {
            source_name: source_name.to_string(),
            error,
        }
    }

    pub fn payload(source_name: &str, message: impl Into<String>) -> Self {
        RefreshError::Payload {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    /// The report attached to a forced-refresh failure.
    pub fn report(&self) -> Option<&RefreshReport> {
        match self {
            RefreshError::Partial { report } | RefreshError::AllFailed { report } => Some(report),
            _ => None,
        }
    }
}

/// Result type for refresh operations.
pub type Result<T> = std::result::Result<T, RefreshError>;
