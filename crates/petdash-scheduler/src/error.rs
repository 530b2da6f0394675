//! Error types for the task scheduler.

/// Error type for scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A job was registered with a zero interval.
    #[error("job '{0}' must have a non-zero interval")]
    InvalidInterval(String),

    /// No job is registered under this name.
    #[error("no job named '{0}'")]
    NotFound(String),

    /// A job run returned an error.
    #[error("job '{name}' failed: {message}")]
    JobFailed { name: String, message: String },

    /// A job run panicked.
    #[error("job '{name}' panicked: {message}")]
    JobPanicked { name: String, message: String },
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
