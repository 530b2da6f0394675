//! Error types for cache construction.

/// Error type for cache operations.
///
/// Runtime operations on the cache are total; the only failure is an
/// invalid configuration at construction time.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A cache must be able to hold at least one entry.
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
