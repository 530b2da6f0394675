//! Expiring cache with LRU eviction and per-entry TTL.
//!
//! This crate provides the read path for refreshed remote data:
//! - Bounded capacity with least-recently-used eviction
//! - Optional per-entry time-to-live, purged lazily on access
//! - A single async mutex guarding the map and recency order together
//!
//! # Example
//!
//! ```rust,ignore
//! use petdash_cache::{CacheConfig, ExpiringCache};
//!
//! let cache = ExpiringCache::new(CacheConfig::default().with_max_entries(1000))?;
//! cache.set("petkit_devices", devices, Some(Duration::from_secs(300))).await;
//! let cached = cache.get("petkit_devices").await;
//! ```

mod cache;
mod config;
mod error;

pub use cache::{CacheStats, ExpiringCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
