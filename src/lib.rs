//! ttlru - A thread-safe, bounded in-memory cache
//!
//! Provides a generic cache with TTL expiration and LRU eviction, plus
//! derived variants: a background expiry sweeper, a single-flight loading
//! cache, and a write-through cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod loading;
pub mod tasks;
pub mod write_through;

pub use cache::{Cache, StatsSnapshot};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use loading::LoadingCache;
pub use tasks::CacheWithCleanup;
pub use write_through::WriteThroughCache;
