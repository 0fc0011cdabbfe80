//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside a cache.
//!
//! # Tasks
//! - TTL cleanup: removes expired cache entries at a configured interval,
//!   with an explicit start/stop lifecycle

mod cleanup;

pub use cleanup::CacheWithCleanup;
