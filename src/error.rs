//! Error types for the cache library
//!
//! Provides unified error handling using thiserror.
//!
//! Absent keys are not errors: `get` returns `Option` and `delete` returns
//! a bool, since a miss is routine control flow for a cache.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache library.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache constructed with a capacity bound of zero
    #[error("invalid capacity: {0} (must be greater than zero)")]
    InvalidCapacity(usize),

    /// The upstream loader of a [`LoadingCache`](crate::LoadingCache) failed.
    /// The error is propagated verbatim and nothing is cached.
    #[error("upstream load failed")]
    Load(#[source] anyhow::Error),

    /// The backing writer of a [`WriteThroughCache`](crate::WriteThroughCache)
    /// rejected a write. The cache is left unchanged.
    #[error("write-through failed")]
    Write(#[source] anyhow::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache library.
pub type Result<T> = std::result::Result<T, CacheError>;
