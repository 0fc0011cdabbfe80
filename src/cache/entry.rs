//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, Instant};

use crate::cache::lru::NodeId;

// == Cache Entry ==
/// A single cached record: value, optional absolute expiry, and a handle
/// into the recency list so promotion and removal stay O(1).
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Absolute expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
    /// Node handle in the owning cache's recency list
    pub node: NodeId,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// A `ttl` of `None` or zero means the entry never expires.
    pub fn new(value: V, ttl: Option<Duration>, node: NodeId) -> Self {
        let expires_at = ttl.filter(|d| !d.is_zero()).map(|d| Instant::now() + d);

        Self {
            value,
            expires_at,
            node,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired when the current instant is
    /// greater than or equal to the expiration instant, so an entry whose
    /// TTL has fully elapsed is treated as absent immediately.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => Instant::now() >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL, or None if no expiration is set.
    ///
    /// Returns `Some(Duration::ZERO)` once the entry has expired.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }
}
