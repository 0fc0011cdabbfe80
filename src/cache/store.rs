//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU ordering and TTL
//! expiration behind a single reader/writer lock.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::RwLock;

use crate::cache::entry::CacheEntry;
use crate::cache::lru::{LruList, NodeId};
use crate::cache::stats::{CacheStats, StatsSnapshot};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Shared State ==
/// Index and recency list, always mutated together under the write lock.
///
/// Invariant: every entry in `entries` owns exactly one node in `lru` and
/// vice versa, so `entries.len() == lru.len()` outside a critical section.
#[derive(Debug)]
struct Inner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    lru: LruList<K>,
}

/// Outcome of a locked lookup, captured so the borrow of the index ends
/// before the recency list is touched.
enum Lookup<V> {
    Hit(V, NodeId),
    Expired,
    Absent,
}

// == Cache ==
/// Thread-safe, bounded cache with LRU eviction and TTL support.
///
/// Generic over any hashable key and any cloneable value. All methods take
/// `&self`; the index and recency list live behind one `RwLock` while the
/// statistics counters are atomics updated outside it.
#[derive(Debug)]
pub struct Cache<K, V> {
    /// Key-value index plus LRU ordering
    inner: RwLock<Inner<K, V>>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a new cache holding at most `max_entries` entries.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidCapacity`] if `max_entries` is zero.
    pub fn new(max_entries: usize) -> Result<Self> {
        if max_entries == 0 {
            return Err(CacheError::InvalidCapacity(max_entries));
        }

        Ok(Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                lru: LruList::new(),
            }),
            stats: CacheStats::new(),
            max_entries,
        })
    }

    /// Creates a cache from a [`CacheConfig`].
    pub fn with_config(config: &CacheConfig) -> Result<Self> {
        Self::new(config.max_entries)
    }

    /// Returns the configured capacity bound.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    // == Get ==
    /// Retrieves a value by key, promoting it to most recently used.
    ///
    /// Expired entries are treated as absent: they are removed on access
    /// and counted as misses. Plain misses only take the shared lock; hits
    /// and expiries escalate to the write lock and re-validate the entry
    /// there, so a concurrent delete between the check and the promotion
    /// is observed rather than promoted blindly.
    pub fn get(&self, key: &K) -> Option<V> {
        {
            let inner = self.inner.read();
            if !inner.entries.contains_key(key) {
                self.stats.record_miss();
                return None;
            }
        }

        let mut inner = self.inner.write();
        self.get_locked(&mut inner, key)
    }

    // == Set ==
    /// Stores a key-value pair with optional TTL.
    ///
    /// A `ttl` of `None` or zero means the entry never expires. Existing
    /// keys are overwritten in place (value and expiry) and promoted. New
    /// keys that push the cache past capacity evict the least recently
    /// used entry.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let mut inner = self.inner.write();
        self.set_locked(&mut inner, key, value, ttl);
    }

    // == Delete ==
    /// Removes an entry by key, returning whether anything was removed.
    pub fn delete(&self, key: &K) -> bool {
        let removed = {
            let mut inner = self.inner.write();
            Self::remove_entry(&mut inner, key)
        };
        self.stats.record_delete();
        removed
    }

    // == Clear ==
    /// Atomically empties the cache. Statistics are not reset.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.lru.clear();
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    // == Keys ==
    /// Returns a snapshot of all current keys, in unspecified order.
    ///
    /// O(n); may include keys whose TTL has elapsed but which have not
    /// been purged yet.
    pub fn keys(&self) -> Vec<K> {
        self.inner.read().entries.keys().cloned().collect()
    }

    // == TTL Remaining ==
    /// Returns the remaining TTL for `key`.
    ///
    /// `None` if the key is absent or already expired; `Some(None)` for an
    /// entry that never expires; `Some(Some(remaining))` otherwise. Pure
    /// inspection under the shared lock: no promotion, no lazy purge, no
    /// statistics update.
    pub fn ttl_remaining(&self, key: &K) -> Option<Option<Duration>> {
        let inner = self.inner.read();
        let entry = inner.entries.get(key)?;
        if entry.is_expired() {
            return None;
        }
        Some(entry.ttl_remaining())
    }

    // == Stats ==
    /// Returns a point-in-time copy of the cache statistics.
    pub fn stats(&self) -> StatsSnapshot {
        let entries = self.inner.read().entries.len();
        self.stats.snapshot(entries)
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// O(n) full scan under the write lock; intended for periodic
    /// housekeeping (see [`CacheWithCleanup`](crate::CacheWithCleanup)),
    /// not the hot path. Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write();

        let expired: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            Self::remove_entry(&mut inner, key);
        }

        expired.len()
    }

    // == Get Or Set ==
    /// Returns the cached value for `key`, computing and storing it on a
    /// miss.
    ///
    /// `compute` runs with no cache lock held, so a slow computation never
    /// blocks unrelated keys. Consequently, concurrent misses on the same
    /// key may compute redundantly; the last writer wins. Use
    /// [`LoadingCache`](crate::LoadingCache) when the computation must run
    /// exactly once.
    ///
    /// The boolean is true when the value came from the cache.
    pub fn get_or_set<F>(&self, key: K, compute: F) -> (V, bool)
    where
        F: FnOnce() -> (V, Option<Duration>),
    {
        if let Some(value) = self.get(&key) {
            return (value, true);
        }

        let (value, ttl) = compute();
        self.set(key, value.clone(), ttl);
        (value, false)
    }

    // == Batch Operations ==
    /// Looks up several keys in one critical section.
    ///
    /// Each lookup has the same semantics as [`Cache::get`] (promotion,
    /// lazy expiry, statistics); results are positionally aligned with
    /// `keys`.
    pub fn get_batch(&self, keys: &[K]) -> Vec<Option<V>> {
        let mut inner = self.inner.write();
        keys.iter()
            .map(|key| self.get_locked(&mut inner, key))
            .collect()
    }

    /// Stores several key-value pairs in one critical section.
    ///
    /// Each item has the same semantics as [`Cache::set`], including
    /// eviction when the capacity bound is crossed mid-batch.
    pub fn set_batch<I>(&self, items: I)
    where
        I: IntoIterator<Item = (K, V, Option<Duration>)>,
    {
        let mut inner = self.inner.write();
        for (key, value, ttl) in items {
            self.set_locked(&mut inner, key, value, ttl);
        }
    }

    // == Locked Internals ==
    /// Lookup under the write lock: removes the entry if expired, promotes
    /// it otherwise.
    fn get_locked(&self, inner: &mut Inner<K, V>, key: &K) -> Option<V> {
        let lookup = match inner.entries.get(key) {
            None => Lookup::Absent,
            Some(entry) if entry.is_expired() => Lookup::Expired,
            Some(entry) => Lookup::Hit(entry.value.clone(), entry.node),
        };

        match lookup {
            Lookup::Hit(value, node) => {
                inner.lru.move_to_front(node);
                self.stats.record_hit();
                Some(value)
            }
            Lookup::Expired => {
                Self::remove_entry(inner, key);
                self.stats.record_miss();
                None
            }
            Lookup::Absent => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Insert-or-overwrite under the write lock, evicting the LRU entry
    /// when the capacity bound is exceeded.
    fn set_locked(&self, inner: &mut Inner<K, V>, key: K, value: V, ttl: Option<Duration>) {
        self.stats.record_set();

        let Inner { entries, lru } = inner;

        // Overwrite case: update value and expiry in place, promote
        if let Some(entry) = entries.get_mut(&key) {
            let node = entry.node;
            *entry = CacheEntry::new(value, ttl, node);
            lru.move_to_front(node);
            return;
        }

        let node = lru.push_front(key.clone());
        entries.insert(key, CacheEntry::new(value, ttl, node));

        if entries.len() > self.max_entries {
            if let Some(victim) = lru.pop_back() {
                entries.remove(&victim);
                self.stats.record_eviction();
            }
        }

        debug_assert_eq!(entries.len(), lru.len());
    }

    /// Removes an entry from both the index and the recency list.
    fn remove_entry(inner: &mut Inner<K, V>, key: &K) -> bool {
        match inner.entries.remove(key) {
            Some(entry) => {
                inner.lru.remove(entry.node);
                debug_assert_eq!(inner.entries.len(), inner.lru.len());
                true
            }
            None => false,
        }
    }
}
