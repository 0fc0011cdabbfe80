//! Loading Cache Module
//!
//! Wraps a [`Cache`] with a single-flight upstream loader: concurrent
//! misses for the same key collapse into exactly one loader invocation.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::cache::Cache;
use crate::error::{CacheError, Result};

type LoaderFuture<V> = Pin<Box<dyn Future<Output = anyhow::Result<V>> + Send>>;
type Loader<K, V> = Arc<dyn Fn(K) -> LoaderFuture<V> + Send + Sync>;

/// In-flight load registry: one completion signal per key being loaded.
///
/// Entries are removed as soon as the load finishes (success, failure, or
/// cancellation), never left dangling.
type FlightMap<K> = Mutex<HashMap<K, watch::Receiver<bool>>>;

/// Role a caller takes for a given miss: leaders run the loader, followers
/// wait on the leader's completion signal.
enum Flight {
    Leader(watch::Sender<bool>),
    Follower(watch::Receiver<bool>),
}

/// Unregisters an in-flight load when dropped, so a cancelled leader cannot
/// strand its followers behind a registration that will never complete.
struct FlightGuard<'a, K: Eq + Hash> {
    flights: &'a FlightMap<K>,
    key: K,
}

impl<K: Eq + Hash> Drop for FlightGuard<'_, K> {
    fn drop(&mut self) {
        self.flights.lock().remove(&self.key);
    }
}

// == Loading Cache ==
/// A [`Cache`] with a coalescing loader for misses.
///
/// On a miss, `load` invokes the upstream loader with no cache lock held;
/// N concurrent `load` calls for the same missing key run the loader
/// exactly once and all observe the loaded value. Loaded values are stored
/// without a TTL and persist until evicted or overwritten.
pub struct LoadingCache<K, V> {
    cache: Arc<Cache<K, V>>,
    loader: Loader<K, V>,
    in_flight: FlightMap<K>,
}

impl<K, V> LoadingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a loading cache over `cache` with the given upstream loader.
    ///
    /// The loader may block arbitrarily (e.g. on I/O); it always runs
    /// outside the cache lock, so unrelated keys stay fully available
    /// during a slow load.
    pub fn new<F, Fut>(cache: Arc<Cache<K, V>>, loader: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        Self {
            cache,
            loader: Arc::new(move |key| Box::pin(loader(key))),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the wrapped cache.
    pub fn cache(&self) -> &Arc<Cache<K, V>> {
        &self.cache
    }

    // == Load ==
    /// Returns the cached value for `key`, loading it upstream on a miss.
    ///
    /// Concurrent callers for the same missing key coalesce: one leader
    /// runs the loader, the rest wait for its completion signal and then
    /// re-read the cache. If the sole load attempt fails, the leader gets
    /// the error and each waiter retries; re-registration through the
    /// in-flight registry keeps at most one retry in flight at a time.
    ///
    /// # Errors
    /// [`CacheError::Load`] carrying the loader's error verbatim. Errors
    /// are never cached.
    pub async fn load(&self, key: K) -> Result<V> {
        loop {
            if let Some(value) = self.cache.get(&key) {
                return Ok(value);
            }

            let flight = {
                let mut in_flight = self.in_flight.lock();
                match in_flight.get(&key) {
                    Some(rx) => Flight::Follower(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(false);
                        in_flight.insert(key.clone(), rx);
                        Flight::Leader(tx)
                    }
                }
            };

            match flight {
                Flight::Follower(mut rx) => {
                    debug!("waiting on in-flight load for key");
                    // Wakes on completion, or immediately with Err if the
                    // leader already finished or was cancelled
                    let _ = rx.changed().await;
                    // Retry the lookup; if the load failed we fall through
                    // and re-register as the new leader
                }
                Flight::Leader(completed) => {
                    let guard = FlightGuard {
                        flights: &self.in_flight,
                        key: key.clone(),
                    };

                    let result = (self.loader)(key.clone()).await;

                    return match result {
                        Ok(value) => {
                            // Publish the value before unregistering: a
                            // caller that finds the registry empty must
                            // then hit the cache, or it would re-run the
                            // loader for a key that is already loaded
                            self.cache.set(key, value.clone(), None);
                            drop(guard);
                            let _ = completed.send(true);
                            Ok(value)
                        }
                        Err(err) => {
                            // Unregister before waking waiters so a retry
                            // after a failed load re-registers cleanly
                            drop(guard);
                            let _ = completed.send(true);
                            Err(CacheError::Load(err))
                        }
                    };
                }
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    fn test_cache() -> Arc<Cache<String, String>> {
        Arc::new(Cache::new(100).unwrap())
    }

    #[tokio::test]
    async fn test_load_hits_cache_without_loader() {
        let cache = test_cache();
        cache.set("key1".to_string(), "cached".to_string(), None);

        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let loading = LoadingCache::new(cache, move |_key: String| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("loaded".to_string())
            }
        });

        let value = loading.load("key1".to_string()).await.unwrap();

        assert_eq!(value, "cached");
        assert_eq!(calls.load(Ordering::SeqCst), 0, "Loader must not run on a hit");
    }

    #[tokio::test]
    async fn test_load_populates_cache_on_miss() {
        let cache = test_cache();
        let loading = LoadingCache::new(cache.clone(), |key: String| async move {
            Ok(format!("loaded:{}", key))
        });

        let value = loading.load("key1".to_string()).await.unwrap();

        assert_eq!(value, "loaded:key1");
        assert_eq!(cache.get(&"key1".to_string()), Some("loaded:key1".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_loads_run_loader_once() {
        let cache = test_cache();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();

        let loading = Arc::new(LoadingCache::new(cache, move |_key: String| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                // Slow upstream: all callers must still coalesce
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok("loaded".to_string())
            }
        }));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let loading = Arc::clone(&loading);
            handles.push(tokio::spawn(
                async move { loading.load("key".to_string()).await },
            ));
        }

        for handle in handles {
            let value = handle.await.unwrap().unwrap();
            assert_eq!(value, "loaded");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1, "Loader must run exactly once");
    }

    #[tokio::test]
    async fn test_late_arrivals_see_cached_value_not_second_load() {
        let cache = test_cache();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();

        let loading = Arc::new(LoadingCache::new(cache, move |_key: String| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(40)).await;
                Ok("loaded".to_string())
            }
        }));

        // Stagger callers so several arrive right around the moment the
        // leader finishes: each must find either the leader's registration
        // or the freshly cached value, never an empty registry with an
        // unpopulated cache
        let mut handles = Vec::new();
        for i in 0..40u64 {
            let loading = Arc::clone(&loading);
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(i * 2)).await;
                loading.load("key".to_string()).await
            }));
        }

        for handle in handles {
            let value = handle.await.unwrap().unwrap();
            assert_eq!(value, "loaded");
        }

        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "Arrivals straddling load completion must not re-run the loader"
        );
    }

    #[tokio::test]
    async fn test_load_error_propagates_and_is_not_cached() {
        let cache = test_cache();
        let loading = LoadingCache::new(cache.clone(), |_key: String| async move {
            Err(anyhow::anyhow!("upstream unavailable"))
        });

        let result: Result<String> = loading.load("key1".to_string()).await;

        assert!(matches!(result, Err(CacheError::Load(_))));
        assert_eq!(cache.get(&"key1".to_string()), None, "Errors must not be cached");
    }

    #[tokio::test]
    async fn test_failed_load_allows_retry() {
        let cache = test_cache();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();

        let loading = LoadingCache::new(cache, move |_key: String| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(anyhow::anyhow!("transient failure"))
                } else {
                    Ok("loaded".to_string())
                }
            }
        });

        assert!(loading.load("key".to_string()).await.is_err());

        // The failed attempt left no dangling registration
        let value = loading.load("key".to_string()).await.unwrap();
        assert_eq!(value, "loaded");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_registry_is_empty_after_load() {
        let cache = test_cache();
        let loading = LoadingCache::new(cache, |_key: String| async move {
            Ok("loaded".to_string())
        });

        loading.load("key".to_string()).await.unwrap();

        assert!(loading.in_flight.lock().is_empty());
    }
}
