//! Write-Through Cache Module
//!
//! Wraps a [`Cache`] so every store hits a backing writer first; the cache
//! never holds a value the backing store rejected.

use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::error::{CacheError, Result};

type WriterFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type Writer<K, V> = Arc<dyn Fn(K, V) -> WriterFuture + Send + Sync>;

// == Write-Through Cache ==
/// A [`Cache`] whose writes are forwarded to a backing store first.
///
/// `set` calls the writer with no cache lock held and only mutates the
/// cache if the writer succeeds. On writer failure the error is returned
/// and the cache is left unchanged, so cache contents always agree with
/// what the backing store accepted.
pub struct WriteThroughCache<K, V> {
    cache: Arc<Cache<K, V>>,
    writer: Writer<K, V>,
}

impl<K, V> WriteThroughCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a write-through wrapper over `cache` with the given writer.
    pub fn new<F, Fut>(cache: Arc<Cache<K, V>>, writer: F) -> Self
    where
        F: Fn(K, V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            cache,
            writer: Arc::new(move |key, value| Box::pin(writer(key, value))),
        }
    }

    /// Returns the wrapped cache.
    pub fn cache(&self) -> &Arc<Cache<K, V>> {
        &self.cache
    }

    // == Set ==
    /// Writes to the backing store, then stores in the cache on success.
    ///
    /// # Errors
    /// [`CacheError::Write`] carrying the writer's error verbatim; the
    /// cache is guaranteed unchanged in that case.
    pub async fn set(&self, key: K, value: V, ttl: Option<Duration>) -> Result<()> {
        (self.writer)(key.clone(), value.clone())
            .await
            .map_err(CacheError::Write)?;

        self.cache.set(key, value, ttl);
        Ok(())
    }

    // == Get ==
    /// Retrieves a value from the cache. Reads never touch the writer.
    pub fn get(&self, key: &K) -> Option<V> {
        self.cache.get(key)
    }

    // == Delete ==
    /// Removes an entry from the cache, returning whether anything was
    /// removed. Deletion of the backing record is the caller's concern.
    pub fn delete(&self, key: &K) -> bool {
        self.cache.delete(key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    fn test_cache() -> Arc<Cache<String, String>> {
        Arc::new(Cache::new(100).unwrap())
    }

    #[tokio::test]
    async fn test_set_writes_backing_store_first() {
        let cache = test_cache();
        let backing: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));

        let store = backing.clone();
        let wt = WriteThroughCache::new(cache.clone(), move |key: String, value: String| {
            let store = store.clone();
            async move {
                store.lock().insert(key, value);
                Ok(())
            }
        });

        wt.set("key1".to_string(), "value1".to_string(), None)
            .await
            .unwrap();

        assert_eq!(backing.lock().get("key1"), Some(&"value1".to_string()));
        assert_eq!(wt.get(&"key1".to_string()), Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_writer_failure_leaves_cache_unchanged() {
        let cache = test_cache();
        let wt = WriteThroughCache::new(cache.clone(), |_key: String, _value: String| async move {
            Err(anyhow::anyhow!("disk full"))
        });

        let result = wt.set("key1".to_string(), "value1".to_string(), None).await;

        assert!(matches!(result, Err(CacheError::Write(_))));
        assert_eq!(
            wt.get(&"key1".to_string()),
            None,
            "Rejected value must never appear in the cache"
        );
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_writer_failure_preserves_previous_value() {
        let cache = test_cache();
        let should_fail = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let fail = should_fail.clone();
        let wt = WriteThroughCache::new(cache, move |_key: String, _value: String| {
            let fail = fail.clone();
            async move {
                if fail.load(std::sync::atomic::Ordering::SeqCst) {
                    Err(anyhow::anyhow!("backing store rejected write"))
                } else {
                    Ok(())
                }
            }
        });

        wt.set("key1".to_string(), "old".to_string(), None)
            .await
            .unwrap();

        should_fail.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(wt.set("key1".to_string(), "new".to_string(), None).await.is_err());

        // The previously accepted value survives a failed overwrite
        assert_eq!(wt.get(&"key1".to_string()), Some("old".to_string()));
    }

    #[tokio::test]
    async fn test_delete_bypasses_writer() {
        let cache = test_cache();
        let wt = WriteThroughCache::new(cache, |_key: String, _value: String| async move { Ok(()) });

        wt.set("key1".to_string(), "value1".to_string(), None)
            .await
            .unwrap();

        assert!(wt.delete(&"key1".to_string()));
        assert_eq!(wt.get(&"key1".to_string()), None);
    }
}
