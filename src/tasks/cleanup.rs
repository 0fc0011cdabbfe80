//! TTL Cleanup Task
//!
//! Wraps a cache with a background task that periodically removes expired
//! entries, modelled as an explicit Stopped -> Running -> Stopped lifecycle.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Cache;

/// Handle to a running sweep loop: the shutdown signal plus the task itself.
///
/// Dropping the handle drops the watch sender, which also terminates the
/// loop, so an abandoned sweeper cannot leak its task.
#[derive(Debug)]
struct SweepTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

// == Cache With Cleanup ==
/// A cache paired with a periodic expired-entry sweeper.
///
/// The sweeper only ever calls [`Cache::cleanup_expired`]; all other cache
/// access goes through [`CacheWithCleanup::cache`]. `start` and `stop` are
/// both idempotent: starting twice leaves the single running task in place,
/// and stopping twice (or stopping before starting) is a no-op.
#[derive(Debug)]
pub struct CacheWithCleanup<K, V> {
    cache: Arc<Cache<K, V>>,
    interval: Duration,
    /// Some while the sweep loop is running
    task: Mutex<Option<SweepTask>>,
}

impl<K, V> CacheWithCleanup<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a wrapper around `cache` sweeping every `interval`.
    ///
    /// The sweep loop does not run until [`start`](Self::start) is called.
    pub fn new(cache: Arc<Cache<K, V>>, interval: Duration) -> Self {
        Self {
            cache,
            interval,
            task: Mutex::new(None),
        }
    }

    /// Returns the wrapped cache.
    pub fn cache(&self) -> &Arc<Cache<K, V>> {
        &self.cache
    }

    /// Returns true if the sweep loop is currently running.
    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    // == Start ==
    /// Starts the background sweep loop.
    ///
    /// A no-op if the loop is already running.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let cache = Arc::clone(&self.cache);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "TTL cleanup task started");

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately;
            // consume it so the first sweep happens one interval after start.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.cleanup_expired();
                        if removed > 0 {
                            info!(removed, "TTL cleanup: removed expired entries");
                        } else {
                            debug!("TTL cleanup: no expired entries found");
                        }
                    }
                    // Fires on an explicit stop or when the sender is dropped
                    _ = shutdown_rx.changed() => {
                        debug!("TTL cleanup task shutting down");
                        break;
                    }
                }
            }
        });

        *task = Some(SweepTask { shutdown, handle });
    }

    // == Stop ==
    /// Stops the sweep loop and waits for it to exit.
    ///
    /// No sweep runs concurrently with or after this call returns. A no-op
    /// if the loop is not running, so double-stop is always safe.
    pub async fn stop(&self) {
        let task = self.task.lock().await.take();

        if let Some(task) = task {
            let _ = task.shutdown.send(true);
            let _ = task.handle.await;
        }
    }
}
