//! Cached, last-request-wins reads.

use crate::cancel::Supersession;
use crate::error::SyncResult;
use crate::retry::RetryScheduler;
use clipdeck_core::{CacheConfig, CacheStats, ResultCache};
use clipdeck_protocol::RemoteFailure;
use parking_lot::Mutex;
use std::future::Future;
use std::hash::Hash;
use std::time::Instant;
use tracing::debug;

/// A [`ResultCache`] in front of an idempotent remote read.
///
/// Every lookup supersedes the previous one: an older fetch that resolves
/// late is discarded, neither cached nor returned.
#[derive(Debug)]
pub struct CachedLookup<K, V> {
    cache: Mutex<ResultCache<K, V>>,
    tickets: Supersession<()>,
    scheduler: RetryScheduler,
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl<K: Eq + Hash + Clone, V: Clone> CachedLookup<K, V> {
    /// Creates a lookup with an empty cache.
    pub fn new(config: CacheConfig, scheduler: RetryScheduler) -> Self {
        Self {
            cache: Mutex::new(ResultCache::new(config)),
            tickets: Supersession::new(),
            scheduler,
        }
    }

    /// Returns the cached value for `key` or fetches it.
    ///
    /// # Errors
    ///
    /// [`SyncError::Superseded`](crate::SyncError::Superseded) if a newer
    /// lookup started while this one was fetching; otherwise whatever the
    /// retry scheduler surfaces.
    pub async fn lookup<F, Fut>(&self, key: K, fetch: F) -> SyncResult<V>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, RemoteFailure>>,
    {
        let ticket = self.tickets.issue(());
        if let Some(value) = self.cache.lock().get_at(&key, now()) {
            return Ok(value);
        }

        let value = self.scheduler.run(Some(&ticket), fetch).await?;
        self.cache.lock().insert_at(key, value.clone(), now());
        Ok(value)
    }

    /// Cancels the in-flight lookup, if any.
    pub fn cancel(&self) {
        debug!("lookup cancelled");
        self.tickets.cancel(&());
    }

    /// Drops the cached value for `key`.
    pub fn invalidate(&self, key: &K) {
        self.cache.lock().remove(key);
    }

    /// Cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::cell::Cell;
    use std::time::Duration;

    fn lookup(ttl: Duration) -> CachedLookup<String, Vec<String>> {
        CachedLookup::new(
            CacheConfig::new().with_capacity(4).with_ttl(ttl),
            RetryScheduler::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_query_hits_cache_until_ttl() {
        let cache = lookup(Duration::from_secs(60));
        let fetches = Cell::new(0);
        let fetch = || {
            fetches.set(fetches.get() + 1);
            async { Ok(vec!["intro".to_string()]) }
        };

        cache.lookup("intro".into(), fetch).await.unwrap();
        cache.lookup("intro".into(), fetch).await.unwrap();
        assert_eq!(fetches.get(), 1);
        assert_eq!(cache.stats().hits, 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.lookup("intro".into(), fetch).await.unwrap();
        assert_eq!(fetches.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_lookup_is_discarded() {
        let cache = lookup(Duration::from_secs(60));
        let slow = cache.lookup("old".into(), || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec!["old".to_string()])
        });
        let fast = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cache
                .lookup("new".into(), || async { Ok(vec!["new".to_string()]) })
                .await
        };

        let (slow, fast) = tokio::join!(slow, fast);
        assert!(matches!(slow, Err(SyncError::Superseded)));
        assert_eq!(fast.unwrap(), ["new"]);

        cache.invalidate(&"new".to_string());
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = lookup(Duration::from_secs(60));
        let err = cache
            .lookup("q".into(), || async { Err(RemoteFailure::http(400, "bad query")) })
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(cache.stats().entries, 0);
    }
}
