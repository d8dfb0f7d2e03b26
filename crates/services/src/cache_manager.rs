use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use storage::{CacheEntry, CacheRepository, StorageError};
use tracing::{debug, warn};

use progress_core::time::Clock;

/// A cached value together with its age information.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub computed_at: DateTime<Utc>,
    pub is_fresh: bool,
}

/// TTL cache over a [`CacheRepository`].
///
/// Every read failure is treated as a miss; the cache can make a view slower
/// but never wrong or unavailable.
#[derive(Clone)]
pub struct CacheManager {
    clock: Clock,
    repo: Arc<dyn CacheRepository>,
}

impl CacheManager {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn CacheRepository>) -> Self {
        Self { clock, repo }
    }

    /// Return the fresh value under `key`, or run `compute` and store its result.
    ///
    /// A failed write is logged and the computed value is still returned.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, ttl_secs: u64, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(cached) = self.peek::<T>(key).await {
            if cached.is_fresh {
                debug!(key, "progress cache hit");
                return cached.value;
            }
            debug!(key, computed_at = %cached.computed_at, "progress cache entry expired");
        }

        let value = compute().await;
        self.store(key, ttl_secs, &value).await;
        value
    }

    /// Read whatever is cached under `key`, fresh or not.
    pub async fn peek<T: DeserializeOwned>(&self, key: &str) -> Option<Cached<T>> {
        let entry = match self.repo.get_entry(key).await {
            Ok(entry) => entry?,
            Err(err) => {
                warn!(key, error = %err, "progress cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<T>(&entry.payload) {
            Ok(value) => Some(Cached {
                value,
                computed_at: entry.computed_at,
                is_fresh: entry.is_fresh(self.clock.now()),
            }),
            Err(err) => {
                warn!(key, error = %err, "malformed progress cache payload, treating as miss");
                None
            }
        }
    }

    /// Write `value` under `key` stamped with the current time.
    pub async fn store<T: Serialize>(&self, key: &str, ttl_secs: u64, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key, error = %err, "progress value could not be serialized for caching");
                return;
            }
        };
        let entry = CacheEntry {
            key: key.to_owned(),
            payload,
            computed_at: self.clock.now(),
            ttl_seconds: ttl_secs,
        };
        if let Err(err) = self.repo.put_entry(&entry).await {
            warn!(key, error = %err, "progress cache write failed");
        }
    }

    /// Drop the entry under `key` so the next read recomputes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be removed.
    pub async fn invalidate(&self, key: &str) -> Result<(), StorageError> {
        self.repo.remove_entry(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Duration;
    use progress_core::time::fixed_now;
    use storage::{InMemoryKeyValueStore, KeyValueStore, KvCacheRepository};

    fn repo(kv: &Arc<InMemoryKeyValueStore>) -> Arc<dyn CacheRepository> {
        Arc::new(KvCacheRepository::new(Arc::clone(kv) as Arc<dyn KeyValueStore>))
    }

    #[tokio::test]
    async fn computes_once_within_ttl() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let cache = CacheManager::new(Clock::fixed(fixed_now()), repo(&kv));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Vec<u32> = cache
                .get_or_compute("progress:all", 900, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { vec![80, 60, 90] }
                })
                .await;
            assert_eq!(value, vec![80, 60, 90]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_recompute() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let cache = CacheManager::new(Clock::fixed(fixed_now()), repo(&kv));

        let first: u32 = cache.get_or_compute("k", 900, || async { 1 }).await;
        cache.invalidate("k").await.unwrap();
        let second: u32 = cache.get_or_compute("k", 900, || async { 2 }).await;
        assert_eq!((first, second), (1, 2));
    }

    #[tokio::test]
    async fn expired_entries_are_recomputed() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let early = CacheManager::new(Clock::fixed(fixed_now()), repo(&kv));
        let late = CacheManager::new(
            Clock::fixed(fixed_now() + Duration::seconds(900)),
            repo(&kv),
        );

        let _: u32 = early.get_or_compute("k", 900, || async { 1 }).await;
        let just_before = CacheManager::new(
            Clock::fixed(fixed_now() + Duration::seconds(899)),
            repo(&kv),
        );
        assert!(just_before.peek::<u32>("k").await.unwrap().is_fresh);

        let value: u32 = late.get_or_compute("k", 900, || async { 2 }).await;
        assert_eq!(value, 2);
        let cached = late.peek::<u32>("k").await.unwrap();
        assert_eq!(cached.computed_at, fixed_now() + Duration::seconds(900));
    }

    #[tokio::test]
    async fn malformed_payload_is_a_miss() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let cache = CacheManager::new(Clock::fixed(fixed_now()), repo(&kv));
        let _: u32 = cache.get_or_compute("k", 900, || async { 1 }).await;
        kv.set("progress.cache.k", "{not json").await.unwrap();

        assert!(cache.peek::<u32>("k").await.is_none());
        let value: u32 = cache.get_or_compute("k", 900, || async { 7 }).await;
        assert_eq!(value, 7);
    }
}
