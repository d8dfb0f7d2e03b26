use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::repository::{KeyValueStore, StorageError};

/// A computed aggregate with its time-to-live.
///
/// Entries are replaced wholesale on refresh, never merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub payload: String,
    pub computed_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    /// Age of the entry at `now`. Negative when the entry is from the future.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.computed_at
    }

    /// `now - computed_at < ttl`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let ttl = i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX);
        self.age(now).num_seconds() < ttl
    }
}

#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// Fetch an entry. Partially written or unparseable entries read as `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, StorageError>;

    /// Replace the entry stored under `entry.key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be written.
    async fn put_entry(&self, entry: &CacheEntry) -> Result<(), StorageError>;

    /// Remove an entry. Removing a missing entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be reached.
    async fn remove_entry(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryStamp {
    computed_at: DateTime<Utc>,
    ttl_seconds: u64,
}

/// Cache entries kept as two keys: the payload and its timestamp.
#[derive(Clone)]
pub struct KvCacheRepository {
    store: Arc<dyn KeyValueStore>,
}

impl KvCacheRepository {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn payload_key(key: &str) -> String {
        format!("progress.cache.{key}")
    }

    fn stamp_key(key: &str) -> String {
        format!("progress.cache.{key}.timestamp")
    }
}

#[async_trait]
impl CacheRepository for KvCacheRepository {
    async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        let Some(raw_stamp) = self.store.get(&Self::stamp_key(key)).await? else {
            return Ok(None);
        };
        let Some(payload) = self.store.get(&Self::payload_key(key)).await? else {
            return Ok(None);
        };
        let stamp: EntryStamp = match serde_json::from_str(&raw_stamp) {
            Ok(stamp) => stamp,
            Err(err) => {
                warn!(key, error = %err, "malformed cache timestamp, treating as miss");
                return Ok(None);
            }
        };

        Ok(Some(CacheEntry {
            key: key.to_owned(),
            payload,
            computed_at: stamp.computed_at,
            ttl_seconds: stamp.ttl_seconds,
        }))
    }

    async fn put_entry(&self, entry: &CacheEntry) -> Result<(), StorageError> {
        let stamp = serde_json::to_string(&EntryStamp {
            computed_at: entry.computed_at,
            ttl_seconds: entry.ttl_seconds,
        })
        .map_err(|err| StorageError::Serialization(err.to_string()))?;

        // Payload first: a crash in between leaves the old stamp with the new payload.
        self.store
            .set(&Self::payload_key(&entry.key), &entry.payload)
            .await?;
        self.store.set(&Self::stamp_key(&entry.key), &stamp).await
    }

    async fn remove_entry(&self, key: &str) -> Result<(), StorageError> {
        self.store.remove(&Self::stamp_key(key)).await?;
        self.store.remove(&Self::payload_key(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryKeyValueStore;
    use progress_core::time::fixed_now;

    fn entry(payload: &str) -> CacheEntry {
        CacheEntry {
            key: "progress:all".into(),
            payload: payload.into(),
            computed_at: fixed_now(),
            ttl_seconds: 900,
        }
    }

    #[test]
    fn freshness_is_strictly_less_than_ttl() {
        let e = entry("{}");
        assert!(e.is_fresh(fixed_now()));
        assert!(e.is_fresh(fixed_now() + Duration::seconds(899)));
        assert!(!e.is_fresh(fixed_now() + Duration::seconds(900)));
    }

    #[tokio::test]
    async fn put_replaces_previous_entry() {
        let repo = KvCacheRepository::new(Arc::new(InMemoryKeyValueStore::new()));
        repo.put_entry(&entry("first")).await.unwrap();
        repo.put_entry(&entry("second")).await.unwrap();

        let loaded = repo.get_entry("progress:all").await.unwrap().unwrap();
        assert_eq!(loaded.payload, "second");
        assert_eq!(loaded.computed_at, fixed_now());
    }

    #[tokio::test]
    async fn missing_timestamp_is_a_miss() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        store
            .set(&KvCacheRepository::payload_key("k"), "orphan")
            .await
            .unwrap();
        let repo = KvCacheRepository::new(store);
        assert!(repo.get_entry("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_timestamp_is_a_miss() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        store
            .set(&KvCacheRepository::payload_key("k"), "payload")
            .await
            .unwrap();
        store
            .set(&KvCacheRepository::stamp_key("k"), "yesterday")
            .await
            .unwrap();
        let repo = KvCacheRepository::new(store);
        assert!(repo.get_entry("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_clears_both_keys() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let repo = KvCacheRepository::new(store.clone());
        repo.put_entry(&entry("x")).await.unwrap();
        repo.remove_entry("progress:all").await.unwrap();
        assert!(repo.get_entry("progress:all").await.unwrap().is_none());
        assert_eq!(store.len().unwrap(), 0);
    }
}
