use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::warn;

use progress_core::model::ChildId;

use crate::repository::{KeyValueStore, StorageError};

/// A record type stored as one serialized collection under a fixed key.
pub trait LogEntry: Serialize + DeserializeOwned + Send + Sync {
    /// Storage key; unique per record type.
    const KEY: &'static str;

    fn child_id(&self) -> &ChildId;

    fn is_synthetic(&self) -> bool;
}

/// Append-only, typed log of `T` on top of a key-value store.
///
/// Mutations are load-modify-save; logs sharing a write lock never
/// interleave them.
pub struct RecordLog<T> {
    store: Arc<dyn KeyValueStore>,
    writes: Arc<Mutex<()>>,
    _entry: PhantomData<fn() -> T>,
}

impl<T> Clone for RecordLog<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            writes: Arc::clone(&self.writes),
            _entry: PhantomData,
        }
    }
}

impl<T: LogEntry> RecordLog<T> {
    /// A log with its own write lock. Use [`RecordLog::with_lock`] when other
    /// handles to the same key exist.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_lock(store, Arc::new(Mutex::new(())))
    }

    #[must_use]
    pub fn with_lock(store: Arc<dyn KeyValueStore>, writes: Arc<Mutex<()>>) -> Self {
        Self {
            store,
            writes,
            _entry: PhantomData,
        }
    }

    /// Load every entry in insertion order.
    ///
    /// Unparseable content is logged and treated as an empty log.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only when the store itself cannot be read.
    pub async fn load(&self) -> Result<Vec<T>, StorageError> {
        let Some(raw) = self.store.get(T::KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                warn!(key = T::KEY, error = %err, "malformed record log, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Append entries after the existing ones.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the log cannot be read, serialized or written.
    pub async fn append(&self, entries: &[T]) -> Result<(), StorageError>
    where
        T: Clone,
    {
        if entries.is_empty() {
            return Ok(());
        }
        let _guard = self.writes.lock().await;
        let mut all = self.load().await?;
        all.extend_from_slice(entries);
        self.save(&all).await
    }

    /// Remove every entry matching `predicate`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the log cannot be read or written.
    pub async fn remove_where<F>(&self, predicate: F) -> Result<usize, StorageError>
    where
        F: Fn(&T) -> bool,
    {
        let _guard = self.writes.lock().await;
        let all = self.load().await?;
        let before = all.len();
        let kept: Vec<T> = all.into_iter().filter(|entry| !predicate(entry)).collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.save(&kept).await?;
        }
        Ok(removed)
    }

    /// Remove synthetic entries belonging to any of `children`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the log cannot be read or written.
    pub async fn purge_synthetic(&self, children: &[ChildId]) -> Result<usize, StorageError> {
        self.remove_where(|entry| entry.is_synthetic() && children.contains(entry.child_id()))
            .await
    }

    async fn save(&self, entries: &[T]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(entries)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.store.set(T::KEY, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{LessonCompletionRecord, QuizAttemptRecord};
    use crate::repository::InMemoryKeyValueStore;
    use progress_core::time::fixed_now;

    fn attempt(child: &str, synthetic: bool) -> QuizAttemptRecord {
        let mut record = QuizAttemptRecord::new(ChildId::new(child), "Math", fixed_now());
        record.is_synthetic = synthetic;
        record
    }

    #[tokio::test]
    async fn append_preserves_order() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        let log = RecordLog::<QuizAttemptRecord>::new(store);
        let first = attempt("a", false);
        let second = attempt("b", false);
        log.append(&[first.clone()]).await.unwrap();
        log.append(&[second.clone()]).await.unwrap();

        assert_eq!(log.load().await.unwrap(), vec![first, second]);
    }

    /// Yields after every read so concurrent mutations get a chance to interleave.
    struct YieldingStore(InMemoryKeyValueStore);

    #[async_trait::async_trait]
    impl KeyValueStore for YieldingStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            let value = self.0.get(key).await;
            tokio::task::yield_now().await;
            value
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.0.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.0.remove(key).await
        }
    }

    #[tokio::test]
    async fn concurrent_appends_through_shared_lock_keep_every_entry() {
        let store: Arc<dyn KeyValueStore> = Arc::new(YieldingStore(InMemoryKeyValueStore::new()));
        let lock = Arc::new(Mutex::new(()));
        let first = RecordLog::<QuizAttemptRecord>::with_lock(Arc::clone(&store), Arc::clone(&lock));
        let second = RecordLog::<QuizAttemptRecord>::with_lock(Arc::clone(&store), lock);

        let (a, b) = (attempt("a", false), attempt("b", true));
        let (batch_a, batch_b) = ([a.clone()], [b.clone()]);
        let (ra, rb) = tokio::join!(first.append(&batch_a), second.append(&batch_b));
        ra.unwrap();
        rb.unwrap();

        let stored = first.load().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.contains(&a));
        assert!(stored.contains(&b));

        let (purge, late) = ([ChildId::new("b")], [attempt("c", false)]);
        let (purged, appended) = tokio::join!(second.purge_synthetic(&purge), first.append(&late));
        assert_eq!(purged.unwrap(), 1);
        appended.unwrap();
        assert_eq!(first.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn malformed_content_reads_as_empty() {
        let store = InMemoryKeyValueStore::new();
        store.set(QuizAttemptRecord::KEY, "{not json").await.unwrap();
        let log = RecordLog::<QuizAttemptRecord>::new(Arc::new(store));
        assert!(log.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn logs_of_different_types_do_not_collide() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        let quizzes = RecordLog::<QuizAttemptRecord>::new(Arc::clone(&store));
        let lessons = RecordLog::<LessonCompletionRecord>::new(store);
        quizzes.append(&[attempt("a", false)]).await.unwrap();
        assert!(lessons.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_synthetic_is_scoped_to_children() {
        let log = RecordLog::<QuizAttemptRecord>::new(Arc::new(InMemoryKeyValueStore::new()));
        let real = attempt("a", false);
        let other_child = attempt("b", true);
        log.append(&[attempt("a", true), real.clone(), other_child.clone()])
            .await
            .unwrap();

        let removed = log.purge_synthetic(&[ChildId::new("a")]).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(log.load().await.unwrap(), vec![real, other_child]);
        assert_eq!(log.purge_synthetic(&[ChildId::new("a")]).await.unwrap(), 0);
    }
}
