#![forbid(unsafe_code)]

pub mod cache;
pub mod record_log;
pub mod records;
pub mod repository;
pub mod sqlite;

pub use cache::{CacheEntry, CacheRepository, KvCacheRepository};
pub use record_log::{LogEntry, RecordLog};
pub use records::{LessonCompletionRecord, QuizAttemptRecord};
pub use repository::{InMemoryKeyValueStore, KeyValueStore, Storage, StorageError};
