use chrono::Duration;
use progress_core::model::ChildId;
use progress_core::time::fixed_now;
use storage::repository::{KeyValueStore, Storage};
use storage::sqlite::SqliteRepository;
use storage::{CacheEntry, QuizAttemptRecord};

#[tokio::test]
async fn sqlite_kv_round_trip_and_overwrite() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo.migrate().await.expect("migrations are idempotent");

    assert_eq!(repo.get("missing").await.unwrap(), None);

    repo.set("greeting", "selam").await.unwrap();
    repo.set("greeting", "akkam").await.unwrap();
    assert_eq!(repo.get("greeting").await.unwrap().as_deref(), Some("akkam"));

    repo.remove("greeting").await.unwrap();
    assert_eq!(repo.get("greeting").await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_storage_backs_logs_and_cache() {
    let storage = Storage::sqlite("sqlite:file:memdb_storage?mode=memory&cache=shared")
        .await
        .expect("storage");

    let mut attempt = QuizAttemptRecord::new(ChildId::new("kid-1"), "Qubee", fixed_now());
    attempt.score = Some(4.0);
    attempt.total_questions = Some(5);
    let log = storage.quiz_attempts();
    log.append(&[attempt.clone()]).await.unwrap();
    assert_eq!(log.load().await.unwrap(), vec![attempt]);

    let cache = storage.cache();
    let entry = CacheEntry {
        key: "progress:parent:p1".into(),
        payload: "{\"ok\":true}".into(),
        computed_at: fixed_now(),
        ttl_seconds: 60,
    };
    cache.put_entry(&entry).await.unwrap();
    let loaded = cache
        .get_entry("progress:parent:p1")
        .await
        .unwrap()
        .expect("entry");
    assert_eq!(loaded, entry);
    assert!(!loaded.is_fresh(fixed_now() + Duration::seconds(60)));

    cache.remove_entry("progress:parent:p1").await.unwrap();
    assert!(cache.get_entry("progress:parent:p1").await.unwrap().is_none());
}
