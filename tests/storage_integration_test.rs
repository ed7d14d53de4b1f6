//! Integration tests for the durable view store
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests (needs DATABASE_URL)
//! - By default, both backends are tested

use chrono::NaiveDate;
use std::sync::Arc;
use viewcount::storage::{PostgresViewStore, SqliteViewStore, ViewRecordStore};

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true, // Test all backends if not specified
    }
}

/// Helper to create SQLite test storage
async fn create_sqlite_storage() -> Arc<dyn ViewRecordStore> {
    let storage = SqliteViewStore::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Helper to create PostgreSQL test storage
async fn create_postgres_storage() -> Option<Arc<dyn ViewRecordStore>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    let storage = PostgresViewStore::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;
    Some(Arc::new(storage))
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Unique post id so repeated runs against a shared Postgres don't collide
fn unique_post(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}-{nanos}")
}

async fn check_missing_row(storage: Arc<dyn ViewRecordStore>) {
    let post = unique_post("missing");
    assert_eq!(storage.query_total(&post).await.unwrap(), None);
    assert!(storage.get_record(&post).await.unwrap().is_none());
}

async fn check_insert_then_update(storage: Arc<dyn ViewRecordStore>) {
    let post = unique_post("upsert");

    assert!(storage.upsert(&post, 10, day(2024, 1, 1)).await);
    let inserted = storage.get_record(&post).await.unwrap().unwrap();
    assert_eq!(inserted.post, post);
    assert_eq!(inserted.total_views, 10);
    assert_eq!(inserted.last_updated, "2024-01-01");

    assert!(storage.upsert(&post, 25, day(2024, 1, 3)).await);
    let updated = storage.get_record(&post).await.unwrap().unwrap();
    assert_eq!(updated.post, post);
    assert_eq!(updated.total_views, 25);
    assert_eq!(updated.last_updated, "2024-01-03");
    assert_eq!(storage.query_total(&post).await.unwrap(), Some(25));
}

async fn check_same_day_overwrites(storage: Arc<dyn ViewRecordStore>) {
    let post = unique_post("same-day");

    assert!(storage.upsert(&post, 1, day(2024, 2, 2)).await);
    assert!(storage.upsert(&post, 7, day(2024, 2, 2)).await);
    assert!(storage.upsert(&post, 4, day(2024, 2, 2)).await);

    let record = storage.get_record(&post).await.unwrap().unwrap();
    assert_eq!(record.total_views, 4);
    assert_eq!(record.last_updated_date(), Some(day(2024, 2, 2)));
}

async fn check_negative_total_rejected(storage: Arc<dyn ViewRecordStore>) {
    let post = unique_post("negative");

    assert!(!storage.upsert(&post, -1, day(2024, 1, 1)).await);
    assert_eq!(storage.query_total(&post).await.unwrap(), None);
}

#[tokio::test]
async fn test_missing_row_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_missing_row(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_insert_then_update_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_insert_then_update(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_same_day_overwrites_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_same_day_overwrites(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_negative_total_rejected_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_negative_total_rejected(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_list_orders_by_total_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }

    let storage = create_sqlite_storage().await;
    assert!(storage.upsert("low", 1, day(2024, 1, 1)).await);
    assert!(storage.upsert("high", 100, day(2024, 1, 1)).await);
    assert!(storage.upsert("mid", 50, day(2024, 1, 1)).await);

    let all = storage.list(10, 0).await.unwrap();
    let posts: Vec<&str> = all.iter().map(|r| r.post.as_str()).collect();
    assert_eq!(posts, vec!["high", "mid", "low"]);

    let page = storage.list(1, 1).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].post, "mid");
}

#[tokio::test]
async fn test_upsert_failure_returns_false_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }

    // No init(): the table does not exist, so the write fails
    let storage = SqliteViewStore::new("sqlite::memory:", 1).await.unwrap();
    assert!(!storage.upsert("post", 1, day(2024, 1, 1)).await);
}

#[tokio::test]
async fn test_concurrent_upserts_converge_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }

    let storage = create_sqlite_storage().await;
    let mut handles = vec![];
    for total in 1..=10 {
        let storage = Arc::clone(&storage);
        handles.push(tokio::spawn(async move {
            storage.upsert("race", total, day(2024, 3, 3)).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    // Last write wins: some single value, not a sum
    let total = storage.query_total("race").await.unwrap().unwrap();
    assert!((1..=10).contains(&total), "unexpected total {total}");
}

#[tokio::test]
async fn test_missing_row_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        eprintln!("Skipping PostgreSQL test: DATABASE_URL not set or unreachable");
        return;
    };
    check_missing_row(storage).await;
}

#[tokio::test]
async fn test_insert_then_update_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        eprintln!("Skipping PostgreSQL test: DATABASE_URL not set or unreachable");
        return;
    };
    check_insert_then_update(storage).await;
}

#[tokio::test]
async fn test_same_day_overwrites_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        eprintln!("Skipping PostgreSQL test: DATABASE_URL not set or unreachable");
        return;
    };
    check_same_day_overwrites(storage).await;
}

#[tokio::test]
async fn test_negative_total_rejected_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        eprintln!("Skipping PostgreSQL test: DATABASE_URL not set or unreachable");
        return;
    };
    check_negative_total_rejected(storage).await;
}
