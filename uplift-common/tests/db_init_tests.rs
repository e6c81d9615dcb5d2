//! Tests for database initialization

use std::path::PathBuf;
use uplift_common::db::init::init_database;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("uplift.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("uplift.db");

    // Create database first time
    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    // Open database second time (should succeed)
    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_creates_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let db_path: PathBuf = dir.path().join("nested").join("deeper").join("uplift.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok());
    assert!(db_path.exists());
}

#[tokio::test]
async fn test_all_tables_exist() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("uplift.db");
    let pool = init_database(&db_path).await.unwrap();

    for table in [
        "participants",
        "event_types",
        "event_instances",
        "attendance_instances",
        "survey_instances",
        "participant_milestones",
        "participant_donations",
        "staging_raw_rows",
        "normalization_audit",
        "staging_archive",
    ] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "Missing table: {}", table);
    }
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("uplift.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO event_types (event_name) VALUES ('Workshop')")
        .execute(&pool)
        .await
        .unwrap();
    drop(pool);

    // Re-initializing must not clobber existing data
    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_types")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
