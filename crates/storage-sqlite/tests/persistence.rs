//! File-backed behavior of `SqliteStore`: data outlives the process handle,
//! and configuration is honored on open.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use pocketjson_storage::{ApiKeyStore, Blob, BlobStore, StorageError};
use pocketjson_storage_sqlite::{JournalMode, SqliteStore, SqliteStoreConfig, SqliteStoreError};

fn file_config(dir: &tempfile::TempDir, journal_mode: JournalMode) -> SqliteStoreConfig {
    SqliteStoreConfig::builder()
        .path(dir.path().join("pocketjson.db"))
        .busy_timeout(StdDuration::from_millis(500))
        .journal_mode(journal_mode)
        .build()
        .expect("valid config")
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let expires_at = Utc::now() + Duration::hours(48);

    {
        let store = SqliteStore::open(file_config(&dir, JournalMode::Wal)).await.expect("open");
        let blob = Blob::builder()
            .id("persisted")
            .data(r#"{"kept":true}"#)
            .expires_at(expires_at)
            .creator_key("owner-key")
            .build();
        store.create_blob(&blob).await.expect("create blob");
        store.create_api_key_record("owner-key", Some("ops"), true).await.expect("create key");
    }

    let reopened = SqliteStore::open(file_config(&dir, JournalMode::Wal)).await.expect("reopen");
    let blob = reopened.get_blob("persisted").await.expect("blob after reopen");
    assert_eq!(blob.data, r#"{"kept":true}"#);
    assert_eq!(blob.creator_key, "owner-key");
    assert_eq!(blob.expires_at.timestamp_millis(), expires_at.timestamp_millis());

    let record = reopened.get_api_key_record("owner-key").await.expect("key after reopen");
    assert!(record.is_admin);
    assert_eq!(record.description.as_deref(), Some("ops"));
}

#[tokio::test]
async fn test_rollback_journal_mode_opens() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteStore::open(file_config(&dir, JournalMode::Delete)).await.expect("open");
    assert_eq!(store.config().journal_mode(), JournalMode::Delete);

    let blob =
        Blob::builder().id("j").data("{}").expires_at(Utc::now() + Duration::hours(1)).build();
    store.create_blob(&blob).await.expect("create");
    assert!(store.get_blob("j").await.is_ok());
}

#[tokio::test]
async fn test_clones_share_the_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteStore::open(file_config(&dir, JournalMode::Wal)).await.expect("open");
    let clone = store.clone();

    store.create_api_key_record("shared", None, false).await.expect("create");
    assert!(clone.get_api_key_record("shared").await.is_ok());
    clone.delete_api_key_record("shared").await.expect("delete via clone");
    assert!(matches!(store.get_api_key_record("shared").await, Err(StorageError::NotFound { .. })));
}

#[tokio::test]
async fn test_open_rejects_directory_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    // Deserialized configs bypass the builder's validation; open re-checks.
    let config: SqliteStoreConfig =
        serde_json::from_value(serde_json::json!({ "path": dir.path() })).expect("deserialize");

    let result = SqliteStore::open(config).await;
    assert!(matches!(result, Err(SqliteStoreError::Config(_))), "got {result:?}");
}

#[tokio::test]
async fn test_sweep_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let store = SqliteStore::open(file_config(&dir, JournalMode::Wal)).await.expect("open");
        let expired = Blob::builder()
            .id("old")
            .data("{}")
            .expires_at(Utc::now() - Duration::minutes(1))
            .build();
        store.create_blob(&expired).await.expect("create");
        assert_eq!(store.delete_expired_blobs(Utc::now()).await.expect("sweep"), 1);
    }

    let reopened = SqliteStore::open(file_config(&dir, JournalMode::Wal)).await.expect("reopen");
    assert_eq!(reopened.delete_expired_blobs(Utc::now()).await.expect("sweep"), 0);
}
