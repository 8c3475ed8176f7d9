//! Conformance test suite for `SqliteStore`, run against in-memory databases.

#![allow(clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use pocketjson_storage::conformance;
use pocketjson_storage_sqlite::SqliteStore;

async fn store() -> SqliteStore {
    SqliteStore::in_memory().await.expect("open in-memory store")
}

// ============================================================================
// Blob (11 tests)
// ============================================================================

#[tokio::test]
async fn blob_get_missing_is_not_found() {
    conformance::blob_get_missing_is_not_found(&store().await).await;
}

#[tokio::test]
async fn blob_create_then_get_returns_payload() {
    conformance::blob_create_then_get_returns_payload(&store().await).await;
}

#[tokio::test]
async fn blob_default_creator_is_guest() {
    conformance::blob_default_creator_is_guest(&store().await).await;
}

#[tokio::test]
async fn blob_create_duplicate_conflicts() {
    conformance::blob_create_duplicate_conflicts(&store().await).await;
}

#[tokio::test]
async fn blob_expired_reads_as_not_found() {
    conformance::blob_expired_reads_as_not_found(&store().await).await;
}

#[tokio::test]
async fn blob_expired_unswept_id_still_conflicts() {
    conformance::blob_expired_unswept_id_still_conflicts(&store().await).await;
}

#[tokio::test]
async fn blob_sweep_removes_only_expired() {
    conformance::blob_sweep_removes_only_expired(&store().await).await;
}

#[tokio::test]
async fn blob_sweep_boundary_is_inclusive() {
    conformance::blob_sweep_boundary_is_inclusive(&store().await).await;
}

#[tokio::test]
async fn blob_sweep_frees_id_for_reuse() {
    conformance::blob_sweep_frees_id_for_reuse(&store().await).await;
}

#[tokio::test]
async fn blob_large_payload_roundtrip() {
    conformance::blob_large_payload_roundtrip(&store().await).await;
}

#[tokio::test]
async fn blob_unicode_payload_roundtrip() {
    conformance::blob_unicode_payload_roundtrip(&store().await).await;
}

// ============================================================================
// API key (7 tests)
// ============================================================================

#[tokio::test]
async fn key_get_missing_is_not_found() {
    conformance::key_get_missing_is_not_found(&store().await).await;
}

#[tokio::test]
async fn key_create_then_get() {
    conformance::key_create_then_get(&store().await).await;
}

#[tokio::test]
async fn key_without_description() {
    conformance::key_without_description(&store().await).await;
}

#[tokio::test]
async fn key_create_duplicate_conflicts() {
    conformance::key_create_duplicate_conflicts(&store().await).await;
}

#[tokio::test]
async fn key_delete_then_get_is_not_found() {
    conformance::key_delete_then_get_is_not_found(&store().await).await;
}

#[tokio::test]
async fn key_delete_leaves_blobs() {
    conformance::key_delete_leaves_blobs(&store().await).await;
}

#[tokio::test]
async fn key_errors_do_not_leak_secret() {
    conformance::key_errors_do_not_leak_secret(&store().await).await;
}

// ============================================================================
// Concurrent (3 tests)
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_create_same_id_exactly_one_winner() {
    conformance::concurrent_create_same_id_exactly_one_winner(Arc::new(store().await)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_of_distinct_ids() {
    conformance::concurrent_creates_of_distinct_ids(Arc::new(store().await)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reads_return_consistent_value() {
    conformance::concurrent_reads_return_consistent_value(Arc::new(store().await)).await;
}

// ============================================================================
// Full suite
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_all_on_shared_store() {
    conformance::run_all(Arc::new(store().await)).await;
}
