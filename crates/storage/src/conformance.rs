//! Conformance test suite for [`PersistentStore`] implementations.
//!
//! Each function checks one aspect of the persistence contract against a
//! store instance. Every backend, in-memory or durable, runs the same suite.
//!
//! # Usage
//!
//! Enable the `testutil` feature and call each conformance function with
//! a fresh store instance:
//!
//! ```no_run
//! use pocketjson_storage::{MemoryStore, conformance};
//!
//! #[tokio::test]
//! async fn blob_get_missing_is_not_found() {
//!     conformance::blob_get_missing_is_not_found(&MemoryStore::new()).await;
//! }
//! ```
//!
//! # Test Categories
//!
//! | Category | Functions | Contract aspect |
//! |----------|-----------|-----------------|
//! | Blob | 11 tests | create-only writes, logical expiry, sweeping |
//! | API key | 7 tests | record lifecycle, secret hygiene |
//! | Concurrent | 3 tests | thread-safety under parallel access |
//!
//! Timestamps are compared at millisecond precision, which is what durable
//! backends are required to preserve.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    assert_storage_error,
    error::StorageError,
    store::PersistentStore,
    types::{Blob, GUEST_CREATOR},
};

fn blob(id: &str, expires_at: DateTime<Utc>) -> Blob {
    Blob::builder().id(id).data(r#"{"a":1}"#).expires_at(expires_at).build()
}

fn in_one_hour() -> DateTime<Utc> {
    Utc::now() + Duration::hours(1)
}

// ============================================================================
// Blob: create-only writes, logical expiry, sweeping (11 tests)
// ============================================================================

/// `get_blob` on an unknown id returns `NotFound`.
pub async fn blob_get_missing_is_not_found<S: PersistentStore>(store: &S) {
    assert_storage_error!(store.get_blob("nonexistent").await, NotFound);
}

/// `create_blob` then `get_blob` returns the stored fields.
pub async fn blob_create_then_get_returns_payload<S: PersistentStore>(store: &S) {
    let expires_at = in_one_hour();
    let created = Blob::builder()
        .id("b:roundtrip")
        .data(r#"{"k":"v","n":[1,2,3]}"#)
        .expires_at(expires_at)
        .creator_key("creator-1")
        .build();
    store.create_blob(&created).await.expect("create should succeed");

    let fetched = store.get_blob("b:roundtrip").await.expect("get should succeed");
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.data, created.data);
    assert_eq!(fetched.creator_key, "creator-1");
    assert_eq!(fetched.expires_at.timestamp_millis(), expires_at.timestamp_millis());
}

/// Blobs built without a creator are attributed to guests.
pub async fn blob_default_creator_is_guest<S: PersistentStore>(store: &S) {
    store.create_blob(&blob("b:guest", in_one_hour())).await.expect("create");
    let fetched = store.get_blob("b:guest").await.expect("get");
    assert_eq!(fetched.creator_key, GUEST_CREATOR);
}

/// A second `create_blob` for the same id fails and leaves the original intact.
pub async fn blob_create_duplicate_conflicts<S: PersistentStore>(store: &S) {
    store.create_blob(&blob("b:dup", in_one_hour())).await.expect("first create");

    let replacement =
        Blob::builder().id("b:dup").data(r#"{"b":2}"#).expires_at(in_one_hour()).build();
    assert_storage_error!(store.create_blob(&replacement).await, Conflict);

    let fetched = store.get_blob("b:dup").await.expect("get");
    assert_eq!(fetched.data, r#"{"a":1}"#, "original blob must not be overwritten");
}

/// A blob whose expiry has passed is invisible to `get_blob`.
pub async fn blob_expired_reads_as_not_found<S: PersistentStore>(store: &S) {
    store
        .create_blob(&blob("b:expired", Utc::now() - Duration::seconds(5)))
        .await
        .expect("create");
    assert_storage_error!(store.get_blob("b:expired").await, NotFound);
}

/// An expired id stays taken until it is swept.
pub async fn blob_expired_unswept_id_still_conflicts<S: PersistentStore>(store: &S) {
    store
        .create_blob(&blob("b:stale", Utc::now() - Duration::seconds(5)))
        .await
        .expect("create");
    assert_storage_error!(store.create_blob(&blob("b:stale", in_one_hour())).await, Conflict);
}

/// `delete_expired_blobs` removes expired blobs, leaves live ones and reports the count.
pub async fn blob_sweep_removes_only_expired<S: PersistentStore>(store: &S) {
    let now = Utc::now();
    for i in 0..3 {
        let id = format!("b:sweep:old:{i}");
        store.create_blob(&blob(&id, now - Duration::minutes(1))).await.expect("create expired");
    }
    store.create_blob(&blob("b:sweep:live", now + Duration::hours(1))).await.expect("create live");

    // A shared store may hold expired blobs from other checks, so the count is a lower bound.
    let deleted = store.delete_expired_blobs(now).await.expect("sweep");
    assert!(deleted >= 3, "expected at least 3 deletions, got {deleted}");
    assert!(store.get_blob("b:sweep:live").await.is_ok(), "live blob must survive the sweep");
    for i in 0..3 {
        let id = format!("b:sweep:old:{i}");
        store.create_blob(&blob(&id, in_one_hour())).await.expect("swept id should be free");
    }

    let second = store.delete_expired_blobs(now).await.expect("second sweep");
    assert_eq!(second, 0, "a second sweep has nothing left to delete");
}

/// A blob expiring exactly at the sweep instant is deleted.
pub async fn blob_sweep_boundary_is_inclusive<S: PersistentStore>(store: &S) {
    let now = Utc::now() - Duration::seconds(1);
    store.create_blob(&blob("b:edge", now)).await.expect("create");
    store.create_blob(&blob("b:edge:after", now + Duration::hours(1))).await.expect("create");

    let deleted = store.delete_expired_blobs(now).await.expect("sweep");
    assert!(deleted >= 1, "blob expiring at the sweep instant must be deleted");
    assert!(store.get_blob("b:edge:after").await.is_ok());
    store.create_blob(&blob("b:edge", in_one_hour())).await.expect("swept id should be free");
}

/// After a sweep, an expired id can be created again.
pub async fn blob_sweep_frees_id_for_reuse<S: PersistentStore>(store: &S) {
    store
        .create_blob(&blob("b:reuse", Utc::now() - Duration::seconds(5)))
        .await
        .expect("create expired");
    store.delete_expired_blobs(Utc::now()).await.expect("sweep");

    let fresh = Blob::builder().id("b:reuse").data(r#"{"v":2}"#).expires_at(in_one_hour()).build();
    store.create_blob(&fresh).await.expect("id should be free after sweep");
    assert_eq!(store.get_blob("b:reuse").await.expect("get").data, r#"{"v":2}"#);
}

/// Large payloads (1 MiB) round-trip unchanged.
pub async fn blob_large_payload_roundtrip<S: PersistentStore>(store: &S) {
    let data = format!(r#"{{"pad":"{}"}}"#, "x".repeat(1_048_576));
    let big = Blob::builder().id("b:big").data(data.clone()).expires_at(in_one_hour()).build();
    store.create_blob(&big).await.expect("create large blob");

    let fetched = store.get_blob("b:big").await.expect("get large blob");
    assert_eq!(fetched.data.len(), data.len(), "large payload length mismatch");
    assert_eq!(fetched.data, data);
}

/// Non-ASCII payloads round-trip unchanged.
pub async fn blob_unicode_payload_roundtrip<S: PersistentStore>(store: &S) {
    let data = r#"{"greeting":"héllo wörld","emoji":"🦀"}"#;
    let unicode = Blob::builder().id("b:utf8").data(data).expires_at(in_one_hour()).build();
    store.create_blob(&unicode).await.expect("create");
    assert_eq!(store.get_blob("b:utf8").await.expect("get").data, data);
}

// ============================================================================
// API key: record lifecycle, secret hygiene (7 tests)
// ============================================================================

/// `get_api_key_record` on an unknown key returns `NotFound`.
pub async fn key_get_missing_is_not_found<S: PersistentStore>(store: &S) {
    assert_storage_error!(store.get_api_key_record("no-such-key").await, NotFound);
}

/// `create_api_key_record` returns the record that `get_api_key_record` later reads.
pub async fn key_create_then_get<S: PersistentStore>(store: &S) {
    let before = Utc::now() - Duration::seconds(1);
    let created =
        store.create_api_key_record("k:roundtrip", Some("ci runner"), true).await.expect("create");
    assert_eq!(created.key, "k:roundtrip");
    assert_eq!(created.description.as_deref(), Some("ci runner"));
    assert!(created.is_admin);
    assert!(created.created_at >= before, "created_at must be the time of creation");

    let fetched = store.get_api_key_record("k:roundtrip").await.expect("get");
    assert_eq!(fetched.key, created.key);
    assert_eq!(fetched.description, created.description);
    assert_eq!(fetched.is_admin, created.is_admin);
    assert_eq!(fetched.created_at.timestamp_millis(), created.created_at.timestamp_millis());
}

/// A record created without a description reads back without one.
pub async fn key_without_description<S: PersistentStore>(store: &S) {
    store.create_api_key_record("k:nodesc", None, false).await.expect("create");
    let fetched = store.get_api_key_record("k:nodesc").await.expect("get");
    assert_eq!(fetched.description, None);
    assert!(!fetched.is_admin);
}

/// Creating the same key twice fails and leaves the first record intact.
pub async fn key_create_duplicate_conflicts<S: PersistentStore>(store: &S) {
    store.create_api_key_record("k:dup", None, false).await.expect("first create");
    assert_storage_error!(store.create_api_key_record("k:dup", None, true).await, Conflict);

    let fetched = store.get_api_key_record("k:dup").await.expect("get");
    assert!(!fetched.is_admin, "duplicate create must not escalate the existing record");
}

/// `delete_api_key_record` removes the record; a second delete reports `NotFound`.
pub async fn key_delete_then_get_is_not_found<S: PersistentStore>(store: &S) {
    store.create_api_key_record("k:del", None, false).await.expect("create");
    store.delete_api_key_record("k:del").await.expect("delete");

    assert_storage_error!(store.get_api_key_record("k:del").await, NotFound);
    assert_storage_error!(store.delete_api_key_record("k:del").await, NotFound);
}

/// Deleting a key does not touch blobs created with it.
pub async fn key_delete_leaves_blobs<S: PersistentStore>(store: &S) {
    store.create_api_key_record("k:owner", None, false).await.expect("create key");
    let owned = Blob::builder()
        .id("b:owned")
        .data(r#"{"a":1}"#)
        .expires_at(in_one_hour())
        .creator_key("k:owner")
        .build();
    store.create_blob(&owned).await.expect("create blob");

    store.delete_api_key_record("k:owner").await.expect("delete key");
    let fetched = store.get_blob("b:owned").await.expect("blob must survive key deletion");
    assert_eq!(fetched.creator_key, "k:owner");
}

/// Errors about API keys never contain the key itself.
pub async fn key_errors_do_not_leak_secret<S: PersistentStore>(store: &S) {
    let secret = "k:super-secret-value";
    store.create_api_key_record(secret, None, false).await.expect("create");

    let conflict = store.create_api_key_record(secret, None, false).await;
    let missing = store.get_api_key_record("k:another-secret-value").await;
    for err in [conflict.err(), missing.err()].into_iter().flatten() {
        let rendered = format!("{err} {err:?}");
        assert!(!rendered.contains("secret-value"), "error leaked the key: {rendered}");
    }
}

// ============================================================================
// Concurrent: thread-safety under parallel access (3 tests)
// ============================================================================

/// Concurrent creates of the same id: exactly one wins, the rest conflict.
pub async fn concurrent_create_same_id_exactly_one_winner<S: PersistentStore + 'static>(
    store: Arc<S>,
) {
    let mut handles = Vec::new();
    for i in 0u32..10 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let contender = Blob::builder()
                .id("c:race")
                .data(format!(r#"{{"writer":{i}}}"#))
                .expires_at(in_one_hour())
                .build();
            store.create_blob(&contender).await
        }));
    }

    let mut successes = 0u32;
    let mut conflicts = 0u32;
    for handle in handles {
        match handle.await.expect("task join") {
            Ok(()) => successes += 1,
            Err(StorageError::Conflict { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }

    assert_eq!(successes, 1, "exactly one writer should win");
    assert_eq!(conflicts, 9, "remaining writers should get Conflict");
}

/// Concurrent creates of distinct ids all succeed.
pub async fn concurrent_creates_of_distinct_ids<S: PersistentStore + 'static>(store: Arc<S>) {
    let mut handles = Vec::new();
    for i in 0u32..20 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.create_blob(&blob(&format!("c:distinct:{i}"), in_one_hour())).await
        }));
    }
    for handle in handles {
        handle.await.expect("task join").expect("create should succeed");
    }
    for i in 0u32..20 {
        store.get_blob(&format!("c:distinct:{i}")).await.expect("every blob should be readable");
    }
}

/// Concurrent readers of one blob all see the same payload.
pub async fn concurrent_reads_return_consistent_value<S: PersistentStore + 'static>(
    store: Arc<S>,
) {
    store.create_blob(&blob("c:read", in_one_hour())).await.expect("create");

    let mut handles = Vec::new();
    for _ in 0..50 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move { store.get_blob("c:read").await }));
    }
    for handle in handles {
        let fetched = handle.await.expect("task join").expect("concurrent get");
        assert_eq!(fetched.data, r#"{"a":1}"#);
    }
}

// ============================================================================
// Convenience runner
// ============================================================================

/// Run the full conformance suite against one store.
///
/// Every function uses its own ids, so they can share the instance:
///
/// ```no_run
/// use std::sync::Arc;
///
/// use pocketjson_storage::{MemoryStore, conformance};
///
/// #[tokio::test]
/// async fn memory_store_conformance() {
///     conformance::run_all(Arc::new(MemoryStore::new())).await;
/// }
/// ```
pub async fn run_all<S: PersistentStore + 'static>(store: Arc<S>) {
    // Blob
    blob_get_missing_is_not_found(store.as_ref()).await;
    blob_create_then_get_returns_payload(store.as_ref()).await;
    blob_default_creator_is_guest(store.as_ref()).await;
    blob_create_duplicate_conflicts(store.as_ref()).await;
    blob_expired_reads_as_not_found(store.as_ref()).await;
    blob_expired_unswept_id_still_conflicts(store.as_ref()).await;
    blob_sweep_removes_only_expired(store.as_ref()).await;
    blob_sweep_boundary_is_inclusive(store.as_ref()).await;
    blob_sweep_frees_id_for_reuse(store.as_ref()).await;
    blob_large_payload_roundtrip(store.as_ref()).await;
    blob_unicode_payload_roundtrip(store.as_ref()).await;

    // API key
    key_get_missing_is_not_found(store.as_ref()).await;
    key_create_then_get(store.as_ref()).await;
    key_without_description(store.as_ref()).await;
    key_create_duplicate_conflicts(store.as_ref()).await;
    key_delete_then_get_is_not_found(store.as_ref()).await;
    key_delete_leaves_blobs(store.as_ref()).await;
    key_errors_do_not_leak_secret(store.as_ref()).await;

    // Concurrent
    concurrent_create_same_id_exactly_one_winner(Arc::clone(&store)).await;
    concurrent_creates_of_distinct_ids(Arc::clone(&store)).await;
    concurrent_reads_return_consistent_value(Arc::clone(&store)).await;
}
