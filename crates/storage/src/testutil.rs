//! Shared test utilities for persistent store testing.
//!
//! Helpers for building fixtures and asserting on [`StorageResult`] values.
//! Feature-gated behind `testutil` to keep them out of production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! pocketjson-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use pocketjson_storage::testutil::{blob_expiring_in, populated_store};
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::{
    error::{StorageError, StorageResult},
    memory::MemoryStore,
    store::BlobStore,
    types::Blob,
};

/// Payload used by fixtures that do not care about the content.
pub const SAMPLE_PAYLOAD: &str = r#"{"a":1}"#;

/// Create a deterministic blob id from a prefix and index.
///
/// Produces ids like `"prefix-000042"`.
#[must_use]
pub fn make_id(prefix: &str, idx: usize) -> String {
    format!("{prefix}-{idx:06}")
}

/// Create a guest blob with [`SAMPLE_PAYLOAD`] that expires at `expires_at`.
#[must_use]
pub fn blob_expiring_at(id: &str, expires_at: DateTime<Utc>) -> Blob {
    Blob::builder().id(id).data(SAMPLE_PAYLOAD).expires_at(expires_at).build()
}

/// Create a guest blob with [`SAMPLE_PAYLOAD`] that expires `offset` from now.
///
/// A negative offset yields an already expired blob.
#[must_use]
pub fn blob_expiring_in(id: &str, offset: Duration) -> Blob {
    blob_expiring_at(id, Utc::now() + offset)
}

/// Create a [`MemoryStore`] holding `live` live blobs and `expired` expired
/// blobs, with ids `live-NNNNNN` and `expired-NNNNNN`.
///
/// # Panics
///
/// Panics if any create fails (should not happen with `MemoryStore`).
pub async fn populated_store(live: usize, expired: usize) -> MemoryStore {
    let store = MemoryStore::new();
    for i in 0..live {
        store
            .create_blob(&blob_expiring_in(&make_id("live", i), Duration::hours(1)))
            .await
            .expect("populate live blob failed");
    }
    for i in 0..expired {
        store
            .create_blob(&blob_expiring_in(&make_id("expired", i), -Duration::hours(1)))
            .await
            .expect("populate expired blob failed");
    }
    store
}

/// Assert that a [`StorageResult`] is an error of the given
/// [`StorageError`] variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use pocketjson_storage::{StorageError, StorageResult, assert_storage_error};
///
/// let result: StorageResult<()> = Err(StorageError::not_found("missing"));
/// assert_storage_error!(result, NotFound);
/// ```
#[macro_export]
macro_rules! assert_storage_error {
    ($result:expr, $variant:ident) => {
        match $result {
            Err($crate::error::StorageError::$variant { .. }) => {},
            other => panic!(
                "expected StorageError::{}, got: {:?}",
                stringify!($variant),
                other
            ),
        }
    };
}

/// Assert that a [`StorageResult`] is `Ok`, returning the inner value.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}

/// Returns `true` if the result is a `Conflict` error.
pub fn is_conflict<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::Conflict { .. }))
}

/// Returns `true` if the result is a `NotFound` error.
pub fn is_not_found<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::NotFound { .. }))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_make_id_format() {
        assert_eq!(make_id("test", 42), "test-000042");
    }

    #[tokio::test]
    async fn test_populated_store() {
        let store = populated_store(3, 2).await;
        assert_eq!(store.blob_count(), 5);
        assert!(store.get_blob(&make_id("live", 0)).await.is_ok());
        assert!(is_not_found(&store.get_blob(&make_id("expired", 0)).await));
    }

    #[test]
    fn test_assert_storage_error_macro() {
        let result: StorageResult<()> = Err(StorageError::conflict("x"));
        assert_storage_error!(result, Conflict);
    }

    #[test]
    #[should_panic(expected = "expected StorageError::NotFound")]
    fn test_assert_storage_error_macro_mismatch() {
        let result: StorageResult<()> = Err(StorageError::timeout());
        assert_storage_error!(result, NotFound);
    }

    #[test]
    fn test_assert_storage_ok_macro() {
        let result: StorageResult<i32> = Ok(42);
        assert_eq!(assert_storage_ok!(result), 42);
    }

    #[test]
    fn test_is_conflict() {
        assert!(is_conflict::<()>(&Err(StorageError::conflict("x"))));
        assert!(!is_conflict::<()>(&Ok(())));
    }
}
