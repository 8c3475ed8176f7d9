//! Persistence contract for blobs and API key records.
//!
//! The traits here are the only surface the rest of the system uses to reach
//! durable storage. They are deliberately narrow: point lookups, create-only
//! writes, and a single bulk delete for the reaper.
//!
//! # Semantics
//!
//! | Operation | Success | Failure |
//! |-----------|---------|---------|
//! | [`create_blob`](BlobStore::create_blob) | stored | `Conflict` if the id exists |
//! | [`get_blob`](BlobStore::get_blob) | live blob | `NotFound` if absent or expired |
//! | [`delete_expired_blobs`](BlobStore::delete_expired_blobs) | count deleted | backend error |
//! | [`create_api_key_record`](ApiKeyStore::create_api_key_record) | new record | `Conflict` if the key exists |
//! | [`get_api_key_record`](ApiKeyStore::get_api_key_record) | record | `NotFound` if absent |
//! | [`delete_api_key_record`](ApiKeyStore::delete_api_key_record) | removed | `NotFound` if absent |
//!
//! Each operation is independently atomic. No operation spans more than one
//! blob or record.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use chrono::{Duration, Utc};
//! use pocketjson_storage::{Blob, BlobStore, MemoryStore, PersistentStore};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let store: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());
//!
//! let blob = Blob::builder()
//!     .id("abc")
//!     .data(r#"{"a":1}"#)
//!     .expires_at(Utc::now() + Duration::hours(1))
//!     .build();
//! store.create_blob(&blob).await.unwrap();
//!
//! assert_eq!(store.get_blob("abc").await.unwrap().data, r#"{"a":1}"#);
//! # });
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::StorageResult,
    types::{ApiKeyRecord, Blob},
};

/// Storage for JSON blobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores a new blob.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Conflict`](crate::StorageError::Conflict) if a blob with the same id is
    ///   already stored. This includes blobs that have expired but have not yet been swept; an id
    ///   only becomes free again once the reaper removes it.
    /// - Any other variant when the backend fails.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn create_blob(&self, blob: &Blob) -> StorageResult<()>;

    /// Retrieves a live blob by id.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`](crate::StorageError::NotFound) if the blob is absent or its
    /// `expires_at` has passed.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get_blob(&self, id: &str) -> StorageResult<Blob>;

    /// Deletes every blob whose `expires_at <= now`.
    ///
    /// Returns the number of blobs removed.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete_expired_blobs(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}

/// Storage for issued API keys.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Stores a new API key record and returns it with its creation time.
    ///
    /// # Errors
    ///
    /// [`StorageError::Conflict`](crate::StorageError::Conflict) if the key already exists.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn create_api_key_record(
        &self,
        key: &str,
        description: Option<&str>,
        is_admin: bool,
    ) -> StorageResult<ApiKeyRecord>;

    /// Retrieves an API key record.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`](crate::StorageError::NotFound) if no such key exists.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get_api_key_record(&self, key: &str) -> StorageResult<ApiKeyRecord>;

    /// Deletes an API key record.
    ///
    /// Blobs created with the key are left untouched.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`](crate::StorageError::NotFound) if no such key exists.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete_api_key_record(&self, key: &str) -> StorageResult<()>;
}

/// A backend that stores both blobs and API keys.
///
/// Implemented automatically for every type that implements [`BlobStore`]
/// and [`ApiKeyStore`].
pub trait PersistentStore: BlobStore + ApiKeyStore {}

impl<T: BlobStore + ApiKeyStore + ?Sized> PersistentStore for T {}
