//! In-memory persistent store implementation.
//!
//! This module provides [`MemoryStore`], an in-memory implementation of
//! [`BlobStore`] and [`ApiKeyStore`] suitable for testing and development.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Logical expiry**: expired blobs are invisible to reads immediately, and physically removed
//!   by [`delete_expired_blobs`](BlobStore::delete_expired_blobs)
//! - **Create-only writes**: existing ids and keys are never overwritten
//!
//! # Example
//!
//! ```
//! use pocketjson_storage::{ApiKeyStore, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!
//!     store.create_api_key_record("k1", Some("ci"), false).await.unwrap();
//!     let record = store.get_api_key_record("k1").await.unwrap();
//!
//!     assert!(!record.is_admin);
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - Nothing removes expired blobs unless the reaper (or a caller) sweeps

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{
    error::{StorageError, StorageResult},
    store::{ApiKeyStore, BlobStore},
    types::{ApiKeyRecord, Blob},
};

/// In-memory store using two [`HashMap`]s.
///
/// # Cloning
///
/// `MemoryStore` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<RwLock<HashMap<String, Blob>>>,
    keys: Arc<RwLock<HashMap<String, ApiKeyRecord>>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs physically held, including expired ones not yet swept.
    #[must_use]
    pub fn blob_count(&self) -> usize {
        self.blobs.read().len()
    }

    /// Number of API key records held.
    #[must_use]
    pub fn api_key_count(&self) -> usize {
        self.keys.read().len()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("blobs", &self.blob_count())
            .field("api_keys", &self.api_key_count())
            .finish()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    #[tracing::instrument(skip(self, blob), fields(id = %blob.id))]
    async fn create_blob(&self, blob: &Blob) -> StorageResult<()> {
        let mut blobs = self.blobs.write();
        match blobs.entry(blob.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::conflict(&blob.id)),
            Entry::Vacant(entry) => {
                entry.insert(blob.clone());
                Ok(())
            },
        }
    }

    #[tracing::instrument(skip(self))]
    async fn get_blob(&self, id: &str) -> StorageResult<Blob> {
        let now = Utc::now();
        let blobs = self.blobs.read();
        blobs
            .get(id)
            .filter(|blob| blob.is_live_at(now))
            .cloned()
            .ok_or_else(|| StorageError::not_found(id))
    }

    #[tracing::instrument(skip(self))]
    async fn delete_expired_blobs(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        // Phase 1: collect under the read lock so concurrent reads proceed
        // during the scan.
        let expired: Vec<String> = {
            let blobs = self.blobs.read();
            blobs
                .values()
                .filter(|blob| !blob.is_live_at(now))
                .map(|blob| blob.id.clone())
                .collect()
        };

        if expired.is_empty() {
            return Ok(0);
        }

        // Phase 2: remove in a single critical section. Re-check liveness in
        // case an id was reaped and re-created between the two phases.
        let mut blobs = self.blobs.write();
        let mut deleted = 0u64;
        for id in &expired {
            if blobs.get(id).is_some_and(|blob| !blob.is_live_at(now)) {
                blobs.remove(id);
                deleted += 1;
            }
        }

        Ok(deleted)
    }
}

#[async_trait]
impl ApiKeyStore for MemoryStore {
    #[tracing::instrument(skip(self, key))]
    async fn create_api_key_record(
        &self,
        key: &str,
        description: Option<&str>,
        is_admin: bool,
    ) -> StorageResult<ApiKeyRecord> {
        let mut keys = self.keys.write();
        match keys.entry(key.to_owned()) {
            // The key itself is secret; report the conflict without it.
            Entry::Occupied(_) => Err(StorageError::conflict("api key")),
            Entry::Vacant(entry) => {
                let record = ApiKeyRecord::builder()
                    .key(key)
                    .maybe_description(description)
                    .is_admin(is_admin)
                    .build();
                entry.insert(record.clone());
                Ok(record)
            },
        }
    }

    #[tracing::instrument(skip(self, key))]
    async fn get_api_key_record(&self, key: &str) -> StorageResult<ApiKeyRecord> {
        let keys = self.keys.read();
        keys.get(key).cloned().ok_or_else(|| StorageError::not_found("api key"))
    }

    #[tracing::instrument(skip(self, key))]
    async fn delete_api_key_record(&self, key: &str) -> StorageResult<()> {
        let mut keys = self.keys.write();
        match keys.remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found("api key")),
        }
    }
}
