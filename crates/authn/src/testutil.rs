//! Shared test utilities for API key validation testing.
//!
//! [`CountingStore`] wraps a [`MemoryStore`] and records how often API keys
//! are looked up. It can also inject lookup failures and hold lookups at a
//! gate to reproduce races. Feature-gated behind `testutil`.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! pocketjson-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use pocketjson_authn::testutil::CountingStore;
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pocketjson_storage::{
    ApiKeyRecord, ApiKeyStore, Blob, BlobStore, MemoryStore, StorageError, StorageResult,
};
use tokio::sync::Notify;

/// A store that counts API key lookups and can fail or stall them on demand.
///
/// Blob operations and key writes pass straight through to [`inner`](Self::inner).
#[derive(Default)]
pub struct CountingStore {
    /// The wrapped store. Write to it directly to seed fixtures.
    pub inner: MemoryStore,
    lookups: AtomicUsize,
    fail_with: Mutex<Option<fn() -> StorageError>>,
    gate_enabled: AtomicBool,
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl CountingStore {
    /// Creates an empty counting store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get_api_key_record` calls so far.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Resets the lookup counter.
    pub fn reset_lookups(&self) {
        self.lookups.store(0, Ordering::SeqCst);
    }

    /// Makes every lookup fail with the error built by `factory`, or clears
    /// the failure when `None`.
    pub fn set_failure(&self, factory: Option<fn() -> StorageError>) {
        *self.fail_with.lock() = factory;
    }

    /// Holds every subsequent lookup until [`release_lookup`](Self::release_lookup).
    ///
    /// Each held lookup signals [`lookup_started`](Self::lookup_started) first.
    pub fn enable_gate(&self) {
        self.gate_enabled.store(true, Ordering::SeqCst);
    }

    /// Waits until a gated lookup has reached the store.
    pub async fn lookup_started(&self) {
        self.started.notified().await;
    }

    /// Lets one gated lookup proceed.
    pub fn release_lookup(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl ApiKeyStore for CountingStore {
    async fn create_api_key_record(
        &self,
        key: &str,
        description: Option<&str>,
        is_admin: bool,
    ) -> StorageResult<ApiKeyRecord> {
        self.inner.create_api_key_record(key, description, is_admin).await
    }

    async fn get_api_key_record(&self, key: &str) -> StorageResult<ApiKeyRecord> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.gate_enabled.load(Ordering::SeqCst) {
            self.started.notify_one();
            self.release.notified().await;
        }

        let failure = *self.fail_with.lock();
        if let Some(factory) = failure {
            return Err(factory());
        }

        self.inner.get_api_key_record(key).await
    }

    async fn delete_api_key_record(&self, key: &str) -> StorageResult<()> {
        self.inner.delete_api_key_record(key).await
    }
}

#[async_trait]
impl BlobStore for CountingStore {
    async fn create_blob(&self, blob: &Blob) -> StorageResult<()> {
        self.inner.create_blob(blob).await
    }

    async fn get_blob(&self, id: &str) -> StorageResult<Blob> {
        self.inner.get_blob(id).await
    }

    async fn delete_expired_blobs(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        self.inner.delete_expired_blobs(now).await
    }
}
