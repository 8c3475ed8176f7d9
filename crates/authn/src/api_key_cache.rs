//! Time-bounded cache of API key verdicts.
//!
//! This module provides [`ApiKeyCache`], which answers "is this key valid,
//! and is it an admin?" without a store round-trip on every request.
//!
//! # Lookup Order
//!
//! ```text
//! key arrives → master key? (constant time)  → admin, never cached
//!             → empty?                       → invalid, never cached
//!             → live cache entry?            → cached verdict
//!             → store lookup (no lock held)
//!                 found     → (valid, is_admin), positive TTL
//!                 not found → invalid, negative TTL
//!                 error     → AuthError, not cached
//! ```
//!
//! # Cache Strategy
//!
//! - **Positive TTL**: Default 300 seconds (5 minutes)
//! - **Negative TTL**: Default 30 seconds
//! - **Eviction**: [`sweep_expired`](ApiKeyCache::sweep_expired), run periodically by the reaper
//! - **Invalidation**: [`invalidate`](ApiKeyCache::invalidate) after revoking a key collapses the
//!   positive window
//!
//! The store is the source of truth; the cache may lag it by at most one TTL.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use pocketjson_authn::{ApiKeyCache, MasterKey};
//! use pocketjson_storage::{ApiKeyStore, MemoryStore};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! store.create_api_key_record("user-key", None, false).await.unwrap();
//!
//! let cache = ApiKeyCache::new(store, MasterKey::new("master"));
//!
//! let verdict = cache.validate("user-key").await.unwrap();
//! assert!(verdict.is_valid && !verdict.is_admin);
//!
//! let verdict = cache.validate("master").await.unwrap();
//! assert!(verdict.is_valid && verdict.is_admin);
//! # });
//! ```

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use fail::fail_point;
use parking_lot::RwLock;
use pocketjson_storage::{ApiKeyStore, StorageError, derive_namespace_prefix};
use tokio::time::Instant;

use crate::{error::AuthError, master_key::MasterKey};

/// Default lifetime of a cached valid verdict (5 minutes).
pub const DEFAULT_POSITIVE_TTL: Duration = Duration::from_secs(300);

/// Default lifetime of a cached invalid verdict (30 seconds).
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(30);

/// Outcome of validating an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyVerdict {
    /// The key is the master key or a stored key.
    pub is_valid: bool,
    /// The key may issue and revoke keys.
    pub is_admin: bool,
}

impl KeyVerdict {
    /// Verdict for an unknown or empty key.
    pub const INVALID: Self = Self { is_valid: false, is_admin: false };

    /// Verdict for the master key.
    pub const MASTER: Self = Self { is_valid: true, is_admin: true };

    /// Verdict for a stored key.
    #[must_use]
    pub const fn valid(is_admin: bool) -> Self {
        Self { is_valid: true, is_admin }
    }
}

/// Point-in-time counters for an [`ApiKeyCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApiKeyCacheMetrics {
    /// Lookups answered from a live cache entry.
    pub hits: u64,
    /// Lookups that went to the store.
    pub misses: u64,
    /// Store lookups that failed with an error other than not-found.
    pub store_errors: u64,
    /// Lookups answered by the master key.
    pub master_key_hits: u64,
    /// Entries currently held, live or not yet swept.
    pub entries: usize,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    verdict: KeyVerdict,
    expires_at: Instant,
}

/// Cache of API key verdicts backed by an [`ApiKeyStore`].
///
/// One [`RwLock`] guards the map. Cache hits take only the read lock; the
/// store is queried with no lock held, so two concurrent misses for the same
/// key may both reach the store.
///
/// # Invalidation Races
///
/// A lookup that is in flight while [`invalidate`](Self::invalidate) runs
/// still returns its verdict to its caller, but does not install it.
/// Otherwise a revocation could be undone by a lookup that read the record
/// just before it was deleted.
pub struct ApiKeyCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    key_store: Arc<dyn ApiKeyStore>,
    master_key: Option<MasterKey>,
    positive_ttl: Duration,
    negative_ttl: Duration,
    /// Bumped on every invalidation, under the write lock.
    invalidation_gen: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    store_errors: AtomicU64,
    master_key_hits: AtomicU64,
}

impl std::fmt::Debug for ApiKeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyCache")
            .field("entries", &self.len())
            .field("has_master_key", &self.master_key.is_some())
            .field("positive_ttl", &self.positive_ttl)
            .field("negative_ttl", &self.negative_ttl)
            .finish_non_exhaustive()
    }
}

impl ApiKeyCache {
    /// Creates a cache with the default TTLs.
    #[must_use]
    pub fn new(key_store: Arc<dyn ApiKeyStore>, master_key: Option<MasterKey>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            key_store,
            master_key,
            positive_ttl: DEFAULT_POSITIVE_TTL,
            negative_ttl: DEFAULT_NEGATIVE_TTL,
            invalidation_gen: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
            master_key_hits: AtomicU64::new(0),
        }
    }

    /// Sets the lifetimes of valid and invalid verdicts.
    #[must_use]
    pub fn with_ttls(mut self, positive: Duration, negative: Duration) -> Self {
        self.positive_ttl = positive;
        self.negative_ttl = negative;
        self
    }

    /// Validates an API key.
    ///
    /// Unknown keys are not errors; they return [`KeyVerdict::INVALID`] and
    /// are remembered for the negative TTL.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] if the store fails for any reason other
    /// than the key being absent. Such failures are not cached.
    #[tracing::instrument(skip(self, api_key))]
    pub async fn validate(&self, api_key: &str) -> Result<KeyVerdict, AuthError> {
        if let Some(master) = &self.master_key
            && master.matches(api_key)
        {
            self.master_key_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(KeyVerdict::MASTER);
        }

        if api_key.is_empty() {
            return Ok(KeyVerdict::INVALID);
        }

        let cached = {
            let now = Instant::now();
            let entries = self.entries.read();
            entries.get(api_key).filter(|entry| now < entry.expires_at).map(|entry| entry.verdict)
        };
        if let Some(verdict) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(cache = "hit", is_valid = verdict.is_valid, "api key verdict");
            return Ok(verdict);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(cache = "miss", "api key verdict");

        // Snapshot before the store call; `invalidate` bumps it.
        let gen_before = self.invalidation_gen.load(Ordering::Acquire);

        fail_point!("cache-before-store-fetch", |_| {
            Err(AuthError::storage(StorageError::internal("injected failure before store fetch")))
        });
        let (verdict, ttl) = match self.key_store.get_api_key_record(api_key).await {
            Ok(record) => (KeyVerdict::valid(record.is_admin), self.positive_ttl),
            Err(StorageError::NotFound { .. }) => (KeyVerdict::INVALID, self.negative_ttl),
            Err(err) => {
                self.store_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %err, "api key lookup failed");
                return Err(AuthError::storage(err));
            },
        };

        let mut entries = self.entries.write();
        if self.invalidation_gen.load(Ordering::Acquire) != gen_before {
            tracing::debug!("discarding lookup result: invalidation occurred during fetch");
            return Ok(verdict);
        }
        let entry = CacheEntry { verdict, expires_at: Instant::now() + ttl };
        entries.insert(api_key.to_owned(), entry);

        Ok(verdict)
    }

    /// Removes any cached verdict for `api_key`.
    ///
    /// Call this after revoking a key. An audit event is emitted at INFO
    /// level; the key is identified by its namespace prefix only.
    #[tracing::instrument(skip(self, api_key))]
    pub fn invalidate(&self, api_key: &str) {
        let removed = {
            let mut entries = self.entries.write();
            self.invalidation_gen.fetch_add(1, Ordering::Release);
            entries.remove(api_key).is_some()
        };
        tracing::info!(
            audit.action = "invalidate_api_key_cache",
            audit.resource = %format_args!("ns:{}", derive_namespace_prefix(api_key)),
            audit.result = "success",
            removed,
            "audit_event"
        );
    }

    /// Removes every entry whose expiry has passed and returns how many were
    /// removed.
    #[tracing::instrument(skip(self))]
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();

        // Phase 1: collect under the read lock so validations proceed.
        let expired: Vec<String> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|(_, entry)| entry.expires_at <= now)
                .map(|(key, _)| key.clone())
                .collect()
        };

        if expired.is_empty() {
            return 0;
        }

        // Phase 2: remove, re-checking in case an entry was refreshed.
        let mut entries = self.entries.write();
        let mut evicted = 0;
        for key in &expired {
            if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
                entries.remove(key);
                evicted += 1;
            }
        }
        drop(entries);

        tracing::debug!(evicted, "swept expired api key verdicts");
        evicted
    }

    /// Removes every entry.
    ///
    /// In-flight lookups will not install their results.
    #[tracing::instrument(skip(self))]
    pub fn clear(&self) {
        let evicted = {
            let mut entries = self.entries.write();
            self.invalidation_gen.fetch_add(1, Ordering::Release);
            let evicted = entries.len();
            entries.clear();
            evicted
        };
        tracing::info!(
            audit.action = "clear_api_key_cache",
            audit.resource = "all_api_keys",
            audit.result = "success",
            audit.evicted = evicted,
            "audit_event"
        );
    }

    /// Number of entries held, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns `true` if a master key is configured.
    #[must_use]
    pub fn has_master_key(&self) -> bool {
        self.master_key.is_some()
    }

    /// Lifetime of a cached valid verdict.
    #[must_use]
    pub fn positive_ttl(&self) -> Duration {
        self.positive_ttl
    }

    /// Lifetime of a cached invalid verdict.
    #[must_use]
    pub fn negative_ttl(&self) -> Duration {
        self.negative_ttl
    }

    /// Returns a snapshot of the cache counters.
    #[must_use]
    pub fn metrics(&self) -> ApiKeyCacheMetrics {
        ApiKeyCacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            master_key_hits: self.master_key_hits.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
