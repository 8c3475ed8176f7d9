//! Background deletion of expired state.
//!
//! The [`Reaper`] runs two independent tasks:
//!
//! ```text
//! blob sweep  (every blob_sweep_interval)  → delete_expired_blobs(now), bounded by blob_sweep_timeout
//! cache sweep (every cache_sweep_interval) → ApiKeyCache::sweep_expired()
//! ```
//!
//! Both wait one full interval before their first sweep. A failed or timed
//! out blob sweep is logged and retried on the next tick. Both tasks watch
//! one [`CancellationToken`] and exit at the next tick boundary after
//! [`Reaper::shutdown`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use fail::fail_point;
use pocketjson_authn::ApiKeyCache;
use pocketjson_storage::{BlobStore, PersistentStore, StorageError, StorageResult};
use tokio::time::MissedTickBehavior;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::config::StoreConfig;

/// Deletes every blob with `expires_at <= now`, giving up after `timeout`.
///
/// Returns the number of blobs deleted.
///
/// # Errors
///
/// Returns [`StorageError::Timeout`] if the store does not answer within
/// `timeout`, or the store's own error.
#[tracing::instrument(skip(store))]
pub async fn sweep_expired_blobs_once<S>(
    store: &S,
    now: DateTime<Utc>,
    timeout: Duration,
) -> StorageResult<u64>
where
    S: BlobStore + ?Sized,
{
    fail_point!("reaper-before-blob-sweep", |_| {
        Err(StorageError::internal("injected failure before blob sweep"))
    });

    match tokio::time::timeout(timeout, store.delete_expired_blobs(now)).await {
        Ok(result) => result,
        Err(_elapsed) => Err(StorageError::timeout()),
    }
}

/// Point-in-time counters for a [`Reaper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReaperStats {
    /// Blob sweeps that completed successfully.
    pub blob_sweeps: u64,
    /// Blob sweeps that failed or timed out.
    pub blob_sweep_failures: u64,
    /// Blobs deleted across all sweeps.
    pub blobs_deleted: u64,
    /// Cache sweeps run.
    pub cache_sweeps: u64,
    /// Cache entries evicted across all sweeps.
    pub cache_entries_evicted: u64,
}

#[derive(Debug, Default)]
struct Counters {
    blob_sweeps: AtomicU64,
    blob_sweep_failures: AtomicU64,
    blobs_deleted: AtomicU64,
    cache_sweeps: AtomicU64,
    cache_entries_evicted: AtomicU64,
}

/// Handle to the two sweep tasks.
///
/// Dropping the handle cancels both tasks without waiting for them.
pub struct Reaper {
    cancel_token: CancellationToken,
    tracker: TaskTracker,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for Reaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reaper")
            .field("cancelled", &self.cancel_token.is_cancelled())
            .field("tasks", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

impl Reaper {
    /// Spawns the blob and cache sweep tasks.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    #[must_use]
    pub fn start(
        persistence: Arc<dyn PersistentStore>,
        cache: Arc<ApiKeyCache>,
        config: &StoreConfig,
    ) -> Self {
        let cancel_token = CancellationToken::new();
        let counters = Arc::new(Counters::default());

        let tracker = TaskTracker::new();

        spawn_supervised(
            &tracker,
            "blob",
            run_blob_sweeps(
                persistence,
                config.blob_sweep_interval(),
                config.blob_sweep_timeout(),
                cancel_token.clone(),
                Arc::clone(&counters),
            ),
        );
        spawn_supervised(
            &tracker,
            "cache",
            run_cache_sweeps(
                cache,
                config.cache_sweep_interval(),
                cancel_token.clone(),
                Arc::clone(&counters),
            ),
        );
        tracker.close();

        tracing::debug!(
            blob_sweep_interval = ?config.blob_sweep_interval(),
            cache_sweep_interval = ?config.cache_sweep_interval(),
            "reaper started"
        );

        Self { cancel_token, tracker, counters }
    }

    /// Cancels both tasks and waits for them to exit.
    ///
    /// Every caller, including concurrent ones, returns only after both
    /// tasks have exited. Calls after that return immediately.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        self.tracker.wait().await;
    }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Returns the cancellation token shared by both tasks.
    ///
    /// Callers can use this to integrate with external shutdown signals.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Returns a snapshot of the sweep counters.
    #[must_use]
    pub fn stats(&self) -> ReaperStats {
        ReaperStats {
            blob_sweeps: self.counters.blob_sweeps.load(Ordering::Relaxed),
            blob_sweep_failures: self.counters.blob_sweep_failures.load(Ordering::Relaxed),
            blobs_deleted: self.counters.blobs_deleted.load(Ordering::Relaxed),
            cache_sweeps: self.counters.cache_sweeps.load(Ordering::Relaxed),
            cache_entries_evicted: self.counters.cache_entries_evicted.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Spawns `task` on `tracker`, logging if it panics.
fn spawn_supervised<F>(tracker: &TaskTracker, name: &'static str, task: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(task);
    tracker.spawn(async move {
        if let Err(err) = handle.await {
            tracing::warn!(task = name, error = %err, "reaper task panicked");
        }
    });
}

async fn run_blob_sweeps(
    persistence: Arc<dyn PersistentStore>,
    interval: Duration,
    timeout: Duration,
    token: CancellationToken,
    counters: Arc<Counters>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; consume it so we start
    // with a full interval wait.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!("blob sweep task shutting down");
                break;
            }
            _ = ticker.tick() => {
                match sweep_expired_blobs_once(persistence.as_ref(), Utc::now(), timeout).await {
                    Ok(deleted) => {
                        counters.blob_sweeps.fetch_add(1, Ordering::Relaxed);
                        counters.blobs_deleted.fetch_add(deleted, Ordering::Relaxed);
                        tracing::debug!(deleted, "expired blob sweep complete");
                    },
                    Err(err) => {
                        counters.blob_sweep_failures.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %err, "expired blob sweep failed");
                    },
                }
            }
        }
    }
}

async fn run_cache_sweeps(
    cache: Arc<ApiKeyCache>,
    interval: Duration,
    token: CancellationToken,
    counters: Arc<Counters>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!("cache sweep task shutting down");
                break;
            }
            _ = ticker.tick() => {
                let evicted = cache.sweep_expired();
                counters.cache_sweeps.fetch_add(1, Ordering::Relaxed);
                counters.cache_entries_evicted.fetch_add(evicted as u64, Ordering::Relaxed);
            }
        }
    }
}
