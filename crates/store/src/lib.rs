//! # PocketJSON
//!
//! An ephemeral, multi-tenant store for JSON blobs.
//!
//! Anonymous callers get short-lived, size-limited storage. Holders of an API
//! key get larger quotas, custom ids namespaced to their key, and a choice of
//! expiry. This crate is the runtime between the HTTP surface and the
//! persistent store:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                HTTP layer (not in this crate)            │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//! ┌────────────────────────────▼─────────────────────────────┐
//! │  Store: authenticate → quota → id/expiry → persistence   │
//! │    ├── ApiKeyCache (pocketjson-authn)                    │
//! │    └── Reaper: blob sweep + cache sweep tasks            │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │ Arc<dyn PersistentStore>
//! ┌────────────────────────────▼─────────────────────────────┐
//! │  MemoryStore │ SqliteStore (pocketjson-storage-sqlite)   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pocketjson::{CreateBlobRequest, Expiry, Store, StoreConfig};
//! use pocketjson_storage::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::builder().master_api_key("change-me").build()?;
//! let store = Store::new(Arc::new(MemoryStore::new()), config)?;
//!
//! let issued = store.issue_api_key("change-me", Some("reports"), false).await?;
//!
//! let request = CreateBlobRequest::builder().custom_id("weekly").expiry(Expiry::Never).build();
//! let payload = serde_json::json!({"ok": true});
//! let created = store.create_blob(Some(&issued.key), &payload, request).await?;
//! assert_eq!(created.id, format!("{}_weekly", issued.client_id));
//!
//! store.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod quota;
pub mod reaper;
pub mod store;

pub use config::{
    DEFAULT_AUTHENTICATED_MAX_PAYLOAD_BYTES, DEFAULT_BLOB_SWEEP_INTERVAL,
    DEFAULT_BLOB_SWEEP_TIMEOUT, DEFAULT_CACHE_SWEEP_INTERVAL, DEFAULT_EXPIRY,
    DEFAULT_GUEST_MAX_PAYLOAD_BYTES, StoreConfig,
};
pub use error::{ConfigError, StoreError};
pub use pocketjson_authn::{ApiKeyCacheMetrics, KeyVerdict};
pub use quota::{Caller, Expiry, Quota};
pub use reaper::{Reaper, ReaperStats, sweep_expired_blobs_once};
pub use store::{CreateBlobRequest, CreatedBlob, IssuedApiKey, Store};
