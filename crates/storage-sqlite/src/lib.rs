//! SQLite-backed implementation of the PocketJSON persistence contract.
//!
//! [`SqliteStore`] implements [`BlobStore`](pocketjson_storage::BlobStore) and
//! [`ApiKeyStore`](pocketjson_storage::ApiKeyStore) on a single SQLite file.
//!
//! # Features
//!
//! - **Create-only writes**: duplicate ids and keys surface as `Conflict`
//! - **Indexed sweeps**: expiry is indexed so the reaper's bulk delete stays cheap
//! - **Non-blocking**: statements run on tokio's blocking pool
//!
//! # Schema
//!
//! | Table | Columns |
//! |-------|---------|
//! | `json_storage` | `id` (PK), `data`, `expires_at`, `creator_key` |
//! | `api_keys` | `key` (PK), `description`, `created_at`, `is_admin` |
//!
//! Timestamps are Unix milliseconds. The schema version lives in
//! `PRAGMA user_version`; opening a file written by a newer version fails.
//!
//! # Quick Start
//!
//! ```no_run
//! use pocketjson_storage::BlobStore;
//! use pocketjson_storage_sqlite::{SqliteStore, SqliteStoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SqliteStoreConfig::builder().path("pocketjson.db").build()?;
//!     let store = SqliteStore::open(config).await?;
//!
//!     let removed = store.delete_expired_blobs(chrono::Utc::now()).await?;
//!     println!("removed {removed} expired blobs");
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

mod backend;
mod config;
mod error;

pub use backend::SqliteStore;
pub use config::{IN_MEMORY_PATH, JournalMode, SqliteStoreConfig};
pub use error::{Result, SqliteStoreError};
