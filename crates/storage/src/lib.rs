//! Persistence contract and identifier rules for PocketJSON.
//!
//! This crate defines the [`BlobStore`] and [`ApiKeyStore`] traits that every
//! storage backend implements, the record types flowing through them, and the
//! rules that turn API keys into namespaces and callers into blob ids.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      pocketjson::Store                      │
//! │      (authentication, quotas, id assignment, expiry)        │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │   pocketjson-authn           │   pocketjson reaper          │
//! │   ApiKeyCache                │   periodic sweeps            │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                  pocketjson-storage                         │
//! │          BlobStore + ApiKeyStore = PersistentStore          │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryStore  │          SqliteStore                         │
//! │  (testing)   │  (pocketjson-storage-sqlite, durable)        │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use chrono::{Duration, Utc};
//! use pocketjson_storage::{ApiKeyStore, Blob, BlobStore, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!
//!     store
//!         .create_blob(
//!             &Blob::builder()
//!                 .id("a1b2")
//!                 .data(r#"{"hello":"world"}"#)
//!                 .expires_at(Utc::now() + Duration::hours(48))
//!                 .build(),
//!         )
//!         .await?;
//!     assert_eq!(store.get_blob("a1b2").await?.data, r#"{"hello":"world"}"#);
//!
//!     let record = store.create_api_key_record("k1", Some("ci"), false).await?;
//!     assert!(!record.is_admin);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Available Backends
//!
//! | Backend | Use Case | Persistence |
//! |---------|----------|-------------|
//! | [`MemoryStore`] | Testing, development | No |
//! | `SqliteStore` (in `pocketjson-storage-sqlite`) | Production | Yes |
//!
//! # Implementing a Backend
//!
//! 1. Implement [`BlobStore`] and [`ApiKeyStore`]; [`PersistentStore`] follows automatically
//! 2. Map backend-specific errors to [`StorageError`]
//! 3. Run the [`conformance`] suite against it
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` and `conformance` modules (fixtures, assertion macros,
//!   and the backend conformance suite). Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]

#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod conformance;
pub mod error;
pub mod ids;
pub mod memory;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use error::{BoxError, StorageError, StorageResult};
pub use ids::{
    ID_SEPARATOR, IdError, MAX_CUSTOM_ID_LEN, NAMESPACE_PREFIX_LEN, RANDOM_ID_BYTES, compose_id,
    derive_namespace_prefix, generate_random_id, validate_custom_id,
};
pub use memory::MemoryStore;
pub use store::{ApiKeyStore, BlobStore, PersistentStore};
pub use types::{ApiKeyRecord, Blob, GUEST_CREATOR};
