//! # PocketJSON Authentication
//!
//! API key validation for PocketJSON.
//!
//! This crate provides:
//! - **Master key**: a configured admin credential compared in constant time
//! - **API key cache**: store-backed verdict cache with positive and negative TTLs
//!
//! Every request presents an API key. [`ApiKeyCache::validate`] turns it into
//! a [`KeyVerdict`] using the master key first, then the cache, then the key
//! store. Unknown keys are a verdict, not an error; only store failures
//! surface as [`AuthError`].
//!
//! ## Example
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use pocketjson_authn::{ApiKeyCache, MasterKey};
//! use pocketjson_storage::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let cache = ApiKeyCache::new(store, MasterKey::new("change-me"))
//!     .with_ttls(Duration::from_secs(300), Duration::from_secs(30));
//!
//! let verdict = cache.validate("some-key").await?;
//! if !verdict.is_valid {
//!     println!("rejected");
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// API key verdict cache.
pub mod api_key_cache;
/// Authentication error types.
pub mod error;
/// Configured master key.
pub mod master_key;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;

// Re-export key types for convenience
pub use api_key_cache::{
    ApiKeyCache, ApiKeyCacheMetrics, DEFAULT_NEGATIVE_TTL, DEFAULT_POSITIVE_TTL, KeyVerdict,
};
pub use error::{AuthError, Result};
pub use master_key::MasterKey;
