//! Identifier and namespace rules.
//!
//! Blob ids come in two shapes:
//!
//! - **Random**: 32 lowercase hex characters from the OS CSPRNG, used for guests and for
//!   authenticated callers that do not pick an id.
//! - **Namespaced**: `{prefix}_{custom_id}`, where `prefix` is derived from the caller's API key
//!   so that two keys can never claim the same custom id and the prefix does not reveal the key.
//!
//! ```
//! use pocketjson_storage::ids::{compose_id, derive_namespace_prefix, validate_custom_id};
//!
//! let prefix = derive_namespace_prefix("my-api-key");
//! assert_eq!(prefix.len(), 10);
//! assert!(validate_custom_id("report"));
//! assert_eq!(compose_id(&prefix, "report"), format!("{prefix}_report"));
//! ```

use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of the namespace prefix in hex characters.
pub const NAMESPACE_PREFIX_LEN: usize = 10;

/// Longest accepted custom id.
pub const MAX_CUSTOM_ID_LEN: usize = 64;

/// Bytes of randomness in a generated id (hex-encoded to twice this length).
pub const RANDOM_ID_BYTES: usize = 16;

/// Separator between namespace prefix and custom id.
pub const ID_SEPARATOR: char = '_';

/// Failure to produce a random identifier.
#[derive(Debug, Error)]
#[error("random id generation failed: {0}")]
pub struct IdError(#[source] <OsRng as TryRngCore>::Error);

/// Derives the namespace prefix for an API key.
///
/// The first [`NAMESPACE_PREFIX_LEN`] hex characters of SHA-256 over the key.
/// Stable across processes and restarts.
#[must_use]
pub fn derive_namespace_prefix(api_key: &str) -> String {
    let digest = Sha256::digest(api_key.as_bytes());
    // Five bytes encode to exactly ten hex characters.
    hex::encode(&digest[..NAMESPACE_PREFIX_LEN / 2])
}

/// Returns `true` if `id` is an acceptable custom identifier.
///
/// Accepts 1 to [`MAX_CUSTOM_ID_LEN`] bytes drawn from `[A-Za-z0-9_-]`.
#[must_use]
pub fn validate_custom_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_CUSTOM_ID_LEN
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Joins a namespace prefix and a validated custom id.
#[must_use]
pub fn compose_id(prefix: &str, custom_id: &str) -> String {
    format!("{prefix}{ID_SEPARATOR}{custom_id}")
}

/// Generates a random identifier from the operating system's CSPRNG.
///
/// # Errors
///
/// Returns [`IdError`] if the OS randomness source fails. There is no
/// fallback to a weaker generator.
pub fn generate_random_id() -> Result<String, IdError> {
    let mut bytes = [0u8; RANDOM_ID_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(IdError)?;
    Ok(hex::encode(bytes))
}
