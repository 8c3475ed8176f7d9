//! Authentication error types.

use pocketjson_storage::StorageError;
use thiserror::Error;

/// Errors raised while validating an API key.
///
/// An unknown key is not an error: it yields an invalid
/// [`KeyVerdict`](crate::KeyVerdict). Only failures to reach a verdict are
/// reported here, and they are never cached.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions
/// must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The key store failed while looking up a key.
    ///
    /// Wraps the original [`StorageError`] to preserve the full error source
    /// chain for debugging and structured logging.
    #[error("API key storage error: {0}")]
    Storage(
        /// The underlying storage error that caused the lookup to fail.
        #[source]
        StorageError,
    ),
}

impl AuthError {
    /// Creates an [`AuthError::Storage`] from a storage error.
    #[must_use]
    pub fn storage(err: StorageError) -> Self {
        Self::Storage(err)
    }

    /// Returns `true` if retrying the lookup may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(err) => err.is_transient(),
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
