//! Storage error types and result alias.
//!
//! Every [`PersistentStore`](crate::PersistentStore) implementation maps its
//! internal failures onto these variants, so callers can distinguish a
//! legitimate "absent" answer from a backend that is failing.
//!
//! # Error Types
//!
//! - [`StorageError::NotFound`] - Blob or key record is absent (or the blob has expired)
//! - [`StorageError::Conflict`] - The identifier or key already exists
//! - [`StorageError::Connection`] - The backend could not be reached
//! - [`StorageError::Timeout`] - Operation exceeded its time limit
//! - [`StorageError::Serialization`] - Stored data could not be decoded
//! - [`StorageError::Internal`] - Backend-specific internal errors
//!
//! # Example
//!
//! ```
//! use pocketjson_storage::{StorageError, StorageResult};
//!
//! fn lookup(id: &str) -> StorageResult<String> {
//!     Err(StorageError::not_found(id))
//! }
//!
//! assert!(lookup("missing").unwrap_err().is_not_found());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Errors preserve their source chain via the `#[source]` attribute.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions
/// must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The requested blob or key record does not exist.
    ///
    /// Expired blobs are reported as not found even before the reaper has
    /// physically removed them.
    #[error("Not found: {key}")]
    NotFound {
        /// The identifier that was looked up.
        key: String,
    },

    /// A blob with the same id, or a key record with the same key, already
    /// exists. Creates never overwrite.
    #[error("Already exists: {key}")]
    Conflict {
        /// The identifier that collided.
        key: String,
    },

    /// Connection or network error.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Operation timed out.
    #[error("Operation timeout")]
    Timeout,

    /// Stored data could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// Internal storage backend error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error for the given identifier.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `Conflict` error for the given identifier.
    #[must_use]
    pub fn conflict(key: impl Into<String>) -> Self {
        Self::Conflict { key: key.into() }
    }

    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns `true` for [`StorageError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for [`StorageError::Conflict`].
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` if the error is likely to clear up on its own
    /// (connection failures and timeouts).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::error::Error as _;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::not_found(StorageError::not_found("a"), false)]
    #[case::conflict(StorageError::conflict("a"), false)]
    #[case::connection(StorageError::connection("refused"), true)]
    #[case::timeout(StorageError::timeout(), true)]
    #[case::serialization(StorageError::serialization("bad row"), false)]
    #[case::internal(StorageError::internal("oops"), false)]
    fn test_is_transient(#[case] error: StorageError, #[case] expected: bool) {
        assert_eq!(error.is_transient(), expected);
    }

    #[test]
    fn test_display_includes_identifier() {
        assert_eq!(StorageError::not_found("abc").to_string(), "Not found: abc");
        assert_eq!(StorageError::conflict("abc").to_string(), "Already exists: abc");
    }

    #[test]
    fn test_source_chain_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = StorageError::connection_with_source("backend down", io);
        let source = err.source().expect("source should be preserved");
        assert_eq!(source.to_string(), "refused");
    }
}
