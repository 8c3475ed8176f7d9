//! Orchestrator error types.
//!
//! [`StoreError`] is the taxonomy the HTTP layer translates into responses.
//! [`ConfigError`] is returned when a [`StoreConfig`](crate::StoreConfig)
//! fails validation.

use std::time::Duration;

use pocketjson_authn::AuthError;
use pocketjson_storage::{IdError, StorageError};
use thiserror::Error;

/// Errors surfaced by [`Store`](crate::Store) operations.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions
/// must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The key is absent or invalid, or is not an admin key for an
    /// admin-only operation.
    #[error("Unauthorized")]
    Unauthorized,

    /// The blob or key record is absent or has expired.
    #[error("Not found: {id}")]
    NotFound {
        /// The identifier that was looked up.
        id: String,
    },

    /// The identifier or key already exists.
    #[error("Already exists: {id}")]
    Conflict {
        /// The identifier that collided.
        id: String,
    },

    /// The serialized payload exceeds the caller's quota.
    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge {
        /// Serialized payload size in bytes.
        size: usize,
        /// The caller's limit in bytes.
        limit: usize,
    },

    /// The payload or custom identifier is malformed.
    #[error("Invalid format: {reason}")]
    InvalidFormat {
        /// What was wrong with the input.
        reason: String,
    },

    /// The persistent store failed for a reason other than not-found or
    /// conflict.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(
        /// The underlying storage error.
        #[source]
        StorageError,
    ),

    /// The OS randomness source failed while generating an identifier.
    #[error("Identifier generation failed: {0}")]
    IdGeneration(
        /// The underlying randomness failure.
        #[from]
        IdError,
    ),
}

impl StoreError {
    /// Creates a new `InvalidFormat` error.
    #[must_use]
    pub fn invalid_format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat { reason: reason.into() }
    }

    /// Returns `true` if the request may succeed when retried unchanged.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::BackendUnavailable(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key } => Self::NotFound { id: key },
            StorageError::Conflict { key } => Self::Conflict { id: key },
            other => Self::BackendUnavailable(other),
        }
    }
}

impl From<AuthError> for StoreError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Storage(source) => Self::BackendUnavailable(source),
            other => Self::BackendUnavailable(StorageError::internal(other.to_string())),
        }
    }
}

/// Errors raised by [`StoreConfig::validate`](crate::StoreConfig::validate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A size, interval or TTL is below its minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// The configuration field.
        field: &'static str,
        /// The smallest accepted value.
        min: String,
        /// The rejected value.
        value: String,
    },

    /// The negative cache TTL is longer than the positive one.
    #[error("negative_cache_ttl ({negative:?}) must not exceed positive_cache_ttl ({positive:?})")]
    InvalidTtlOrder {
        /// Configured lifetime of valid verdicts.
        positive: Duration,
        /// Configured lifetime of invalid verdicts.
        negative: Duration,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error as _;

    use rstest::rstest;

    use super::*;

    #[test]
    fn test_from_storage_not_found() {
        let err = StoreError::from(StorageError::not_found("abc"));
        assert!(matches!(err, StoreError::NotFound { id } if id == "abc"));
    }

    #[test]
    fn test_from_storage_conflict() {
        let err = StoreError::from(StorageError::conflict("abc"));
        assert!(matches!(err, StoreError::Conflict { id } if id == "abc"));
    }

    #[rstest]
    #[case::connection(StorageError::connection("refused"), true)]
    #[case::timeout(StorageError::timeout(), true)]
    #[case::serialization(StorageError::serialization("bad row"), false)]
    #[case::internal(StorageError::internal("boom"), false)]
    fn test_from_storage_backend_failures(#[case] source: StorageError, #[case] transient: bool) {
        let err = StoreError::from(source);
        assert!(matches!(err, StoreError::BackendUnavailable(_)));
        assert_eq!(err.is_transient(), transient);
        assert!(err.source().is_some(), "storage error should be preserved as source");
    }

    #[test]
    fn test_from_auth_error() {
        let err = StoreError::from(AuthError::storage(StorageError::not_found("k")));
        // Not-found never reaches here from the cache, but the mapping is total.
        assert!(matches!(err, StoreError::BackendUnavailable(StorageError::NotFound { .. })));
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        assert!(!StoreError::Unauthorized.is_transient());
        assert!(!StoreError::TooLarge { size: 2, limit: 1 }.is_transient());
        assert!(!StoreError::invalid_format("bad").is_transient());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            StoreError::TooLarge { size: 2048, limit: 1024 }.to_string(),
            "Payload too large: 2048 bytes exceeds limit of 1024 bytes"
        );
        assert_eq!(
            ConfigError::BelowMinimum {
                field: "default_expiry",
                min: "1ns".into(),
                value: "0ns".into(),
            }
            .to_string(),
            "default_expiry must be at least 1ns, got 0ns"
        );
    }
}
