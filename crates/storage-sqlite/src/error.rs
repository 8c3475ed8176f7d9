//! Error types for the SQLite storage backend.
//!
//! [`SqliteStoreError`] covers failures inside the backend. It converts into
//! the generic [`StorageError`] so callers only ever see the shared variants.

use pocketjson_storage::StorageError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type alias for SQLite backend operations.
pub type Result<T> = std::result::Result<T, SqliteStoreError>;

/// Errors specific to the SQLite storage backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteStoreError {
    /// Error reported by SQLite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored row could not be decoded.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// The database was written by a newer schema.
    #[error("Unsupported schema version {found} (supported: {supported})")]
    UnsupportedSchema {
        /// Version found in the database file.
        found: i64,
        /// Highest version this build understands.
        supported: i64,
    },

    /// The blocking task running the statement panicked or was cancelled.
    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<SqliteStoreError> for StorageError {
    fn from(err: SqliteStoreError) -> Self {
        match err {
            SqliteStoreError::Sqlite(source) => sqlite_error_to_storage_error(source),
            SqliteStoreError::Config(message) => {
                StorageError::internal(format!("Config: {message}"))
            },
            SqliteStoreError::CorruptRow(message) => StorageError::serialization(message),
            err @ SqliteStoreError::UnsupportedSchema { .. } => {
                StorageError::internal(err.to_string())
            },
            SqliteStoreError::Join(source) => {
                StorageError::internal_with_source("blocking task failed", source)
            },
        }
    }
}

/// Converts a rusqlite error to a storage error.
///
/// Lock contention becomes [`StorageError::Timeout`] so callers can treat it
/// as transient. Creates detect duplicates themselves, so a constraint
/// violation reaching this point is unexpected and reported as internal.
fn sqlite_error_to_storage_error(err: rusqlite::Error) -> StorageError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            tracing::warn!("SQLite database busy");
            StorageError::timeout()
        },
        Some(ErrorCode::CannotOpen | ErrorCode::NotADatabase) => {
            StorageError::connection_with_source("cannot open database", err)
        },
        _ => match err {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => {
                StorageError::serialization_with_source("column decode failed", err)
            },
            other => StorageError::internal_with_source("SQLite failure", other),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rstest::rstest;
    use rusqlite::ffi;

    use super::*;

    fn failure(code: std::os::raw::c_int) -> SqliteStoreError {
        SqliteStoreError::Sqlite(rusqlite::Error::SqliteFailure(ffi::Error::new(code), None))
    }

    #[rstest]
    #[case::busy(ffi::SQLITE_BUSY, |e: &StorageError| matches!(e, StorageError::Timeout))]
    #[case::locked(ffi::SQLITE_LOCKED, |e: &StorageError| matches!(e, StorageError::Timeout))]
    #[case::cannot_open(
        ffi::SQLITE_CANTOPEN,
        |e: &StorageError| matches!(e, StorageError::Connection { .. })
    )]
    #[case::constraint(
        ffi::SQLITE_CONSTRAINT,
        |e: &StorageError| matches!(e, StorageError::Internal { .. })
    )]
    fn test_sqlite_failure_mapping(
        #[case] code: std::os::raw::c_int,
        #[case] expected: fn(&StorageError) -> bool,
    ) {
        let storage_err: StorageError = failure(code).into();
        assert!(expected(&storage_err), "code {code} mapped to {storage_err:?}");
    }

    #[test]
    fn test_busy_is_transient() {
        let storage_err: StorageError = failure(ffi::SQLITE_BUSY).into();
        assert!(storage_err.is_transient());
    }

    #[test]
    fn test_corrupt_row_maps_to_serialization() {
        let storage_err: StorageError =
            SqliteStoreError::CorruptRow("expires_at out of range".into()).into();
        assert!(matches!(storage_err, StorageError::Serialization { .. }));
    }

    #[test]
    fn test_config_error_mapping() {
        let storage_err: StorageError = SqliteStoreError::Config("empty path".into()).into();
        assert!(matches!(storage_err, StorageError::Internal { .. }));
        assert!(storage_err.to_string().contains("empty path"));
    }

    #[test]
    fn test_unsupported_schema_display() {
        let err = SqliteStoreError::UnsupportedSchema { found: 7, supported: 1 };
        assert_eq!(err.to_string(), "Unsupported schema version 7 (supported: 1)");
    }
}
