//! Configuration for the SQLite storage backend.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SqliteStoreError};

/// Default time to wait on a locked database (5 seconds).
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Path SQLite interprets as a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead log (readers do not block the writer).
    #[default]
    Wal,
    /// Rollback journal deleted after each transaction.
    Delete,
}

impl JournalMode {
    /// Returns the `journal_mode` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Configuration for [`SqliteStore`](crate::SqliteStore).
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use pocketjson_storage_sqlite::SqliteStoreConfig;
///
/// let config = SqliteStoreConfig::builder()
///     .path("/var/lib/pocketjson/store.db")
///     .busy_timeout(Duration::from_secs(2))
///     .build()?;
/// assert_eq!(config.busy_timeout(), Duration::from_secs(2));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// Deserializes from the same shape, with durations in humantime form:
///
/// ```toml
/// path = "/var/lib/pocketjson/store.db"
/// busy_timeout = "2s"
/// journal_mode = "wal"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Database file, or [`IN_MEMORY_PATH`].
    pub(crate) path: PathBuf,

    /// How long a statement waits for a lock before failing with busy.
    #[serde(with = "humantime_serde", default = "default_busy_timeout")]
    pub(crate) busy_timeout: Duration,

    /// Journal mode applied when the connection opens.
    #[serde(default)]
    pub(crate) journal_mode: JournalMode,
}

fn default_busy_timeout() -> Duration {
    DEFAULT_BUSY_TIMEOUT
}

#[bon::bon]
impl SqliteStoreConfig {
    /// Creates a new configuration, validating the path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Config`] if the path is empty or names an
    /// existing directory.
    #[builder]
    pub fn new(
        #[builder(into)] path: PathBuf,
        #[builder(default = DEFAULT_BUSY_TIMEOUT)] busy_timeout: Duration,
        #[builder(default)] journal_mode: JournalMode,
    ) -> Result<Self> {
        let config = Self { path, busy_timeout, journal_mode };
        config.validate()?;
        Ok(config)
    }

    /// Configuration for a private in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(IN_MEMORY_PATH),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            journal_mode: JournalMode::default(),
        }
    }

    /// Checks the invariants enforced by the builder.
    ///
    /// Deserialized configurations skip the builder, so call this before use.
    ///
    /// # Errors
    ///
    /// See [`SqliteStoreConfig::new`].
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(SqliteStoreError::Config("path cannot be empty".into()));
        }
        if self.path.is_dir() {
            return Err(SqliteStoreError::Config(format!(
                "path must be a file, not a directory: {}",
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Returns the database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the busy timeout.
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    /// Returns the journal mode.
    #[must_use]
    pub fn journal_mode(&self) -> JournalMode {
        self.journal_mode
    }

    /// Returns `true` if this configuration names an in-memory database.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_PATH
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = SqliteStoreConfig::builder().path("store.db").build().unwrap();
        assert_eq!(config.path(), Path::new("store.db"));
        assert_eq!(config.busy_timeout(), DEFAULT_BUSY_TIMEOUT);
        assert_eq!(config.journal_mode(), JournalMode::Wal);
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_in_memory() {
        let config = SqliteStoreConfig::in_memory();
        assert!(config.is_in_memory());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_empty_path() {
        let result = SqliteStoreConfig::builder().path("").build();
        assert!(matches!(result, Err(SqliteStoreError::Config(_))));
    }

    #[test]
    fn test_validation_directory_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = SqliteStoreConfig::builder().path(dir.path()).build();
        assert!(matches!(result, Err(SqliteStoreError::Config(msg)) if msg.contains("directory")));
    }

    #[test]
    fn test_deserialize_with_humantime() {
        let config: SqliteStoreConfig = serde_json::from_str(
            r#"{"path":"/tmp/pj.db","busy_timeout":"250ms","journal_mode":"delete"}"#,
        )
        .expect("deserialize");
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
        assert_eq!(config.journal_mode(), JournalMode::Delete);
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: SqliteStoreConfig =
            serde_json::from_str(r#"{"path":"/tmp/pj.db"}"#).expect("deserialize");
        assert_eq!(config.busy_timeout(), DEFAULT_BUSY_TIMEOUT);
        assert_eq!(config.journal_mode(), JournalMode::Wal);
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let result: std::result::Result<SqliteStoreConfig, _> =
            serde_json::from_str(r#"{"path":"/tmp/pj.db","pool_size":4}"#);
        assert!(result.is_err());
    }
}
