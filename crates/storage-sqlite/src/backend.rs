//! SQLite implementation of the persistence contract.
//!
//! One connection, guarded by a mutex, with statements executed on
//! tokio's blocking pool. Timestamps are stored as Unix milliseconds.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;
use pocketjson_storage::{
    ApiKeyRecord, ApiKeyStore, Blob, BlobStore, StorageError, StorageResult,
};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::{
    config::SqliteStoreConfig,
    error::{Result, SqliteStoreError},
};

/// Schema version written to `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS json_storage (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        expires_at INTEGER NOT NULL,
        creator_key TEXT NOT NULL DEFAULT 'guest'
    );
    CREATE TABLE IF NOT EXISTS api_keys (
        key TEXT PRIMARY KEY,
        description TEXT,
        created_at INTEGER NOT NULL,
        is_admin INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_json_storage_expires_at ON json_storage (expires_at);
    CREATE INDEX IF NOT EXISTS idx_json_storage_creator_key ON json_storage (creator_key);
";

/// SQLite-backed store for blobs and API key records.
///
/// Cloning is cheap; clones share the connection.
///
/// # Example
///
/// ```
/// use pocketjson_storage::{ApiKeyStore, BlobStore};
/// use pocketjson_storage_sqlite::{SqliteStore, SqliteStoreConfig};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = SqliteStore::open(SqliteStoreConfig::in_memory()).await.unwrap();
/// store.create_api_key_record("k1", Some("ci"), false).await.unwrap();
/// assert!(store.get_api_key_record("k1").await.is_ok());
/// # });
/// ```
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    config: Arc<SqliteStoreConfig>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.config.path()).finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens (creating if needed) the database described by `config` and
    /// brings its schema up to date.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the configuration is invalid, the file
    /// cannot be opened, or it carries a newer schema version.
    #[tracing::instrument(skip(config), fields(path = %config.path().display()))]
    pub async fn open(config: SqliteStoreConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let open_config = Arc::clone(&config);
        let conn = tokio::task::spawn_blocking(move || open_connection(&open_config)).await??;

        tracing::info!(in_memory = config.is_in_memory(), "SQLite store opened");
        Ok(Self { conn: Arc::new(Mutex::new(conn)), config })
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// See [`SqliteStore::open`].
    pub async fn in_memory() -> Result<Self> {
        Self::open(SqliteStoreConfig::in_memory()).await
    }

    /// Returns the configuration this store was opened with.
    #[must_use]
    pub fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Runs `op` against the connection on the blocking pool.
    async fn with_connection<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || op(&conn.lock()))
            .await
            .map_err(SqliteStoreError::from)?
            .map_err(StorageError::from)
    }
}

fn open_connection(config: &SqliteStoreConfig) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let mut conn = Connection::open_with_flags(config.path(), flags)?;
    conn.busy_timeout(config.busy_timeout())?;
    if !config.is_in_memory() {
        // journal_mode returns the resulting mode as a row.
        let _mode: String = conn.query_row(
            &format!("PRAGMA journal_mode = {}", config.journal_mode().pragma_value()),
            [],
            |row| row.get(0),
        )?;
    }
    initialize_schema(&mut conn)?;
    Ok(conn)
}

fn initialize_schema(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    let version: i64 = tx.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(SqliteStoreError::UnsupportedSchema {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }
    tx.execute_batch(SCHEMA)?;
    if version < SCHEMA_VERSION {
        tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))?;
    }
    tx.commit()?;
    Ok(())
}

fn millis_to_datetime(column: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| SqliteStoreError::CorruptRow(format!("{column} out of range: {millis}")))
}

#[async_trait]
impl BlobStore for SqliteStore {
    #[tracing::instrument(skip(self, blob), fields(id = %blob.id))]
    async fn create_blob(&self, blob: &Blob) -> StorageResult<()> {
        let blob = blob.clone();
        let id = blob.id.clone();
        let inserted = self
            .with_connection(move |conn| {
                let changed = conn.execute(
                    "INSERT INTO json_storage (id, data, expires_at, creator_key)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (id) DO NOTHING",
                    params![
                        blob.id,
                        blob.data,
                        blob.expires_at.timestamp_millis(),
                        blob.creator_key
                    ],
                )?;
                Ok(changed == 1)
            })
            .await?;

        if inserted { Ok(()) } else { Err(StorageError::conflict(id)) }
    }

    #[tracing::instrument(skip(self))]
    async fn get_blob(&self, id: &str) -> StorageResult<Blob> {
        let lookup = id.to_owned();
        let now = Utc::now().timestamp_millis();
        let row = self
            .with_connection(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, data, expires_at, creator_key FROM json_storage
                         WHERE id = ?1 AND expires_at > ?2",
                        params![lookup, now],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, i64>(2)?,
                                row.get::<_, String>(3)?,
                            ))
                        },
                    )
                    .optional()?;
                row.map(|(id, data, expires_at, creator_key)| {
                    Ok(Blob {
                        id,
                        data,
                        expires_at: millis_to_datetime("expires_at", expires_at)?,
                        creator_key,
                    })
                })
                .transpose()
            })
            .await?;

        row.ok_or_else(|| StorageError::not_found(id))
    }

    #[tracing::instrument(skip(self))]
    async fn delete_expired_blobs(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let cutoff = now.timestamp_millis();
        let deleted = self
            .with_connection(move |conn| {
                let deleted = conn
                    .execute("DELETE FROM json_storage WHERE expires_at <= ?1", params![cutoff])?;
                Ok(deleted as u64)
            })
            .await?;

        tracing::debug!(deleted, "deleted expired blobs");
        Ok(deleted)
    }
}

#[async_trait]
impl ApiKeyStore for SqliteStore {
    #[tracing::instrument(skip(self, key))]
    async fn create_api_key_record(
        &self,
        key: &str,
        description: Option<&str>,
        is_admin: bool,
    ) -> StorageResult<ApiKeyRecord> {
        // Truncate so the returned record matches what a later read decodes.
        let record = ApiKeyRecord::builder()
            .key(key)
            .maybe_description(description)
            .is_admin(is_admin)
            .created_at(Utc::now().trunc_subsecs(3))
            .build();
        let row = record.clone();
        let inserted = self
            .with_connection(move |conn| {
                let changed = conn.execute(
                    "INSERT INTO api_keys (key, description, created_at, is_admin)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (key) DO NOTHING",
                    params![
                        row.key,
                        row.description,
                        row.created_at.timestamp_millis(),
                        row.is_admin
                    ],
                )?;
                Ok(changed == 1)
            })
            .await?;

        // The key itself is secret; report the conflict without it.
        if inserted { Ok(record) } else { Err(StorageError::conflict("api key")) }
    }

    #[tracing::instrument(skip(self, key))]
    async fn get_api_key_record(&self, key: &str) -> StorageResult<ApiKeyRecord> {
        let lookup = key.to_owned();
        let record = self
            .with_connection(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT key, description, created_at, is_admin FROM api_keys
                         WHERE key = ?1",
                        params![lookup],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, Option<String>>(1)?,
                                row.get::<_, i64>(2)?,
                                row.get::<_, bool>(3)?,
                            ))
                        },
                    )
                    .optional()?;
                row.map(|(key, description, created_at, is_admin)| {
                    Ok(ApiKeyRecord {
                        key,
                        description,
                        is_admin,
                        created_at: millis_to_datetime("created_at", created_at)?,
                    })
                })
                .transpose()
            })
            .await?;

        record.ok_or_else(|| StorageError::not_found("api key"))
    }

    #[tracing::instrument(skip(self, key))]
    async fn delete_api_key_record(&self, key: &str) -> StorageResult<()> {
        let lookup = key.to_owned();
        let deleted = self
            .with_connection(move |conn| {
                Ok(conn.execute("DELETE FROM api_keys WHERE key = ?1", params![lookup])?)
            })
            .await?;

        if deleted == 0 { Err(StorageError::not_found("api key")) } else { Ok(()) }
    }
}
