//! The store orchestrator.
//!
//! [`Store`] is the single object the HTTP layer talks to. It owns the
//! persistent store handle, the API key cache, the configuration and the
//! reaper, and turns each request into at most a few persistence calls.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pocketjson_authn::{ApiKeyCache, ApiKeyCacheMetrics, KeyVerdict};
use pocketjson_storage::{
    ApiKeyStore, Blob, GUEST_CREATOR, PersistentStore, compose_id, derive_namespace_prefix,
    generate_random_id, validate_custom_id,
};
use serde::Serialize;

use crate::{
    config::StoreConfig,
    error::{ConfigError, StoreError},
    quota::{Caller, Expiry, Quota},
    reaper::{Reaper, ReaperStats},
};

/// Options for [`Store::create_blob`].
///
/// Both options are honored only for callers with a valid key; guests always
/// get a random id and the default expiry.
///
/// ```
/// use pocketjson::{CreateBlobRequest, Expiry};
///
/// let request = CreateBlobRequest::builder().custom_id("report").expiry(Expiry::Hours(6)).build();
/// assert_eq!(request.custom_id.as_deref(), Some("report"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, bon::Builder)]
pub struct CreateBlobRequest {
    /// Identifier to use instead of a random one. Prefixed with the caller's
    /// namespace.
    #[builder(into)]
    pub custom_id: Option<String>,

    /// Requested lifetime.
    #[builder(default)]
    pub expiry: Expiry,
}

/// Result of [`Store::create_blob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedBlob {
    /// The stored blob's id.
    pub id: String,
    /// When the blob stops being readable.
    pub expires_at: DateTime<Utc>,
}

/// Result of [`Store::issue_api_key`].
///
/// This is the only time the new key is returned; it is redacted from
/// `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct IssuedApiKey {
    /// The new bearer secret (32 hex characters).
    pub key: String,
    /// Namespace prefix that custom ids created with this key carry.
    pub client_id: String,
    /// Description supplied at issuance.
    pub description: Option<String>,
    /// Whether the key may issue and revoke keys.
    pub is_admin: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedApiKey")
            .field("key", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("description", &self.description)
            .field("is_admin", &self.is_admin)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Composition root for the blob store.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use pocketjson::{CreateBlobRequest, Store, StoreConfig};
/// use pocketjson_storage::MemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Store::new(Arc::new(MemoryStore::new()), StoreConfig::default())?;
///
/// let created =
///     store.create_blob(None, &serde_json::json!({"a": 1}), CreateBlobRequest::default()).await?;
/// let blob = store.get_blob(&created.id).await?;
/// assert_eq!(blob.data, r#"{"a":1}"#);
///
/// store.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Store {
    persistence: Arc<dyn PersistentStore>,
    cache: Arc<ApiKeyCache>,
    config: Arc<StoreConfig>,
    reaper: Reaper,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("reaper", &self.reaper)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Validates `config`, builds the cache and starts the reaper.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    pub fn new(
        persistence: Arc<dyn PersistentStore>,
        config: StoreConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let cache = Arc::new(
            ApiKeyCache::new(Arc::clone(&persistence) as Arc<dyn ApiKeyStore>, config.master_key())
                .with_ttls(config.positive_cache_ttl(), config.negative_cache_ttl()),
        );
        let reaper = Reaper::start(Arc::clone(&persistence), Arc::clone(&cache), &config);

        tracing::info!(
            has_master_key = config.has_master_api_key(),
            guest_max_payload_bytes = config.guest_max_payload_bytes(),
            authenticated_max_payload_bytes = config.authenticated_max_payload_bytes(),
            "store started"
        );

        Ok(Self { persistence, cache, config: Arc::new(config), reaper })
    }

    /// Validates an API key through the cache.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BackendUnavailable`] if the key store fails.
    /// Unknown keys are not errors.
    pub async fn validate_api_key(&self, api_key: &str) -> Result<KeyVerdict, StoreError> {
        Ok(self.cache.validate(api_key).await?)
    }

    /// Drops any cached verdict for `api_key`.
    pub fn invalidate_api_key_cache(&self, api_key: &str) {
        self.cache.invalidate(api_key);
    }

    /// Classifies the presenter of `api_key`.
    ///
    /// No key, an empty key and a key that does not validate are all
    /// [`Caller::Guest`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BackendUnavailable`] if the key store fails.
    pub async fn authenticate(&self, api_key: Option<&str>) -> Result<Caller, StoreError> {
        let Some(api_key) = api_key else {
            return Ok(Caller::Guest);
        };
        let verdict = self.validate_api_key(api_key).await?;
        Ok(if verdict.is_valid {
            Caller::Authenticated { is_admin: verdict.is_admin }
        } else {
            Caller::Guest
        })
    }

    /// Stores a JSON object and returns its id and expiry.
    ///
    /// The payload is serialized compactly; the serialized length is what
    /// counts against the caller's quota.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidFormat`] if `payload` is not an object or the custom id is malformed
    /// - [`StoreError::TooLarge`] if the serialized payload exceeds the caller's quota
    /// - [`StoreError::Conflict`] if the id is already taken, even by an expired blob not yet swept
    /// - [`StoreError::IdGeneration`] if the OS randomness source fails
    /// - [`StoreError::BackendUnavailable`] if the persistent store fails
    #[tracing::instrument(skip_all, fields(custom_id = request.custom_id.as_deref()))]
    pub async fn create_blob(
        &self,
        api_key: Option<&str>,
        payload: &serde_json::Value,
        request: CreateBlobRequest,
    ) -> Result<CreatedBlob, StoreError> {
        let caller = self.authenticate(api_key).await?;
        let quota = Quota::for_caller(caller, &self.config);

        if !payload.is_object() {
            return Err(StoreError::invalid_format("payload must be a JSON object"));
        }
        let data = serde_json::to_string(payload).map_err(|err| {
            StoreError::invalid_format(format!("payload is not serializable: {err}"))
        })?;
        quota.check_payload_size(data.len())?;

        // An authenticated caller always presented a key.
        let creator_key = match (caller, api_key) {
            (Caller::Authenticated { .. }, Some(key)) => key,
            _ => GUEST_CREATOR,
        };

        let id = match request.custom_id.as_deref() {
            Some(custom_id) if quota.allows_custom_id() => {
                if !validate_custom_id(custom_id) {
                    return Err(StoreError::invalid_format(
                        "custom id must be 1-64 characters of [A-Za-z0-9_-]",
                    ));
                }
                compose_id(&derive_namespace_prefix(creator_key), custom_id)
            },
            _ => generate_random_id()?,
        };

        let expires_at =
            quota.resolve_expiry(request.expiry, Utc::now(), self.config.default_expiry())?;

        let blob = Blob::builder()
            .id(id.clone())
            .data(data)
            .expires_at(expires_at)
            .creator_key(creator_key)
            .build();
        self.persistence.create_blob(&blob).await?;

        tracing::debug!(id = %id, guest = caller.is_guest(), "blob created");
        Ok(CreatedBlob { id, expires_at })
    }

    /// Fetches a live blob.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the blob is absent or expired, and
    /// [`StoreError::BackendUnavailable`] if the persistent store fails.
    pub async fn get_blob(&self, id: &str) -> Result<Blob, StoreError> {
        Ok(self.persistence.get_blob(id).await?)
    }

    /// Issues a new random API key. Admin only.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthorized`] if `caller_key` is not an admin key
    /// - [`StoreError::IdGeneration`] if the OS randomness source fails
    /// - [`StoreError::BackendUnavailable`] if the persistent store fails
    #[tracing::instrument(skip(self, caller_key))]
    pub async fn issue_api_key(
        &self,
        caller_key: &str,
        description: Option<&str>,
        is_admin: bool,
    ) -> Result<IssuedApiKey, StoreError> {
        self.require_admin(caller_key).await?;

        let key = generate_random_id()?;
        let record = self.persistence.create_api_key_record(&key, description, is_admin).await?;
        let client_id = derive_namespace_prefix(&key);

        tracing::info!(
            audit.action = "issue_api_key",
            audit.resource = %format_args!("ns:{client_id}"),
            audit.result = "success",
            is_admin,
            "audit_event"
        );

        Ok(IssuedApiKey {
            key,
            client_id,
            description: record.description,
            is_admin: record.is_admin,
            created_at: record.created_at,
        })
    }

    /// Deletes an API key record and drops its cached verdict. Admin only.
    ///
    /// The cache entry is dropped even if the record was already gone.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthorized`] if `caller_key` is not an admin key
    /// - [`StoreError::NotFound`] if `key` has no record
    /// - [`StoreError::BackendUnavailable`] if the persistent store fails
    #[tracing::instrument(skip(self, caller_key, key))]
    pub async fn revoke_api_key(&self, caller_key: &str, key: &str) -> Result<(), StoreError> {
        self.require_admin(caller_key).await?;

        let result = self.persistence.delete_api_key_record(key).await;
        let outcome = match &result {
            Ok(()) => "success",
            Err(err) if err.is_not_found() => "not_found",
            Err(_) => "failure",
        };
        if outcome != "failure" {
            self.cache.invalidate(key);
        }
        tracing::info!(
            audit.action = "revoke_api_key",
            audit.resource = %format_args!("ns:{}", derive_namespace_prefix(key)),
            audit.result = outcome,
            "audit_event"
        );

        result.map_err(StoreError::from)
    }

    async fn require_admin(&self, caller_key: &str) -> Result<(), StoreError> {
        let verdict = self.validate_api_key(caller_key).await?;
        if verdict.is_valid && verdict.is_admin {
            Ok(())
        } else {
            Err(StoreError::Unauthorized)
        }
    }

    /// Returns the configuration the store was built with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the persistent store handle.
    #[must_use]
    pub fn persistence(&self) -> &Arc<dyn PersistentStore> {
        &self.persistence
    }

    /// Returns a snapshot of the API key cache counters.
    #[must_use]
    pub fn cache_metrics(&self) -> ApiKeyCacheMetrics {
        self.cache.metrics()
    }

    /// Returns a snapshot of the reaper counters.
    #[must_use]
    pub fn reaper_stats(&self) -> ReaperStats {
        self.reaper.stats()
    }

    /// Stops the reaper and waits for both of its tasks to exit.
    ///
    /// Request operations keep working afterwards; only background expiry
    /// stops. Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        let first = !self.reaper.is_cancelled();
        self.reaper.shutdown().await;
        if first {
            tracing::info!(
                audit.action = "shutdown",
                audit.resource = "store",
                audit.result = "success",
                "audit_event"
            );
        }
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.reaper.is_cancelled()
    }
}
