//! Store configuration.
//!
//! Every setting has a default matching the hosted service. Values are read
//! once when the [`Store`](crate::Store) is built and never change after.
//!
//! | Setting | Default |
//! |---------|---------|
//! | `guest_max_payload_bytes` | 100 KiB |
//! | `authenticated_max_payload_bytes` | 1 MiB |
//! | `default_expiry` | 48 hours |
//! | `positive_cache_ttl` | 5 minutes |
//! | `negative_cache_ttl` | 30 seconds |
//! | `blob_sweep_interval` | 15 minutes |
//! | `cache_sweep_interval` | 1 minute |
//! | `blob_sweep_timeout` | 5 minutes |

use std::time::Duration;

use pocketjson_authn::{DEFAULT_NEGATIVE_TTL, DEFAULT_POSITIVE_TTL, MasterKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::ConfigError;

/// Default payload limit for anonymous callers (100 KiB).
pub const DEFAULT_GUEST_MAX_PAYLOAD_BYTES: usize = 100 * 1024;

/// Default payload limit for callers with a valid key (1 MiB).
pub const DEFAULT_AUTHENTICATED_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Default blob lifetime (48 hours).
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(48 * 60 * 60);

/// Default interval between expired-blob sweeps (15 minutes).
pub const DEFAULT_BLOB_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default interval between cache sweeps (1 minute).
pub const DEFAULT_CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default time limit for one expired-blob sweep (5 minutes).
pub const DEFAULT_BLOB_SWEEP_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Configuration for a [`Store`](crate::Store).
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use pocketjson::StoreConfig;
///
/// let config = StoreConfig::builder()
///     .master_api_key("change-me")
///     .default_expiry(Duration::from_secs(3600))
///     .build()?;
/// assert!(config.has_master_api_key());
/// assert_eq!(config.guest_max_payload_bytes(), 100 * 1024);
/// # Ok::<(), pocketjson::ConfigError>(())
/// ```
///
/// Deserializes from the same shape, with durations in humantime form:
///
/// ```toml
/// master_api_key = "change-me"
/// authenticated_max_payload_bytes = 2097152
/// default_expiry = "48h"
/// negative_cache_ttl = "10s"
/// ```
///
/// The master key is never serialized and is redacted from `Debug`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Out-of-band admin key. Unset or empty disables it.
    #[serde(default, skip_serializing)]
    master_api_key: Option<Zeroizing<String>>,

    /// Payload limit for anonymous callers, in serialized bytes.
    #[serde(default = "default_guest_max_payload_bytes")]
    guest_max_payload_bytes: usize,

    /// Payload limit for callers with a valid key, in serialized bytes.
    #[serde(default = "default_authenticated_max_payload_bytes")]
    authenticated_max_payload_bytes: usize,

    /// Lifetime of blobs created without an explicit expiry.
    #[serde(with = "humantime_serde", default = "default_expiry")]
    default_expiry: Duration,

    /// Lifetime of a cached valid key verdict.
    #[serde(with = "humantime_serde", default = "default_positive_cache_ttl")]
    positive_cache_ttl: Duration,

    /// Lifetime of a cached invalid key verdict.
    #[serde(with = "humantime_serde", default = "default_negative_cache_ttl")]
    negative_cache_ttl: Duration,

    /// Interval between expired-blob sweeps.
    #[serde(with = "humantime_serde", default = "default_blob_sweep_interval")]
    blob_sweep_interval: Duration,

    /// Interval between cache sweeps.
    #[serde(with = "humantime_serde", default = "default_cache_sweep_interval")]
    cache_sweep_interval: Duration,

    /// Time limit for one expired-blob sweep.
    #[serde(with = "humantime_serde", default = "default_blob_sweep_timeout")]
    blob_sweep_timeout: Duration,
}

fn default_guest_max_payload_bytes() -> usize {
    DEFAULT_GUEST_MAX_PAYLOAD_BYTES
}

fn default_authenticated_max_payload_bytes() -> usize {
    DEFAULT_AUTHENTICATED_MAX_PAYLOAD_BYTES
}

fn default_expiry() -> Duration {
    DEFAULT_EXPIRY
}

fn default_positive_cache_ttl() -> Duration {
    DEFAULT_POSITIVE_TTL
}

fn default_negative_cache_ttl() -> Duration {
    DEFAULT_NEGATIVE_TTL
}

fn default_blob_sweep_interval() -> Duration {
    DEFAULT_BLOB_SWEEP_INTERVAL
}

fn default_cache_sweep_interval() -> Duration {
    DEFAULT_CACHE_SWEEP_INTERVAL
}

fn default_blob_sweep_timeout() -> Duration {
    DEFAULT_BLOB_SWEEP_TIMEOUT
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            master_api_key: None,
            guest_max_payload_bytes: DEFAULT_GUEST_MAX_PAYLOAD_BYTES,
            authenticated_max_payload_bytes: DEFAULT_AUTHENTICATED_MAX_PAYLOAD_BYTES,
            default_expiry: DEFAULT_EXPIRY,
            positive_cache_ttl: DEFAULT_POSITIVE_TTL,
            negative_cache_ttl: DEFAULT_NEGATIVE_TTL,
            blob_sweep_interval: DEFAULT_BLOB_SWEEP_INTERVAL,
            cache_sweep_interval: DEFAULT_CACHE_SWEEP_INTERVAL,
            blob_sweep_timeout: DEFAULT_BLOB_SWEEP_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("master_api_key", &self.master_api_key.as_ref().map(|_| "<redacted>"))
            .field("guest_max_payload_bytes", &self.guest_max_payload_bytes)
            .field("authenticated_max_payload_bytes", &self.authenticated_max_payload_bytes)
            .field("default_expiry", &self.default_expiry)
            .field("positive_cache_ttl", &self.positive_cache_ttl)
            .field("negative_cache_ttl", &self.negative_cache_ttl)
            .field("blob_sweep_interval", &self.blob_sweep_interval)
            .field("cache_sweep_interval", &self.cache_sweep_interval)
            .field("blob_sweep_timeout", &self.blob_sweep_timeout)
            .finish()
    }
}

#[bon::bon]
impl StoreConfig {
    /// Creates a new configuration, validating every value.
    ///
    /// # Errors
    ///
    /// See [`StoreConfig::validate`].
    #[builder]
    pub fn new(
        #[builder(into)] master_api_key: Option<String>,
        #[builder(default = DEFAULT_GUEST_MAX_PAYLOAD_BYTES)] guest_max_payload_bytes: usize,
        #[builder(default = DEFAULT_AUTHENTICATED_MAX_PAYLOAD_BYTES)]
        authenticated_max_payload_bytes: usize,
        #[builder(default = DEFAULT_EXPIRY)] default_expiry: Duration,
        #[builder(default = DEFAULT_POSITIVE_TTL)] positive_cache_ttl: Duration,
        #[builder(default = DEFAULT_NEGATIVE_TTL)] negative_cache_ttl: Duration,
        #[builder(default = DEFAULT_BLOB_SWEEP_INTERVAL)] blob_sweep_interval: Duration,
        #[builder(default = DEFAULT_CACHE_SWEEP_INTERVAL)] cache_sweep_interval: Duration,
        #[builder(default = DEFAULT_BLOB_SWEEP_TIMEOUT)] blob_sweep_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            master_api_key: master_api_key.map(Zeroizing::new),
            guest_max_payload_bytes,
            authenticated_max_payload_bytes,
            default_expiry,
            positive_cache_ttl,
            negative_cache_ttl,
            blob_sweep_interval,
            cache_sweep_interval,
            blob_sweep_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants enforced by the builder.
    ///
    /// Deserialized configurations skip the builder;
    /// [`Store::new`](crate::Store::new) calls this before using one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if a payload limit, duration or
    /// interval is zero, and [`ConfigError::InvalidTtlOrder`] if the negative
    /// cache TTL exceeds the positive one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("guest_max_payload_bytes", self.guest_max_payload_bytes),
            ("authenticated_max_payload_bytes", self.authenticated_max_payload_bytes),
        ] {
            if value == 0 {
                return Err(ConfigError::BelowMinimum { field, min: "1".into(), value: "0".into() });
            }
        }

        for (field, value) in [
            ("default_expiry", self.default_expiry),
            ("positive_cache_ttl", self.positive_cache_ttl),
            ("negative_cache_ttl", self.negative_cache_ttl),
            ("blob_sweep_interval", self.blob_sweep_interval),
            ("cache_sweep_interval", self.cache_sweep_interval),
            ("blob_sweep_timeout", self.blob_sweep_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::BelowMinimum {
                    field,
                    min: "1ns".into(),
                    value: format!("{value:?}"),
                });
            }
        }

        if self.negative_cache_ttl > self.positive_cache_ttl {
            return Err(ConfigError::InvalidTtlOrder {
                positive: self.positive_cache_ttl,
                negative: self.negative_cache_ttl,
            });
        }

        Ok(())
    }

    /// Returns the master key, or `None` if it is unset or empty.
    #[must_use]
    pub fn master_key(&self) -> Option<MasterKey> {
        self.master_api_key.as_ref().and_then(|key| MasterKey::new(key.as_str()))
    }

    /// Returns `true` if a non-empty master key is configured.
    #[must_use]
    pub fn has_master_api_key(&self) -> bool {
        self.master_api_key.as_ref().is_some_and(|key| !key.is_empty())
    }

    /// Payload limit for anonymous callers, in bytes.
    #[must_use]
    pub fn guest_max_payload_bytes(&self) -> usize {
        self.guest_max_payload_bytes
    }

    /// Payload limit for callers with a valid key, in bytes.
    #[must_use]
    pub fn authenticated_max_payload_bytes(&self) -> usize {
        self.authenticated_max_payload_bytes
    }

    /// Lifetime of blobs created without an explicit expiry.
    #[must_use]
    pub fn default_expiry(&self) -> Duration {
        self.default_expiry
    }

    /// Lifetime of a cached valid key verdict.
    #[must_use]
    pub fn positive_cache_ttl(&self) -> Duration {
        self.positive_cache_ttl
    }

    /// Lifetime of a cached invalid key verdict.
    #[must_use]
    pub fn negative_cache_ttl(&self) -> Duration {
        self.negative_cache_ttl
    }

    /// Interval between expired-blob sweeps.
    #[must_use]
    pub fn blob_sweep_interval(&self) -> Duration {
        self.blob_sweep_interval
    }

    /// Interval between cache sweeps.
    #[must_use]
    pub fn cache_sweep_interval(&self) -> Duration {
        self.cache_sweep_interval
    }

    /// Time limit for one expired-blob sweep.
    #[must_use]
    pub fn blob_sweep_timeout(&self) -> Duration {
        self.blob_sweep_timeout
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_builder_defaults_match_default() {
        let built = StoreConfig::builder().build().unwrap();
        let default = StoreConfig::default();
        assert_eq!(format!("{built:?}"), format!("{default:?}"));
        assert!(!built.has_master_api_key());
        assert!(built.master_key().is_none());
        assert_eq!(built.authenticated_max_payload_bytes(), 1024 * 1024);
        assert_eq!(built.default_expiry(), Duration::from_secs(172_800));
        assert_eq!(built.positive_cache_ttl(), Duration::from_secs(300));
        assert_eq!(built.negative_cache_ttl(), Duration::from_secs(30));
        assert_eq!(built.blob_sweep_interval(), Duration::from_secs(900));
        assert_eq!(built.cache_sweep_interval(), Duration::from_secs(60));
        assert_eq!(built.blob_sweep_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_empty_master_key_is_treated_as_unset() {
        let config = StoreConfig::builder().master_api_key("").build().unwrap();
        assert!(!config.has_master_api_key());
        assert!(config.master_key().is_none());
    }

    #[test]
    fn test_master_key_round_trip() {
        let config = StoreConfig::builder().master_api_key("m-key").build().unwrap();
        let master = config.master_key().expect("configured");
        assert!(master.matches("m-key"));
    }

    #[rstest]
    #[case::guest_size("guest_max_payload_bytes")]
    #[case::authenticated_size("authenticated_max_payload_bytes")]
    fn test_zero_size_rejected(#[case] field: &str) {
        let result = match field {
            "guest_max_payload_bytes" => StoreConfig::builder().guest_max_payload_bytes(0).build(),
            _ => StoreConfig::builder().authenticated_max_payload_bytes(0).build(),
        };
        assert!(
            matches!(result, Err(ConfigError::BelowMinimum { field: f, .. }) if f == field),
            "got {result:?}"
        );
    }

    #[rstest]
    #[case::default_expiry("default_expiry")]
    #[case::positive_ttl("positive_cache_ttl")]
    #[case::negative_ttl("negative_cache_ttl")]
    #[case::blob_interval("blob_sweep_interval")]
    #[case::cache_interval("cache_sweep_interval")]
    #[case::blob_timeout("blob_sweep_timeout")]
    fn test_zero_duration_rejected(#[case] field: &str) {
        let json = format!(r#"{{"{field}":"0s"}}"#);
        let config: StoreConfig = serde_json::from_str(&json).expect("deserialize");
        let result = config.validate();
        assert!(
            matches!(&result, Err(ConfigError::BelowMinimum { field: f, .. }) if *f == field),
            "got {result:?}"
        );
    }

    #[test]
    fn test_negative_ttl_longer_than_positive_rejected() {
        let result = StoreConfig::builder()
            .positive_cache_ttl(Duration::from_secs(10))
            .negative_cache_ttl(Duration::from_secs(60))
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidTtlOrder { .. })));
    }

    #[test]
    fn test_equal_ttls_accepted() {
        let ttl = Duration::from_secs(30);
        assert!(
            StoreConfig::builder().positive_cache_ttl(ttl).negative_cache_ttl(ttl).build().is_ok()
        );
    }

    #[test]
    fn test_deserialize_with_humantime() {
        let config: StoreConfig = serde_json::from_str(
            r#"{"master_api_key":"m","default_expiry":"1h","negative_cache_ttl":"10s"}"#,
        )
        .expect("deserialize");
        assert!(config.validate().is_ok());
        assert_eq!(config.default_expiry(), Duration::from_secs(3600));
        assert_eq!(config.negative_cache_ttl(), Duration::from_secs(10));
        assert_eq!(config.positive_cache_ttl(), DEFAULT_POSITIVE_TTL);
        assert!(config.has_master_api_key());
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let result: Result<StoreConfig, _> = serde_json::from_str(r#"{"port":"9819"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_master_key_never_serialized_or_debugged() {
        let config = StoreConfig::builder().master_api_key("top-secret-master").build().unwrap();

        let json = serde_json::to_string(&config).expect("serialize");
        assert!(!json.contains("top-secret-master"));
        assert!(!json.contains("master_api_key"));

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("top-secret-master"));
        assert!(rendered.contains("redacted"));
    }
}
