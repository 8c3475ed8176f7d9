//! Records exchanged with the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creator recorded for blobs written without an API key.
pub const GUEST_CREATOR: &str = "guest";

/// A stored JSON document.
///
/// `data` is the serialized JSON text exactly as it was written; the storage
/// layer never parses it. The `id` is immutable once created.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use pocketjson_storage::{Blob, GUEST_CREATOR};
///
/// let blob = Blob::builder()
///     .id("0123456789abcdef0123456789abcdef")
///     .data(r#"{"a":1}"#)
///     .expires_at(Utc::now() + Duration::hours(48))
///     .build();
///
/// assert_eq!(blob.creator_key, GUEST_CREATOR);
/// assert!(blob.is_live_at(Utc::now()));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct Blob {
    /// Globally unique identifier (random hex or `{prefix}_{custom}`).
    #[builder(into)]
    pub id: String,

    /// Serialized JSON payload.
    #[builder(into)]
    pub data: String,

    /// Instant after which the blob is logically dead.
    pub expires_at: DateTime<Utc>,

    /// API key that created the blob, or [`GUEST_CREATOR`].
    #[builder(into, default = GUEST_CREATOR.to_owned())]
    pub creator_key: String,
}

impl Blob {
    /// A blob is live iff `now < expires_at`.
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

// A non-guest creator is an API key.
impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let creator = if self.creator_key == GUEST_CREATOR { GUEST_CREATOR } else { "<redacted>" };
        f.debug_struct("Blob")
            .field("id", &self.id)
            .field("data_len", &self.data.len())
            .field("expires_at", &self.expires_at)
            .field("creator_key", &creator)
            .finish()
    }
}

/// A persisted API key.
///
/// The master key from configuration is never stored as one of these.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyRecord {
    /// The bearer secret. Unique across the store.
    #[builder(into)]
    pub key: String,

    /// Free-text description supplied at issuance.
    #[builder(into)]
    pub description: Option<String>,

    /// Grants key issuance and revocation.
    #[builder(default = false)]
    pub is_admin: bool,

    /// When the record was created.
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

// The key is a secret; keep it out of logs.
impl std::fmt::Debug for ApiKeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyRecord")
            .field("key", &"<redacted>")
            .field("description", &self.description)
            .field("is_admin", &self.is_admin)
            .field("created_at", &self.created_at)
            .finish()
    }
}
