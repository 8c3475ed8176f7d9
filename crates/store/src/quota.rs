//! Per-caller limits.
//!
//! A [`Caller`] is either a guest or the holder of a valid key. Guests get
//! the small payload limit, random ids and the default expiry. Key holders
//! get the large limit and may choose their id and expiry.

use chrono::{DateTime, Months, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{config::StoreConfig, error::StoreError};

/// Horizon used for [`Expiry::Never`], in months (100 years).
const NEVER_EXPIRES_MONTHS: u32 = 100 * 12;

/// Who is making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Caller {
    /// No key, or a key that did not validate.
    Guest,
    /// A valid stored key or the master key.
    Authenticated {
        /// The key may issue and revoke keys.
        is_admin: bool,
    },
}

impl Caller {
    /// Returns `true` for [`Caller::Guest`].
    #[must_use]
    pub fn is_guest(self) -> bool {
        matches!(self, Self::Guest)
    }

    /// Returns `true` for an authenticated admin.
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Authenticated { is_admin: true })
    }
}

/// Requested blob lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiry {
    /// The configured default expiry.
    #[default]
    Default,
    /// This many hours from now. Zero falls back to the default.
    Hours(u32),
    /// One hundred years from now.
    Never,
}

impl Expiry {
    /// Parses the `expiry` query value used by the HTTP layer.
    ///
    /// `"never"` maps to [`Expiry::Never`] and an unsigned integer to
    /// [`Expiry::Hours`]. Anything else, including negative numbers, maps to
    /// [`Expiry::Default`].
    ///
    /// ```
    /// use pocketjson::Expiry;
    ///
    /// assert_eq!(Expiry::parse("never"), Expiry::Never);
    /// assert_eq!(Expiry::parse("12"), Expiry::Hours(12));
    /// assert_eq!(Expiry::parse("soon"), Expiry::Default);
    /// ```
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "never" => Self::Never,
            other => other.parse().map_or(Self::Default, Self::Hours),
        }
    }
}

/// Limits that apply to one caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    max_payload_bytes: usize,
    custom_ids: bool,
    custom_expiry: bool,
}

impl Quota {
    /// Returns the quota for `caller` under `config`.
    #[must_use]
    pub fn for_caller(caller: Caller, config: &StoreConfig) -> Self {
        match caller {
            Caller::Guest => Self {
                max_payload_bytes: config.guest_max_payload_bytes(),
                custom_ids: false,
                custom_expiry: false,
            },
            Caller::Authenticated { .. } => Self {
                max_payload_bytes: config.authenticated_max_payload_bytes(),
                custom_ids: true,
                custom_expiry: true,
            },
        }
    }

    /// Largest accepted serialized payload, in bytes.
    #[must_use]
    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Whether the caller may choose the blob id.
    #[must_use]
    pub fn allows_custom_id(&self) -> bool {
        self.custom_ids
    }

    /// Whether the caller may choose the blob expiry.
    #[must_use]
    pub fn allows_custom_expiry(&self) -> bool {
        self.custom_expiry
    }

    /// Checks a serialized payload size against the limit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TooLarge`] if `size` exceeds the limit.
    pub fn check_payload_size(&self, size: usize) -> Result<(), StoreError> {
        if size > self.max_payload_bytes {
            return Err(StoreError::TooLarge { size, limit: self.max_payload_bytes });
        }
        Ok(())
    }

    /// Resolves a requested expiry into an instant.
    ///
    /// Callers without custom expiry always get `now + default`. Hour counts
    /// past the [`Expiry::Never`] horizon are clamped to it. The result is
    /// truncated to whole milliseconds, the precision every backend keeps.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFormat`] if the result falls outside the
    /// representable timestamp range.
    pub fn resolve_expiry(
        &self,
        requested: Expiry,
        now: DateTime<Utc>,
        default: std::time::Duration,
    ) -> Result<DateTime<Utc>, StoreError> {
        let requested = if self.custom_expiry { requested } else { Expiry::Default };
        let never = now.checked_add_months(Months::new(NEVER_EXPIRES_MONTHS));

        let expires_at = match requested {
            Expiry::Never => never,
            Expiry::Hours(hours) if hours > 0 => {
                let at = now.checked_add_signed(chrono::Duration::hours(i64::from(hours)));
                match (at, never) {
                    (Some(at), Some(never)) => Some(at.min(never)),
                    _ => never,
                }
            },
            Expiry::Default | Expiry::Hours(_) => chrono::Duration::from_std(default)
                .ok()
                .and_then(|default| now.checked_add_signed(default)),
        };

        expires_at
            .map(|at| at.trunc_subsecs(3))
            .ok_or_else(|| StoreError::invalid_format("expiry is out of range"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    const DEFAULT: Duration = Duration::from_secs(48 * 3600);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
    }

    fn never() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2126, 1, 15, 12, 0, 0).unwrap()
    }

    fn authenticated() -> Quota {
        Quota::for_caller(Caller::Authenticated { is_admin: false }, &StoreConfig::default())
    }

    fn guest() -> Quota {
        Quota::for_caller(Caller::Guest, &StoreConfig::default())
    }

    #[test]
    fn test_guest_quota() {
        let quota = guest();
        assert_eq!(quota.max_payload_bytes(), 100 * 1024);
        assert!(!quota.allows_custom_id());
        assert!(!quota.allows_custom_expiry());
    }

    #[test]
    fn test_authenticated_quota() {
        let quota = authenticated();
        assert_eq!(quota.max_payload_bytes(), 1024 * 1024);
        assert!(quota.allows_custom_id());
        assert!(quota.allows_custom_expiry());
    }

    #[test]
    fn test_payload_size_boundary() {
        let quota = guest();
        assert!(quota.check_payload_size(100 * 1024).is_ok());
        let err = quota.check_payload_size(100 * 1024 + 1).unwrap_err();
        assert!(matches!(err, StoreError::TooLarge { size: 102_401, limit: 102_400 }));
    }

    #[rstest]
    #[case::default(Expiry::Default, now() + chrono::Duration::hours(48))]
    #[case::hours(Expiry::Hours(6), now() + chrono::Duration::hours(6))]
    #[case::zero_hours_uses_default(Expiry::Hours(0), now() + chrono::Duration::hours(48))]
    #[case::never(Expiry::Never, never())]
    #[case::hours_clamped_to_never(Expiry::Hours(u32::MAX), never())]
    fn test_authenticated_expiry(#[case] requested: Expiry, #[case] expected: DateTime<Utc>) {
        let resolved = authenticated().resolve_expiry(requested, now(), DEFAULT).unwrap();
        assert_eq!(resolved, expected);
    }

    #[rstest]
    #[case::hours(Expiry::Hours(6))]
    #[case::never(Expiry::Never)]
    fn test_guest_expiry_requests_are_ignored(#[case] requested: Expiry) {
        let resolved = guest().resolve_expiry(requested, now(), DEFAULT).unwrap();
        assert_eq!(resolved, now() + chrono::Duration::hours(48));
    }

    #[test]
    fn test_expiry_is_truncated_to_millis() {
        let precise = now() + chrono::Duration::nanoseconds(157_605_226);
        let resolved = authenticated().resolve_expiry(Expiry::Hours(1), precise, DEFAULT).unwrap();
        let expected = now() + chrono::Duration::hours(1) + chrono::Duration::milliseconds(157);
        assert_eq!(resolved, expected);
    }

    #[rstest]
    #[case::never("never", Expiry::Never)]
    #[case::hours("24", Expiry::Hours(24))]
    #[case::zero("0", Expiry::Hours(0))]
    #[case::negative("-5", Expiry::Default)]
    #[case::garbage("tomorrow", Expiry::Default)]
    #[case::empty("", Expiry::Default)]
    #[case::uppercase_never("NEVER", Expiry::Default)]
    fn test_parse_expiry(#[case] raw: &str, #[case] expected: Expiry) {
        assert_eq!(Expiry::parse(raw), expected);
    }

    #[test]
    fn test_caller_predicates() {
        assert!(Caller::Guest.is_guest());
        assert!(!Caller::Guest.is_admin());
        assert!(Caller::Authenticated { is_admin: true }.is_admin());
        assert!(!Caller::Authenticated { is_admin: false }.is_admin());
        assert!(!Caller::Authenticated { is_admin: false }.is_guest());
    }
}
