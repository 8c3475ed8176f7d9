//! Configured master key.
//!
//! The master key is an admin credential that lives only in configuration.
//! It is never stored as an [`ApiKeyRecord`](pocketjson_storage::ApiKeyRecord)
//! and is compared in constant time.

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// The configured master API key.
///
/// Construction rejects the empty string, so an unset or blank master key
/// can never match a presented key.
///
/// ```
/// use pocketjson_authn::MasterKey;
///
/// let master = MasterKey::new("s3cret-master").unwrap();
/// assert!(master.matches("s3cret-master"));
/// assert!(!master.matches("s3cret-mastex"));
///
/// assert!(MasterKey::new("").is_none());
/// ```
#[derive(Clone)]
pub struct MasterKey(Zeroizing<String>);

impl MasterKey {
    /// Wraps a master key, returning `None` if it is empty.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = Zeroizing::new(key.into());
        if key.is_empty() { None } else { Some(Self(key)) }
    }

    /// Returns `true` if `candidate` is the master key.
    ///
    /// A length mismatch returns `false` immediately; equal-length inputs are
    /// compared without data-dependent early exit.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let candidate = candidate.as_bytes();
        if expected.len() != candidate.len() {
            return false;
        }
        expected.ct_eq(candidate).into()
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Instant;

    use rstest::rstest;

    use super::*;

    const MASTER: &str = "0123456789abcdef0123456789abcdef";

    #[rstest]
    #[case::exact(MASTER, true)]
    #[case::first_byte_differs("x123456789abcdef0123456789abcdef", false)]
    #[case::last_byte_differs("0123456789abcdef0123456789abcdex", false)]
    #[case::shorter("0123456789abcdef0123456789abcde", false)]
    #[case::longer("0123456789abcdef0123456789abcdef0", false)]
    #[case::empty("", false)]
    #[case::case_differs("0123456789ABCDEF0123456789ABCDEF", false)]
    fn test_matches(#[case] candidate: &str, #[case] expected: bool) {
        let master = MasterKey::new(MASTER).unwrap();
        assert_eq!(master.matches(candidate), expected);
    }

    #[test]
    fn test_empty_master_key_is_rejected() {
        assert!(MasterKey::new("").is_none());
        assert!(MasterKey::new(String::new()).is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let master = MasterKey::new(MASTER).unwrap();
        let rendered = format!("{master:?}");
        assert!(!rendered.contains(MASTER));
        assert!(rendered.contains("redacted"));
    }

    /// Mismatches at the first and last byte should take about the same time.
    ///
    /// Timing is noisy on shared machines, so this runs only on request:
    /// `cargo test -p pocketjson-authn -- --ignored`.
    #[test]
    #[ignore = "statistical timing check; run explicitly"]
    fn test_comparison_time_independent_of_mismatch_position() {
        const ROUNDS: usize = 200_000;
        let key = "k".repeat(4096);
        let master = MasterKey::new(key.clone()).unwrap();

        let mut first = key.clone().into_bytes();
        first[0] = b'x';
        let first = String::from_utf8(first).unwrap();
        let mut last = key.into_bytes();
        let end = last.len() - 1;
        last[end] = b'x';
        let last = String::from_utf8(last).unwrap();

        let time = |candidate: &str| {
            let start = Instant::now();
            for _ in 0..ROUNDS {
                std::hint::black_box(master.matches(std::hint::black_box(candidate)));
            }
            start.elapsed().as_secs_f64()
        };

        // Warm up, then measure.
        let _ = time(&first);
        let first_secs = time(&first);
        let last_secs = time(&last);

        let ratio = first_secs.max(last_secs) / first_secs.min(last_secs);
        assert!(ratio < 1.5, "timing ratio {ratio:.2} suggests early exit");
    }
}
