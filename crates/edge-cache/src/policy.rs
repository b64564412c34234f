//! Expiration rules resolved at store time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use edge_core::CacheContext;
use serde::{Deserialize, Serialize};

/// Concrete expiration of a stored entry.
///
/// A cache context may express expiration as an absolute instant, as a
/// duration after storing, or as a sliding window. At store time the first
/// two collapse into a single `expires_on`; the sliding window is kept and
/// checked against the last access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationPolicy {
    /// Absolute expiration.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expires_on: Option<DateTime<Utc>>,
    /// Sliding window since last access.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sliding: Option<Duration>,
}

impl ExpirationPolicy {
    /// Never expires.
    pub fn never() -> Self {
        Self::default()
    }

    /// Resolve the policy of `context` stored at `now`.
    ///
    /// `fallback` applies only when the context configures no expiration.
    pub fn resolve(context: &CacheContext, now: DateTime<Utc>, fallback: Option<Duration>) -> Self {
        let after = if context.has_expiration() {
            context.expires_after
        } else {
            fallback
        };

        let relative = after.and_then(|d| add(now, d));
        let expires_on = match (context.expires_on, relative) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        Self {
            expires_on,
            sliding: context.expires_sliding,
        }
    }

    /// Whether an entry last read at `last_accessed` has expired at `now`.
    pub fn is_expired(&self, last_accessed: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if matches!(self.expires_on, Some(at) if now >= at) {
            return true;
        }
        match self.sliding.and_then(|d| add(last_accessed, d)) {
            Some(until) => now >= until,
            None => false,
        }
    }

    /// Whether reads renew the entry.
    pub fn is_sliding(&self) -> bool {
        self.sliding.is_some()
    }
}

fn add(at: DateTime<Utc>, duration: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| at.checked_add_signed(d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    #[test]
    fn test_expiry_after_becomes_absolute() {
        let ctx = CacheContext::new("a").with_expiry_after(Duration::from_secs(60));
        let policy = ExpirationPolicy::resolve(&ctx, t0(), None);

        assert_eq!(policy.expires_on, Some(t0() + secs(60)));
        assert!(!policy.is_expired(t0(), t0() + secs(59)));
        assert!(policy.is_expired(t0(), t0() + secs(61)));
    }

    #[test]
    fn test_earliest_of_absolute_and_relative() {
        let ctx = CacheContext::new("a")
            .with_expiry_on(t0() + secs(30))
            .with_expiry_after(Duration::from_secs(60));
        let policy = ExpirationPolicy::resolve(&ctx, t0(), None);
        assert_eq!(policy.expires_on, Some(t0() + secs(30)));
    }

    #[test]
    fn test_fallback_only_without_configured_expiration() {
        let fallback = Some(Duration::from_secs(300));

        let plain = ExpirationPolicy::resolve(&CacheContext::new("a"), t0(), fallback);
        assert_eq!(plain.expires_on, Some(t0() + secs(300)));

        let sliding_ctx = CacheContext::new("b").with_expiry_sliding(Duration::from_secs(10));
        let sliding = ExpirationPolicy::resolve(&sliding_ctx, t0(), fallback);
        assert_eq!(sliding.expires_on, None);
        assert!(sliding.is_sliding());
    }

    #[test]
    fn test_sliding_window_measured_from_last_access() {
        let ctx = CacheContext::new("a").with_expiry_sliding(Duration::from_secs(10));
        let policy = ExpirationPolicy::resolve(&ctx, t0(), None);

        assert!(!policy.is_expired(t0() + secs(8), t0() + secs(15)));
        assert!(policy.is_expired(t0(), t0() + secs(15)));
    }

    #[test]
    fn test_never() {
        let policy = ExpirationPolicy::never();
        assert!(!policy.is_expired(t0(), t0() + secs(1_000_000)));
    }
}
