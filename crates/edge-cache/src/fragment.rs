//! Stored fragment envelope and cache status.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use edge_core::CacheContext;
use serde::{Deserialize, Serialize};

use crate::key::CacheKey;
use crate::policy::ExpirationPolicy;

/// Status of a fragment cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from the cache.
    Hit,
    /// Rendered and stored.
    Miss,
    /// Content was supplied before the cache was consulted.
    Bypass,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
            Self::Bypass => write!(f, "BYPASS"),
        }
    }
}

/// A cached fragment as written to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedFragment {
    /// Cache id of the fragment.
    pub cache_id: String,
    /// Full storage key.
    pub key: String,
    /// Pre-encoded HTML.
    pub content: String,
    /// Dimensions the content varies by.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub contexts: BTreeSet<String>,
    /// Invalidation tags.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// When the entry was stored.
    pub created_at: DateTime<Utc>,
    /// When the entry was last read.
    pub last_accessed: DateTime<Utc>,
    /// Expiration resolved at store time.
    #[serde(default)]
    pub expiration: ExpirationPolicy,
}

impl CachedFragment {
    /// Build the envelope for `content` stored under `key` at `now`.
    pub fn new(
        context: &CacheContext,
        key: &CacheKey,
        content: impl Into<String>,
        now: DateTime<Utc>,
        expiration: ExpirationPolicy,
    ) -> Self {
        Self {
            cache_id: context.cache_id.clone(),
            key: key.as_str().to_string(),
            content: content.into(),
            contexts: context.contexts.clone(),
            tags: context.tags.clone(),
            created_at: now,
            last_accessed: now,
            expiration,
        }
    }

    /// Whether the entry has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_expired(self.last_accessed, now)
    }

    /// Age of the entry at `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    /// Tags as a list, for backends that index them.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags.iter().cloned().collect()
    }
}

/// Per-fragment cache outcome recorded during a render pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentCacheInfo {
    /// Cache id of the fragment.
    pub cache_id: String,
    /// Lookup outcome.
    pub status: CacheStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_envelope_copies_context() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ctx = CacheContext::new("home-banner")
            .add_context("culture")
            .add_tag("banner")
            .with_expiry_after(Duration::from_secs(60));
        let key = CacheKey::new("home-banner;culture=en");
        let policy = ExpirationPolicy::resolve(&ctx, now, None);

        let entry = CachedFragment::new(&ctx, &key, "Welcome", now, policy);

        assert_eq!(entry.cache_id, "home-banner");
        assert_eq!(entry.key, "home-banner;culture=en");
        assert_eq!(entry.tag_list(), vec!["banner".to_string()]);
        assert!(!entry.is_expired(now + chrono::Duration::seconds(60) - chrono::Duration::milliseconds(1)));
        assert!(entry.is_expired(now + chrono::Duration::seconds(61)));
        assert_eq!(entry.age(now + chrono::Duration::seconds(5)).num_seconds(), 5);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(CacheStatus::Hit.to_string(), "HIT");
        assert_eq!(CacheStatus::Miss.to_string(), "MISS");
        assert_eq!(CacheStatus::Bypass.to_string(), "BYPASS");
    }
}
