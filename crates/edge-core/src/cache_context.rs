//! Cache parameters attached to a cacheable fragment.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies a cacheable fragment and the rules its cached output follows.
///
/// The `cache_id` must be stable for the same fragment across requests.
/// What the cached value varies by is expressed through `contexts`
/// (e.g. `culture`, `tenant`, `query:page`), which are resolved against the
/// current request when the storage key is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheContext {
    /// Unique key for this fragment instance.
    pub cache_id: String,
    /// Dimensions the cached value varies by.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub contexts: BTreeSet<String>,
    /// Tags used for invalidation.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Absolute expiration instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<DateTime<Utc>>,
    /// Expiration relative to the moment the value is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_after: Option<Duration>,
    /// Sliding expiration, renewed on every read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_sliding: Option<Duration>,
}

impl CacheContext {
    /// Create a cache context with no dimensions, tags or expiration.
    pub fn new(cache_id: impl Into<String>) -> Self {
        Self {
            cache_id: cache_id.into(),
            contexts: BTreeSet::new(),
            tags: BTreeSet::new(),
            expires_on: None,
            expires_after: None,
            expires_sliding: None,
        }
    }

    /// Vary the cached value by a context dimension.
    pub fn add_context(mut self, context: impl Into<String>) -> Self {
        self.contexts.insert(context.into());
        self
    }

    /// Vary the cached value by several context dimensions.
    pub fn add_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts.extend(contexts.into_iter().map(Into::into));
        self
    }

    /// Stop varying by a context dimension.
    pub fn remove_context(mut self, context: &str) -> Self {
        self.contexts.remove(context);
        self
    }

    /// Add an invalidation tag.
    pub fn add_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Add several invalidation tags.
    pub fn add_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Remove an invalidation tag.
    pub fn remove_tag(mut self, tag: &str) -> Self {
        self.tags.remove(tag);
        self
    }

    /// Expire at an absolute instant.
    pub fn with_expiry_on(mut self, expires_on: DateTime<Utc>) -> Self {
        self.expires_on = Some(expires_on);
        self
    }

    /// Expire a fixed duration after the value is stored.
    pub fn with_expiry_after(mut self, duration: Duration) -> Self {
        self.expires_after = Some(duration);
        self
    }

    /// Expire once the value has not been read for `duration`.
    pub fn with_expiry_sliding(mut self, duration: Duration) -> Self {
        self.expires_sliding = Some(duration);
        self
    }

    /// Whether any expiration rule is configured.
    pub fn has_expiration(&self) -> bool {
        self.expires_on.is_some() || self.expires_after.is_some() || self.expires_sliding.is_some()
    }

    /// Fold a nested context into this one.
    ///
    /// Dimensions and tags are unioned; every expiration rule keeps the
    /// earliest of the two, so a parent never outlives content it embeds.
    pub fn merge_from(&mut self, child: &CacheContext) {
        self.contexts.extend(child.contexts.iter().cloned());
        self.tags.extend(child.tags.iter().cloned());
        self.expires_on = earliest(self.expires_on, child.expires_on);
        self.expires_after = earliest(self.expires_after, child.expires_after);
        self.expires_sliding = earliest(self.expires_sliding, child.expires_sliding);
    }
}

fn earliest<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
