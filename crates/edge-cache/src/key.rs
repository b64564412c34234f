//! Cache key composition.

use edge_core::{CacheContext, ContextValues};
use serde::{Deserialize, Serialize};

/// Separator between the cache id and each resolved dimension.
const KEY_SEPARATOR: char = ';';

/// Suffix of dependency record keys.
const DEPENDENCIES_SUFFIX: &str = "#dependencies";

/// A storage key uniquely identifying a cached fragment variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// The computed key string.
    key: String,
    /// Components that make up the key (for debugging).
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    components: Vec<String>,
}

impl CacheKey {
    /// Create a cache key from a string.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            components: Vec::new(),
        }
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Get the key components (for debugging).
    pub fn components(&self) -> &[String] {
        &self.components
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// Builder composing storage keys from a cache context and request values.
///
/// The key is the cache id followed by `dimension=value` for every context
/// dimension, in sorted order. A dimension with no value for the current
/// request contributes an empty value so the key shape stays stable.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyBuilder {
    prefix: Option<String>,
}

impl CacheKeyBuilder {
    /// Create a new cache key builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for the cache key (e.g. a tenant-wide namespace).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Build the key for `context` under the current request `values`.
    pub fn build(&self, context: &CacheContext, values: &ContextValues) -> CacheKey {
        let mut key = String::new();
        let mut components = Vec::with_capacity(context.contexts.len() + 1);

        if let Some(prefix) = &self.prefix {
            key.push_str(prefix);
            key.push(':');
        }
        key.push_str(&context.cache_id);
        components.push(format!("id:{}", context.cache_id));

        for dimension in &context.contexts {
            let value = values.get(dimension).unwrap_or_default();
            key.push(KEY_SEPARATOR);
            key.push_str(dimension);
            key.push('=');
            key.push_str(value);
            components.push(format!("{}:{}", dimension, value));
        }

        CacheKey { key, components }
    }

    /// Key of the dependency record kept for `cache_id`.
    pub fn dependencies_key(&self, cache_id: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{cache_id}{DEPENDENCIES_SUFFIX}"),
            None => format!("{cache_id}{DEPENDENCIES_SUFFIX}"),
        }
    }
}
