//! Per-request values that cache keys vary by.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("{:x}-{:x}", nanos, seq))
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Well-known context dimensions.
pub mod dimensions {
    /// Request culture, e.g. `en-US`.
    pub const CULTURE: &str = "culture";
    /// Tenant name.
    pub const TENANT: &str = "tenant";
    /// Authenticated user id.
    pub const USER: &str = "user";
    /// Route path.
    pub const ROUTE: &str = "route";
    /// Device class (`desktop`, `mobile`, ...).
    pub const DEVICE: &str = "device";
    /// Prefix for query-string dimensions, e.g. `query:page`.
    pub const QUERY_PREFIX: &str = "query:";
}

/// Values of the context dimensions for the current request.
///
/// Keys are dimension names such as `culture` or `query:page`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextValues {
    values: BTreeMap<String, String>,
}

impl ContextValues {
    /// Create an empty set of values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a dimension value.
    pub fn with(mut self, dimension: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(dimension, value);
        self
    }

    /// Set the culture.
    pub fn with_culture(self, culture: impl Into<String>) -> Self {
        self.with(dimensions::CULTURE, culture)
    }

    /// Set the tenant.
    pub fn with_tenant(self, tenant: impl Into<String>) -> Self {
        self.with(dimensions::TENANT, tenant)
    }

    /// Set the authenticated user.
    pub fn with_user(self, user: impl Into<String>) -> Self {
        self.with(dimensions::USER, user)
    }

    /// Set the route path.
    pub fn with_route(self, route: impl Into<String>) -> Self {
        self.with(dimensions::ROUTE, route)
    }

    /// Set a query-string parameter.
    pub fn with_query(self, name: &str, value: impl Into<String>) -> Self {
        self.with(format!("{}{}", dimensions::QUERY_PREFIX, name), value)
    }

    /// Set a dimension value in place.
    pub fn insert(&mut self, dimension: impl Into<String>, value: impl Into<String>) {
        self.values.insert(dimension.into(), value.into());
    }

    /// Look up a dimension.
    pub fn get(&self, dimension: &str) -> Option<&str> {
        self.values.get(dimension).map(|s| s.as_str())
    }

    /// Iterate over dimensions in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
