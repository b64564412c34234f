//! Dynamic cache service: maps cache contexts to stored content.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edge_core::{CacheContext, Clock, ContextValues, SystemClock};
use edge_json::PoolingJsonSerializer;
use tracing::debug;

use crate::backend::FragmentCacheBackend;
use crate::error::CacheResult;
use crate::fragment::CachedFragment;
use crate::key::{CacheKey, CacheKeyBuilder};
use crate::policy::ExpirationPolicy;

/// Stores and retrieves rendered fragment content by cache context.
#[async_trait]
pub trait DynamicCacheService: Send + Sync {
    /// Content stored for `context`, or `None` on a miss.
    async fn get_cached_value(&self, context: &CacheContext) -> CacheResult<Option<String>>;

    /// Store `value` for `context`, honouring its tags and expiration.
    async fn set_cached_value(&self, context: &CacheContext, value: &str) -> CacheResult<()>;

    /// Remove every entry tagged with `tag`.
    async fn invalidate_tag(&self, tag: &str) -> CacheResult<u64>;

    /// `context` extended with the dimensions and tags its fragment picked
    /// up from nested fragments on earlier renders.
    async fn resolve_context(&self, context: &CacheContext) -> CacheResult<CacheContext> {
        Ok(context.clone())
    }

    /// Resolve `context` and look up its content in one step.
    async fn lookup(&self, context: &CacheContext) -> CacheResult<CacheLookup> {
        let context = self.resolve_context(context).await?;
        let value = self.get_cached_value(&context).await?;
        Ok(CacheLookup { context, value })
    }
}

/// Outcome of [`DynamicCacheService::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLookup {
    /// The declared context extended with its recorded dependencies.
    pub context: CacheContext,
    /// Stored content, or `None` on a miss.
    pub value: Option<String>,
}

/// Cache service over a [`FragmentCacheBackend`].
///
/// Built per request: the request's [`ContextValues`] decide which variant
/// of a fragment a context maps to. Entries are encoded as
/// [`CachedFragment`] envelopes with the pooling serializer.
///
/// A fragment's stored context can vary by more than it declares, since
/// nested fragments merge their dimensions into it. The service keeps a
/// dependency record per cache id so lookups build the same key the entry
/// was stored under.
pub struct DefaultDynamicCacheService {
    backend: Arc<dyn FragmentCacheBackend>,
    serializer: PoolingJsonSerializer,
    clock: Arc<dyn Clock>,
    values: ContextValues,
    keys: CacheKeyBuilder,
    default_expiration: Option<Duration>,
}

impl DefaultDynamicCacheService {
    /// Create a service using the system clock.
    pub fn new(
        backend: Arc<dyn FragmentCacheBackend>,
        serializer: PoolingJsonSerializer,
        values: ContextValues,
    ) -> Self {
        Self {
            backend,
            serializer,
            clock: Arc::new(SystemClock),
            values,
            keys: CacheKeyBuilder::new(),
            default_expiration: None,
        }
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Expiration for contexts that configure none.
    pub fn with_default_expiration(mut self, expiration: Option<Duration>) -> Self {
        self.default_expiration = expiration;
        self
    }

    /// Prefix every storage key.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.keys = CacheKeyBuilder::new().with_prefix(prefix);
        self
    }

    /// Storage key for `context` under this request's values.
    pub fn cache_key(&self, context: &CacheContext) -> CacheKey {
        self.keys.build(context, &self.values)
    }

    async fn store(&self, entry: &CachedFragment) -> CacheResult<()> {
        let payload = self.serializer.serialize(entry)?;
        self.backend.set(&entry.key, payload, &entry.tag_list()).await
    }

    async fn dependencies(&self, cache_id: &str) -> CacheResult<Option<CacheContext>> {
        match self.backend.get(&self.keys.dependencies_key(cache_id)).await? {
            Some(payload) => Ok(Some(self.serializer.deserialize(&payload)?)),
            None => Ok(None),
        }
    }

    /// Record the dimensions, tags and expiration rules of `context`
    /// unless already known.
    async fn record_dependencies(&self, context: &CacheContext, recorded: Option<&CacheContext>) -> CacheResult<()> {
        if context.contexts.is_empty() && context.tags.is_empty() && !context.has_expiration() {
            return Ok(());
        }

        if recorded == Some(context) {
            return Ok(());
        }

        let payload = self.serializer.serialize(context)?;
        self.backend
            .set(&self.keys.dependencies_key(&context.cache_id), payload, &[])
            .await
    }

    async fn read(&self, context: &CacheContext) -> CacheResult<Option<String>> {
        let key = self.cache_key(context);

        let Some(payload) = self.backend.get(key.as_str()).await? else {
            return Ok(None);
        };
        let mut entry: CachedFragment = self.serializer.deserialize(&payload)?;

        let now = self.clock.now();
        if entry.is_expired(now) {
            debug!(cache_id = %context.cache_id, key = %key, "cached fragment expired");
            self.backend.delete(key.as_str()).await?;
            return Ok(None);
        }

        if entry.expiration.is_sliding() {
            entry.last_accessed = now;
            self.store(&entry).await?;
        }

        Ok(Some(entry.content))
    }
}

/// `context` merged with its record. Recorded expirations keep the earliest
/// rule; a recorded absolute instant already in the past is ignored.
fn with_dependencies(context: &CacheContext, recorded: Option<&CacheContext>, now: DateTime<Utc>) -> CacheContext {
    let mut resolved = context.clone();
    if let Some(recorded) = recorded {
        let mut recorded = recorded.clone();
        if recorded.expires_on.is_some_and(|at| at <= now) {
            recorded.expires_on = None;
        }
        resolved.merge_from(&recorded);
    }
    resolved
}

#[async_trait]
impl DynamicCacheService for DefaultDynamicCacheService {
    async fn get_cached_value(&self, context: &CacheContext) -> CacheResult<Option<String>> {
        let context = self.resolve_context(context).await?;
        let key = self.cache_key(&context);

        let Some(payload) = self.backend.get(key.as_str()).await? else {
            return Ok(None);
        };
        let mut entry: CachedFragment = self.serializer.deserialize(&payload)?;

        let now = self.clock.now();
        if entry.is_expired(now) {
            debug!(cache_id = %context.cache_id, key = %key, "cached fragment expired");
            self.backend.delete(key.as_str()).await?;
            return Ok(None);
        }

        if entry.expiration.is_sliding() {
            entry.last_accessed = now;
            self.store(&entry).await?;
        }

        Ok(Some(entry.content))
    }

    async fn set_cached_value(&self, context: &CacheContext, value: &str) -> CacheResult<()> {
        let recorded = self.dependencies(&context.cache_id).await?;
        let context = with_dependencies(context, recorded.as_ref(), self.clock.now());
        self.record_dependencies(&context, recorded.as_ref()).await?;

        let key = self.cache_key(&context);
        let now = self.clock.now();
        let expiration = ExpirationPolicy::resolve(&context, now, self.default_expiration);
        let entry = CachedFragment::new(&context, &key, value, now, expiration);

        debug!(cache_id = %context.cache_id, key = %key, "storing fragment");
        self.store(&entry).await
    }

    async fn invalidate_tag(&self, tag: &str) -> CacheResult<u64> {
        let removed = self.backend.invalidate_tag(tag).await?;
        debug!(tag, removed, "invalidated cache tag");
        Ok(removed)
    }

    async fn resolve_context(&self, context: &CacheContext) -> CacheResult<CacheContext> {
        let recorded = self.dependencies(&context.cache_id).await?;
        Ok(with_dependencies(context, recorded.as_ref(), self.clock.now()))
    }

    async fn lookup(&self, context: &CacheContext) -> CacheResult<CacheLookup> {
        let context = self.resolve_context(context).await?;
        let value = self.read(&context).await?;
        Ok(CacheLookup { context, value })
    }
}
