//! Per-render-pass state.

use std::collections::{HashMap, HashSet};

use edge_core::{CacheContext, RequestId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ScopeError;
use crate::fragment::{CacheStatus, FragmentCacheInfo};
use crate::scope::CacheScopeManager;

/// Cache activity of one render pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStats {
    /// Fragments served from the cache.
    pub hits: u64,
    /// Cacheable fragments not found in the cache.
    pub misses: u64,
    /// Rendered fragments written to the cache.
    pub stores: u64,
    /// Fragment bodies rendered by the engine.
    pub bodies_rendered: u64,
    /// Scopes entered.
    pub scopes_opened: u64,
    /// Scopes exited.
    pub scopes_closed: u64,
    /// Per-fragment outcomes, in lookup order.
    pub fragments: Vec<FragmentCacheInfo>,
}

/// State of a single top-level render.
///
/// Created when a page starts rendering and discarded when it finishes.
/// Threaded by `&mut` through every hook, so it is never shared between
/// requests or parallel renders.
#[derive(Debug)]
pub struct RenderSession {
    request_id: RequestId,
    scopes: CacheScopeManager,
    /// Cache ids whose content this pass read from the cache.
    from_cache: HashSet<String>,
    /// Cache ids with an open scope, counted so re-entrant ids close once per entry.
    open_scopes: HashMap<String, usize>,
    stats: RenderStats,
}

impl RenderSession {
    /// Start a render pass with a fresh request id.
    pub fn new() -> Self {
        Self::with_request_id(RequestId::generate())
    }

    /// Start a render pass for a known request.
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            scopes: CacheScopeManager::new(),
            from_cache: HashSet::new(),
            open_scopes: HashMap::new(),
            stats: RenderStats::default(),
        }
    }

    /// Request this pass renders.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// The scope stack.
    pub fn scopes(&self) -> &CacheScopeManager {
        &self.scopes
    }

    /// The scope stack, for fragment bodies declaring extra dependencies.
    pub fn scopes_mut(&mut self) -> &mut CacheScopeManager {
        &mut self.scopes
    }

    /// Whether `cache_id` was served from the cache in this pass.
    pub fn is_from_cache(&self, cache_id: &str) -> bool {
        self.from_cache.contains(cache_id)
    }

    /// Whether `cache_id` has an open scope.
    pub fn is_scope_open(&self, cache_id: &str) -> bool {
        self.open_scopes.contains_key(cache_id)
    }

    /// Activity so far.
    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// End the pass, failing if any scope is still open.
    pub fn finish(mut self) -> Result<RenderStats, ScopeError> {
        if !self.scopes.is_empty() {
            let open = self.scopes.open_ids();
            self.scopes = CacheScopeManager::new();
            self.open_scopes.clear();
            return Err(ScopeError::Unclosed(open));
        }
        Ok(std::mem::take(&mut self.stats))
    }

    pub(crate) fn open_scope(&mut self, context: CacheContext) {
        *self.open_scopes.entry(context.cache_id.clone()).or_insert(0) += 1;
        self.scopes.enter_scope(context);
        self.stats.scopes_opened += 1;
    }

    /// Close the scope opened for `cache_id`, returning its merged context.
    ///
    /// `Ok(None)` when no scope is open for the id. Fails when the id's
    /// scope is open but another scope is innermost.
    pub(crate) fn close_scope(&mut self, cache_id: &str) -> Result<Option<CacheContext>, ScopeError> {
        if !self.is_scope_open(cache_id) {
            return Ok(None);
        }

        match self.scopes.current() {
            Some(top) if top.cache_id == cache_id => {}
            Some(top) => {
                return Err(ScopeError::OutOfOrder {
                    expected: cache_id.to_string(),
                    found: top.cache_id.clone(),
                })
            }
            None => return Err(ScopeError::NoOpenScope),
        }

        let context = self.scopes.exit_scope()?;
        if let Some(count) = self.open_scopes.get_mut(cache_id) {
            *count -= 1;
            if *count == 0 {
                self.open_scopes.remove(cache_id);
            }
        }
        self.stats.scopes_closed += 1;
        Ok(Some(context))
    }

    pub(crate) fn record_hit(&mut self, cache_id: &str) {
        self.from_cache.insert(cache_id.to_string());
        self.stats.hits += 1;
        self.record(cache_id, CacheStatus::Hit);
    }

    pub(crate) fn record_miss(&mut self, cache_id: &str) {
        self.stats.misses += 1;
        self.record(cache_id, CacheStatus::Miss);
    }

    pub(crate) fn record_bypass(&mut self, cache_id: &str) {
        self.record(cache_id, CacheStatus::Bypass);
    }

    pub(crate) fn record_store(&mut self) {
        self.stats.stores += 1;
    }

    pub(crate) fn record_body_rendered(&mut self) {
        self.stats.bodies_rendered += 1;
    }

    fn record(&mut self, cache_id: &str, status: CacheStatus) {
        self.stats.fragments.push(FragmentCacheInfo {
            cache_id: cache_id.to_string(),
            status,
        });
    }
}

impl Default for RenderSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        if !self.scopes.is_empty() {
            warn!(
                request_id = %self.request_id,
                open = ?self.scopes.open_ids(),
                "render session dropped with open cache scopes"
            );
        }
    }
}
