//! Stack of cache scopes open during a render pass.

use std::time::Duration;

use chrono::{DateTime, Utc};
use edge_core::CacheContext;

use crate::error::ScopeError;

/// Tracks the cache contexts entered while fragments render.
///
/// Scopes nest with rendering: a child fragment's scope opens and closes
/// while its parent's is open. When a scope exits, its dimensions, tags
/// and expiration are folded into the enclosing scope, so a parent's cached
/// output varies by everything embedded in it.
///
/// The manager belongs to a single render pass and is not synchronized.
#[derive(Debug, Default)]
pub struct CacheScopeManager {
    scopes: Vec<CacheContext>,
}

impl CacheScopeManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a scope.
    pub fn enter_scope(&mut self, context: CacheContext) {
        self.scopes.push(context);
    }

    /// Pop the innermost scope and merge it into its parent.
    pub fn exit_scope(&mut self) -> Result<CacheContext, ScopeError> {
        let child = self.scopes.pop().ok_or(ScopeError::NoOpenScope)?;
        if let Some(parent) = self.scopes.last_mut() {
            parent.merge_from(&child);
        }
        Ok(child)
    }

    /// The innermost open scope.
    pub fn current(&self) -> Option<&CacheContext> {
        self.scopes.last()
    }

    /// The innermost open scope with the given cache id.
    pub fn find(&self, cache_id: &str) -> Option<&CacheContext> {
        self.scopes.iter().rev().find(|c| c.cache_id == cache_id)
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Whether no scope is open.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Cache ids of open scopes, outermost first.
    pub fn open_ids(&self) -> Vec<String> {
        self.scopes.iter().map(|c| c.cache_id.clone()).collect()
    }

    /// Make the innermost scope vary by more dimensions.
    pub fn add_contexts<I, S>(&mut self, contexts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(scope) = self.scopes.last_mut() {
            scope.contexts.extend(contexts.into_iter().map(Into::into));
        }
    }

    /// Add invalidation tags to the innermost scope.
    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(scope) = self.scopes.last_mut() {
            scope.tags.extend(tags.into_iter().map(Into::into));
        }
    }

    /// Bound the innermost scope by an absolute expiration.
    pub fn with_expiry_on(&mut self, expires_on: DateTime<Utc>) {
        self.merge_into_current(CacheContext::new("").with_expiry_on(expires_on));
    }

    /// Bound the innermost scope by an expiration after storing.
    pub fn with_expiry_after(&mut self, duration: Duration) {
        self.merge_into_current(CacheContext::new("").with_expiry_after(duration));
    }

    /// Bound the innermost scope by a sliding expiration.
    pub fn with_expiry_sliding(&mut self, duration: Duration) {
        self.merge_into_current(CacheContext::new("").with_expiry_sliding(duration));
    }

    fn merge_into_current(&mut self, dependency: CacheContext) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.merge_from(&dependency);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_stack_order() {
        let mut scopes = CacheScopeManager::new();
        scopes.enter_scope(CacheContext::new("page"));
        scopes.enter_scope(CacheContext::new("menu"));

        assert_eq!(scopes.depth(), 2);
        assert_eq!(scopes.current().map(|c| c.cache_id.as_str()), Some("menu"));

        assert_eq!(scopes.exit_scope().unwrap().cache_id, "menu");
        assert_eq!(scopes.exit_scope().unwrap().cache_id, "page");
        assert!(scopes.is_empty());
    }

    #[test]
    fn test_exit_without_enter_fails() {
        let mut scopes = CacheScopeManager::new();
        assert_eq!(scopes.exit_scope().unwrap_err(), ScopeError::NoOpenScope);
    }

    #[test]
    fn test_exit_merges_child_into_parent() {
        let mut scopes = CacheScopeManager::new();
        scopes.enter_scope(CacheContext::new("page").add_context("culture"));
        scopes.enter_scope(
            CacheContext::new("cart")
                .add_context("user")
                .add_tag("cart")
                .with_expiry_sliding(Duration::from_secs(30)),
        );

        let child = scopes.exit_scope().unwrap();
        assert!(!child.contexts.contains("culture"));

        let parent = scopes.current().unwrap();
        assert!(parent.contexts.contains("culture"));
        assert!(parent.contexts.contains("user"));
        assert!(parent.tags.contains("cart"));
        assert_eq!(parent.expires_sliding, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_dependencies_apply_to_innermost_scope() {
        let mut scopes = CacheScopeManager::new();
        scopes.add_tags(["ignored"]);

        scopes.enter_scope(CacheContext::new("page"));
        scopes.enter_scope(CacheContext::new("list"));
        scopes.add_contexts(["query:page"]);
        scopes.add_tags(["products"]);
        scopes.with_expiry_after(Duration::from_secs(120));
        scopes.with_expiry_after(Duration::from_secs(300));

        let list = scopes.current().unwrap();
        assert!(list.contexts.contains("query:page"));
        assert!(list.tags.contains("products"));
        assert_eq!(list.expires_after, Some(Duration::from_secs(120)));
        assert!(scopes.find("page").unwrap().tags.is_empty());

        scopes.exit_scope().unwrap();
        assert!(scopes.current().unwrap().tags.contains("products"));
    }

    #[test]
    fn test_find_prefers_innermost() {
        let mut scopes = CacheScopeManager::new();
        scopes.enter_scope(CacheContext::new("item").add_tag("outer"));
        scopes.enter_scope(CacheContext::new("item").add_tag("inner"));

        assert!(scopes.find("item").unwrap().tags.contains("inner"));
        assert_eq!(scopes.open_ids(), vec!["item".to_string(), "item".to_string()]);
        assert!(scopes.find("missing").is_none());
    }
}
