//! Storage backends for encoded fragment entries.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::CacheResult;

/// Key-value store holding encoded cache entries.
///
/// Backends store opaque payloads and keep a tag index for invalidation.
/// Expiration is decided by the cache service, not the backend.
#[async_trait]
pub trait FragmentCacheBackend: Send + Sync {
    /// Get an entry payload.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store an entry payload, indexing it under `tags`.
    async fn set(&self, key: &str, payload: String, tags: &[String]) -> CacheResult<()>;

    /// Delete an entry.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Delete every entry indexed under `tag`, returning how many were removed.
    async fn invalidate_tag(&self, tag: &str) -> CacheResult<u64>;
}

#[derive(Debug, Default)]
struct Store {
    entries: HashMap<String, String>,
    /// tag -> keys indexed under it
    tags: HashMap<String, HashSet<String>>,
    /// key -> tags it is indexed under
    key_tags: HashMap<String, HashSet<String>>,
}

impl Store {
    /// Drop `key` from every tag it is indexed under.
    fn unindex(&mut self, key: &str) {
        let Some(tags) = self.key_tags.remove(key) else {
            return;
        };
        for tag in tags {
            if let Some(keys) = self.tags.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tags.remove(&tag);
                }
            }
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        self.unindex(key);
        self.entries.remove(key).is_some()
    }
}

/// In-memory fragment cache backend (for development/testing).
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    store: RwLock<Store>,
}

impl InMemoryBackend {
    /// Create a new in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.store.read().entries.len()
    }

    /// Whether the backend holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is stored.
    pub fn contains(&self, key: &str) -> bool {
        self.store.read().entries.contains_key(key)
    }

    /// Number of keys indexed under `tag`.
    pub fn tagged(&self, tag: &str) -> usize {
        self.store.read().tags.get(tag).map_or(0, HashSet::len)
    }
}

#[async_trait]
impl FragmentCacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.store.read().entries.get(key).cloned())
    }

    async fn set(&self, key: &str, payload: String, tags: &[String]) -> CacheResult<()> {
        let mut store = self.store.write();
        store.unindex(key);
        store.entries.insert(key.to_string(), payload);
        for tag in tags {
            store.tags.entry(tag.clone()).or_default().insert(key.to_string());
        }
        if !tags.is_empty() {
            store.key_tags.insert(key.to_string(), tags.iter().cloned().collect());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.store.write().remove(key);
        Ok(())
    }

    async fn invalidate_tag(&self, tag: &str) -> CacheResult<u64> {
        let mut store = self.store.write();
        let Some(keys) = store.tags.remove(tag) else {
            return Ok(0);
        };

        let mut removed = 0;
        for key in keys {
            if store.remove(&key) {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let backend = InMemoryBackend::new();
        assert!(backend.get("a").await.unwrap().is_none());

        backend.set("a", "payload".to_string(), &[]).await.unwrap();
        assert_eq!(backend.get("a").await.unwrap().as_deref(), Some("payload"));
        assert_eq!(backend.len(), 1);

        backend.delete("a").await.unwrap();
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_tag_removes_tagged_entries() {
        let backend = InMemoryBackend::new();
        let products = vec!["products".to_string()];

        backend.set("a", "1".to_string(), &products).await.unwrap();
        backend.set("b", "2".to_string(), &products).await.unwrap();
        backend.set("c", "3".to_string(), &["nav".to_string()]).await.unwrap();

        assert_eq!(backend.invalidate_tag("products").await.unwrap(), 2);
        assert!(!backend.contains("a"));
        assert!(!backend.contains("b"));
        assert!(backend.contains("c"));

        assert_eq!(backend.invalidate_tag("products").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_skips_already_deleted() {
        let backend = InMemoryBackend::new();
        backend.set("a", "1".to_string(), &["t".to_string()]).await.unwrap();
        backend.delete("a").await.unwrap();

        assert_eq!(backend.invalidate_tag("t").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_retagged_entry_survives_old_tag() {
        let backend = InMemoryBackend::new();
        backend.set("k", "1".to_string(), &["old".to_string()]).await.unwrap();
        backend.set("k", "2".to_string(), &["new".to_string()]).await.unwrap();

        assert_eq!(backend.invalidate_tag("old").await.unwrap(), 0);
        assert!(backend.contains("k"));
        assert_eq!(backend.tagged("old"), 0);

        assert_eq!(backend.invalidate_tag("new").await.unwrap(), 1);
        assert!(!backend.contains("k"));
    }

    #[tokio::test]
    async fn test_removal_prunes_tag_index() {
        let backend = InMemoryBackend::new();
        let tags = vec!["cart".to_string(), "user".to_string()];
        for i in 0..100 {
            backend.set(&format!("cart;user={i}"), "x".to_string(), &tags).await.unwrap();
        }
        assert_eq!(backend.tagged("cart"), 100);

        for i in 0..100 {
            backend.delete(&format!("cart;user={i}")).await.unwrap();
        }
        assert!(backend.is_empty());
        assert_eq!(backend.tagged("cart"), 0);
        assert_eq!(backend.tagged("user"), 0);

        backend.set("a", "1".to_string(), &tags).await.unwrap();
        assert_eq!(backend.invalidate_tag("cart").await.unwrap(), 1);
        assert_eq!(backend.tagged("user"), 0);
    }
}
