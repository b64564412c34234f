//! Fragment cache options.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use edge_core::{BufferPool, ObjectPool, StringPool, DEFAULT_BUFFER_CAPACITY};
use edge_json::PoolingJsonSerializer;
use serde::{Deserialize, Serialize};

/// Options for the fragment cache.
///
/// ```toml
/// debug_mode = true
/// default_expiration_secs = 300
/// pool_max_buffers = 32
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Wrap fragments that missed the cache in a visible marker.
    pub debug_mode: bool,

    /// Expiration for fragments that configure none. `None` keeps them
    /// until invalidated.
    pub default_expiration_secs: Option<u64>,

    /// Idle buffers kept per pool.
    pub pool_max_buffers: usize,

    /// Buffers grown past this many bytes are not returned to a pool.
    pub pool_max_buffer_capacity: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            debug_mode: false,
            default_expiration_secs: None,
            pool_max_buffers: edge_core::DEFAULT_POOL_SIZE,
            pool_max_buffer_capacity: edge_core::DEFAULT_MAX_BUFFER_CAPACITY,
        }
    }
}

impl CacheOptions {
    /// Load options from a TOML file, or JSON when the path ends in `.json`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cache options: {}", path.display()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON cache options: {}", path.display()))
        } else {
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse TOML cache options: {}", path.display()))
        }
    }

    /// Parse options from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Default expiration as a duration.
    pub fn default_expiration(&self) -> Option<Duration> {
        self.default_expiration_secs.map(Duration::from_secs)
    }

    /// String builder pool sized by these options.
    pub fn string_pool(&self) -> StringPool {
        ObjectPool::new(|| String::with_capacity(DEFAULT_BUFFER_CAPACITY), self.pool_max_buffers)
            .with_max_capacity(self.pool_max_buffer_capacity)
    }

    /// Byte buffer pool sized by these options.
    pub fn buffer_pool(&self) -> BufferPool {
        ObjectPool::new(|| Vec::with_capacity(DEFAULT_BUFFER_CAPACITY), self.pool_max_buffers)
            .with_max_capacity(self.pool_max_buffer_capacity)
    }

    /// Entry serializer drawing its buffers from [`Self::buffer_pool`].
    pub fn serializer(&self) -> PoolingJsonSerializer {
        PoolingJsonSerializer::new(Arc::new(self.buffer_pool()))
    }
}
