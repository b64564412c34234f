//! Error types for cache lookups, scopes and display hooks.

use edge_core::ContentError;
use edge_json::SerializerError;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to serialize/deserialize a cache entry.
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializerError),

    /// Backend storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Violations of the scope stack discipline.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScopeError {
    /// A scope was exited while none was open.
    #[error("no cache scope is open")]
    NoOpenScope,

    /// A fragment tried to close a scope that is not the innermost one.
    #[error("scope '{expected}' closed while '{found}' is innermost")]
    OutOfOrder { expected: String, found: String },

    /// The render pass ended with scopes still open.
    #[error("render pass ended with open scopes: {0:?}")]
    Unclosed(Vec<String>),
}

/// Errors surfaced by display hooks and the fragment renderer.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Content(#[from] ContentError),

    /// A fragment body failed to render.
    #[error("fragment '{0}' failed: {1}")]
    Render(String, String),
}
