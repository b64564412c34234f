//! Core rendering abstractions for the edge fragment cache.
//!
//! This crate provides the types the rendering engine shares with the cache:
//! - `CacheContext` - Cache parameters of a cacheable fragment
//! - `FragmentMetadata` / `DisplayContext` - Fragment descriptor and hook state
//! - `HtmlContent` / `HtmlEncoder` - Rendered output and encoding
//! - `ObjectPool` - Scoped buffer pooling
//! - `Clock` - Time source for expiration
//! - `ContextValues` - Per-request values cache keys vary by

mod cache_context;
mod clock;
mod content;
mod context;
mod fragment;
mod pool;

pub use cache_context::*;
pub use clock::*;
pub use content::*;
pub use context::*;
pub use fragment::*;
pub use pool::*;
