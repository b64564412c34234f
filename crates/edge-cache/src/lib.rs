//! Fragment output cache for the edge rendering pipeline.
//!
//! This crate provides:
//! - `CacheScopeManager` - Stack of cache scopes open during a render
//! - `RenderSession` - Per-render-pass cache state and stats
//! - `DynamicCacheDisplayEvents` - Display hooks serving and storing fragments
//! - `FragmentRenderer` - Drives the hooks around nested fragment bodies
//! - `DynamicCacheService` - Cache lookups by cache context
//! - `FragmentCacheBackend` - Pluggable storage with tag invalidation
//! - `CacheOptions` - Debug mode, default expiration and pool sizing
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use edge_cache::*;
//! use edge_core::{CacheContext, ContextValues, FragmentMetadata};
//!
//! let options = CacheOptions::default();
//! let backend = Arc::new(InMemoryBackend::new());
//! let service = DefaultDynamicCacheService::new(
//!     backend,
//!     options.serializer(),
//!     ContextValues::new().with_culture("en-US"),
//! )
//! .with_default_expiration(options.default_expiration());
//! let renderer = FragmentRenderer::new(DynamicCacheDisplayEvents::new(Arc::new(service), options));
//!
//! let banner = Fragment::markup(
//!     FragmentMetadata::new("Banner").with_cache(
//!         CacheContext::new("home-banner")
//!             .add_context("culture")
//!             .with_expiry_after(Duration::from_secs(60)),
//!     ),
//!     Markup::new().html("<h1>").text("Welcome").html("</h1>"),
//! );
//!
//! let mut session = RenderSession::new();
//! let html = renderer.render(&mut session, &banner).await?;
//! let stats = session.finish()?;
//! ```

mod backend;
mod config;
mod display;
mod error;
mod fragment;
mod key;
mod policy;
mod render;
mod scope;
mod service;
mod session;

pub use backend::*;
pub use config::*;
pub use display::*;
pub use error::*;
pub use fragment::*;
pub use key::*;
pub use policy::*;
pub use render::*;
pub use scope::*;
pub use service::*;
pub use session::*;
