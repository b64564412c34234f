//! Display hooks that serve and populate the fragment cache.

use std::sync::Arc;

use async_trait::async_trait;
use edge_core::{DisplayContext, HtmlContent, HtmlEncoder, StringPool};
use tracing::debug;

use crate::config::CacheOptions;
use crate::error::DisplayError;
use crate::service::DynamicCacheService;
use crate::session::RenderSession;

/// Wrapper added to fragments that missed the cache while debug mode is on.
pub const CACHED_FRAGMENT_WRAPPER: &str = "CachedFragmentWrapper";

/// Hooks the rendering engine calls around every fragment render.
///
/// For each fragment the engine calls `displaying` before rendering the
/// body, `displayed` once the body (and every nested fragment) has
/// rendered, and `finalized` after wrappers are applied. `finalized` must
/// run on every exit path, including errors.
#[async_trait]
pub trait DisplayEvents: Send + Sync {
    /// Before the body renders. May supply `child_content` to skip the body.
    async fn displaying(&self, session: &mut RenderSession, ctx: &mut DisplayContext) -> Result<(), DisplayError>;

    /// After the body has rendered.
    async fn displayed(&self, session: &mut RenderSession, ctx: &mut DisplayContext) -> Result<(), DisplayError>;

    /// After the fragment and its whole subtree are done.
    fn finalized(&self, session: &mut RenderSession, ctx: &mut DisplayContext) -> Result<(), DisplayError>;
}

/// Serves cacheable fragments from a [`DynamicCacheService`] and stores
/// freshly rendered ones.
pub struct DynamicCacheDisplayEvents<S: ?Sized> {
    cache: Arc<S>,
    encoder: HtmlEncoder,
    options: CacheOptions,
    strings: StringPool,
}

impl<S: DynamicCacheService + ?Sized> DynamicCacheDisplayEvents<S> {
    /// Create the hooks over a cache service.
    pub fn new(cache: Arc<S>, options: CacheOptions) -> Self {
        let strings = options.string_pool();
        Self {
            cache,
            encoder: HtmlEncoder::new(),
            options,
            strings,
        }
    }

    /// Options in effect.
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Write `content` once through the encoder into a pooled builder.
    fn materialize(&self, content: &mut HtmlContent) -> Result<String, DisplayError> {
        let mut buf = self.strings.acquire();
        content.write_to(&mut buf, &self.encoder)?;
        Ok(buf.as_str().to_owned())
    }
}

#[async_trait]
impl<S: DynamicCacheService + ?Sized> DisplayEvents for DynamicCacheDisplayEvents<S> {
    async fn displaying(&self, session: &mut RenderSession, ctx: &mut DisplayContext) -> Result<(), DisplayError> {
        let Some(declared) = ctx.metadata.cache.as_ref() else {
            return Ok(());
        };
        if ctx.child_content.is_some() {
            session.record_bypass(&declared.cache_id);
            return Ok(());
        }
        // Includes dependencies nested fragments added on earlier renders,
        // so they still reach enclosing scopes when this fragment hits.
        let lookup = self.cache.lookup(declared).await?;
        let cache_id = lookup.context.cache_id.clone();

        session.open_scope(lookup.context);
        ctx.scope_opened = true;

        match lookup.value {
            Some(content) => {
                debug!(
                    request_id = %session.request_id(),
                    cache_id = %cache_id,
                    depth = session.scopes().depth(),
                    "fragment served from cache"
                );
                session.record_hit(&cache_id);
                ctx.child_content = Some(HtmlContent::Html(content));
            }
            None => {
                debug!(
                    request_id = %session.request_id(),
                    cache_id = %cache_id,
                    depth = session.scopes().depth(),
                    "fragment cache miss"
                );
                session.record_miss(&cache_id);
                if self.options.debug_mode {
                    ctx.metadata.wrappers.push(CACHED_FRAGMENT_WRAPPER.to_string());
                }
            }
        }

        Ok(())
    }

    async fn displayed(&self, session: &mut RenderSession, ctx: &mut DisplayContext) -> Result<(), DisplayError> {
        let Some(cache_id) = ctx.metadata.cache_id().map(str::to_owned) else {
            ctx.child_content.get_or_insert_with(HtmlContent::empty);
            return Ok(());
        };

        if session.is_from_cache(&cache_id) {
            return Ok(());
        }
        let Some(content) = ctx.child_content.as_mut() else {
            return Ok(());
        };

        // Single-use content must not be written twice, so the encoded
        // form replaces it before it is stored or rendered.
        let encoded = self.materialize(content)?;
        ctx.child_content = Some(HtmlContent::Html(encoded.clone()));

        // The open scope carries whatever nested fragments merged into it.
        let scope = ctx.scope_opened.then(|| session.scopes().find(&cache_id)).flatten();
        let context = match scope {
            Some(scope) => scope.clone(),
            None => match ctx.metadata.cache.clone() {
                Some(context) => context,
                None => return Ok(()),
            },
        };

        self.cache.set_cached_value(&context, &encoded).await?;
        session.record_store();
        Ok(())
    }

    fn finalized(&self, session: &mut RenderSession, ctx: &mut DisplayContext) -> Result<(), DisplayError> {
        if !ctx.scope_opened {
            return Ok(());
        }
        let Some(cache_id) = ctx.metadata.cache_id().map(str::to_owned) else {
            return Ok(());
        };

        let closed = session.close_scope(&cache_id)?;
        ctx.scope_opened = false;
        if let Some(merged) = closed {
            debug!(
                request_id = %session.request_id(),
                cache_id = %cache_id,
                depth = session.scopes().depth(),
                "cache scope closed"
            );
            ctx.metadata.cache = Some(merged);
        }
        Ok(())
    }
}
