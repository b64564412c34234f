//! Fragment renderer driving the display hooks.
//!
//! [`FragmentRenderer`] plays the rendering engine's part: for each
//! fragment it runs `displaying`, renders the body unless content was
//! supplied, runs `displayed`, applies wrappers and finally `finalized`.
//! Bodies render nested fragments through the [`RenderScope`] they are
//! handed, so hooks for a child run entirely inside the parent's body.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use edge_core::{DisplayContext, FragmentMetadata, HtmlContent, HtmlEncoder, ViewBuffer};
use tracing::{debug, error};

use crate::display::{DisplayEvents, CACHED_FRAGMENT_WRAPPER};
use crate::error::DisplayError;
use crate::session::RenderSession;

/// Produces a fragment's content.
#[async_trait]
pub trait FragmentBody: Send + Sync {
    /// Render the content, using `scope` for nested fragments.
    async fn render(&self, scope: &mut RenderScope<'_>) -> Result<HtmlContent, DisplayError>;
}

/// A renderable fragment: metadata plus the body that produces it.
#[derive(Clone)]
pub struct Fragment {
    pub metadata: FragmentMetadata,
    body: Arc<dyn FragmentBody>,
}

impl Fragment {
    pub fn new(metadata: FragmentMetadata, body: impl FragmentBody + 'static) -> Self {
        Self {
            metadata,
            body: Arc::new(body),
        }
    }

    /// Fragment whose body is static markup.
    pub fn markup(metadata: FragmentMetadata, markup: Markup) -> Self {
        Self::new(metadata, markup)
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment").field("metadata", &self.metadata).finish_non_exhaustive()
    }
}

/// A piece of [`Markup`].
#[derive(Debug, Clone)]
pub enum Node {
    Html(String),
    Text(String),
    Fragment(Fragment),
}

/// Body built from markup, text and nested fragments.
#[derive(Debug, Clone, Default)]
pub struct Markup {
    nodes: Vec<Node>,
}

impl Markup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append pre-encoded markup.
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.nodes.push(Node::Html(html.into()));
        self
    }

    /// Append raw text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.nodes.push(Node::Text(text.into()));
        self
    }

    /// Append a nested fragment.
    pub fn fragment(mut self, fragment: Fragment) -> Self {
        self.nodes.push(Node::Fragment(fragment));
        self
    }
}

#[async_trait]
impl FragmentBody for Markup {
    async fn render(&self, scope: &mut RenderScope<'_>) -> Result<HtmlContent, DisplayError> {
        let mut buffer = ViewBuffer::new();
        for node in &self.nodes {
            match node {
                Node::Html(html) => {
                    buffer.push_html(html.as_str());
                }
                Node::Text(text) => {
                    buffer.push_text(text.as_str());
                }
                Node::Fragment(fragment) => {
                    let html = scope.render(fragment).await?;
                    buffer.push_html(html);
                }
            }
        }
        Ok(buffer.into())
    }
}

/// What a fragment body sees while it renders.
pub struct RenderScope<'a> {
    events: &'a dyn DisplayEvents,
    session: &'a mut RenderSession,
    encoder: HtmlEncoder,
}

impl<'a> RenderScope<'a> {
    pub fn new(events: &'a dyn DisplayEvents, session: &'a mut RenderSession) -> Self {
        Self {
            events,
            session,
            encoder: HtmlEncoder::new(),
        }
    }

    /// The render pass.
    pub fn session(&self) -> &RenderSession {
        &*self.session
    }

    /// The render pass, for declaring dependencies on the open scope.
    pub fn session_mut(&mut self) -> &mut RenderSession {
        &mut *self.session
    }

    pub fn encoder(&self) -> &HtmlEncoder {
        &self.encoder
    }

    /// Render `fragment` through the display hooks, returning its markup.
    pub async fn render(&mut self, fragment: &Fragment) -> Result<String, DisplayError> {
        let ctx = DisplayContext::new(fragment.metadata.clone());
        let mut guard = FinalizeGuard::new(self, ctx);

        guard.displaying().await?;

        if guard.ctx.child_content.is_none() {
            guard.scope.session.record_body_rendered();
            let content = fragment.body.render(&mut *guard.scope).await?;
            guard.ctx.child_content = Some(content);
        }

        guard.displayed().await?;
        let html = guard.write_output()?;
        guard.finish()?;
        Ok(html)
    }
}

/// Runs `finalized` for a fragment on every exit path.
///
/// Normal completion calls [`FinalizeGuard::finish`] so failures propagate.
/// When the render errors out or its future is dropped, the guard
/// finalizes on drop and can only log.
struct FinalizeGuard<'s, 'a> {
    scope: &'s mut RenderScope<'a>,
    ctx: DisplayContext,
    armed: bool,
}

impl<'s, 'a> FinalizeGuard<'s, 'a> {
    fn new(scope: &'s mut RenderScope<'a>, ctx: DisplayContext) -> Self {
        Self {
            scope,
            ctx,
            armed: true,
        }
    }

    async fn displaying(&mut self) -> Result<(), DisplayError> {
        let scope = &mut *self.scope;
        scope.events.displaying(scope.session, &mut self.ctx).await
    }

    async fn displayed(&mut self) -> Result<(), DisplayError> {
        let scope = &mut *self.scope;
        scope.events.displayed(scope.session, &mut self.ctx).await
    }

    /// Write the content out and apply wrappers, innermost first.
    fn write_output(&mut self) -> Result<String, DisplayError> {
        let encoder = self.scope.encoder;
        let mut html = String::new();
        if let Some(content) = self.ctx.child_content.as_mut() {
            content.write_to(&mut html, &encoder)?;
        }

        for wrapper in &self.ctx.metadata.wrappers {
            if wrapper == CACHED_FRAGMENT_WRAPPER {
                let cache_id = self.ctx.metadata.cache_id().unwrap_or_default();
                html = format!(
                    r#"<div class="cached-fragment" data-cache-id="{}">{}</div>"#,
                    encoder.encode(cache_id),
                    html
                );
            } else {
                debug!(
                    wrapper = %wrapper,
                    fragment_type = %self.ctx.metadata.fragment_type,
                    "no renderer for wrapper, skipping"
                );
            }
        }
        Ok(html)
    }

    fn finish(mut self) -> Result<(), DisplayError> {
        self.armed = false;
        let scope = &mut *self.scope;
        scope.events.finalized(scope.session, &mut self.ctx)
    }
}

impl Drop for FinalizeGuard<'_, '_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let scope = &mut *self.scope;
        if let Err(err) = scope.events.finalized(scope.session, &mut self.ctx) {
            error!(
                request_id = %scope.session.request_id(),
                cache_id = ?self.ctx.metadata.cache_id(),
                error = %err,
                "failed to finalize fragment after an aborted render"
            );
        }
    }
}

/// Renders fragment trees through a set of display hooks.
pub struct FragmentRenderer<E> {
    events: E,
}

impl<E: DisplayEvents> FragmentRenderer<E> {
    pub fn new(events: E) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    /// Render `fragment` and everything nested in it as part of `session`.
    pub async fn render(&self, session: &mut RenderSession, fragment: &Fragment) -> Result<String, DisplayError> {
        RenderScope::new(&self.events, session).render(fragment).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::CacheContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hooks that only record the order they were called in.
    #[derive(Default)]
    struct TraceEvents {
        calls: parking_lot::Mutex<Vec<String>>,
    }

    impl TraceEvents {
        fn push(&self, hook: &str, ctx: &DisplayContext) {
            self.calls.lock().push(format!("{hook}:{}", ctx.metadata.fragment_type));
        }
    }

    #[async_trait]
    impl DisplayEvents for TraceEvents {
        async fn displaying(&self, _: &mut RenderSession, ctx: &mut DisplayContext) -> Result<(), DisplayError> {
            self.push("displaying", ctx);
            Ok(())
        }

        async fn displayed(&self, _: &mut RenderSession, ctx: &mut DisplayContext) -> Result<(), DisplayError> {
            self.push("displayed", ctx);
            Ok(())
        }

        fn finalized(&self, _: &mut RenderSession, ctx: &mut DisplayContext) -> Result<(), DisplayError> {
            self.push("finalized", ctx);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl FragmentBody for Failing {
        async fn render(&self, _: &mut RenderScope<'_>) -> Result<HtmlContent, DisplayError> {
            Err(DisplayError::Render("Broken".to_string(), "template missing".to_string()))
        }
    }

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl FragmentBody for Counting {
        async fn render(&self, _: &mut RenderScope<'_>) -> Result<HtmlContent, DisplayError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(HtmlContent::text("<counted>"))
        }
    }

    #[tokio::test]
    async fn test_hooks_nest_with_rendering() {
        let renderer = FragmentRenderer::new(TraceEvents::default());
        let mut session = RenderSession::new();
        let page = Fragment::markup(
            FragmentMetadata::new("Page"),
            Markup::new()
                .html("<main>")
                .fragment(Fragment::markup(FragmentMetadata::new("Menu"), Markup::new().text("a & b")))
                .html("</main>"),
        );

        let html = renderer.render(&mut session, &page).await.unwrap();

        assert_eq!(html, "<main>a &amp; b</main>");
        assert_eq!(
            *renderer.events().calls.lock(),
            vec![
                "displaying:Page",
                "displaying:Menu",
                "displayed:Menu",
                "finalized:Menu",
                "displayed:Page",
                "finalized:Page",
            ]
        );
        assert_eq!(session.stats().bodies_rendered, 2);
    }

    #[tokio::test]
    async fn test_body_failure_still_finalizes() {
        let renderer = FragmentRenderer::new(TraceEvents::default());
        let mut session = RenderSession::new();
        let fragment = Fragment::new(FragmentMetadata::new("Broken"), Failing);

        let err = renderer.render(&mut session, &fragment).await.unwrap_err();

        assert!(matches!(err, DisplayError::Render(..)));
        assert_eq!(
            *renderer.events().calls.lock(),
            vec!["displaying:Broken", "finalized:Broken"]
        );
    }

    #[tokio::test]
    async fn test_supplied_content_skips_body() {
        /// Hooks that answer every fragment with fixed content.
        struct Prefilled;

        #[async_trait]
        impl DisplayEvents for Prefilled {
            async fn displaying(&self, _: &mut RenderSession, ctx: &mut DisplayContext) -> Result<(), DisplayError> {
                ctx.child_content = Some(HtmlContent::html("<b>prefilled</b>"));
                Ok(())
            }

            async fn displayed(&self, _: &mut RenderSession, _: &mut DisplayContext) -> Result<(), DisplayError> {
                Ok(())
            }

            fn finalized(&self, _: &mut RenderSession, _: &mut DisplayContext) -> Result<(), DisplayError> {
                Ok(())
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let renderer = FragmentRenderer::new(Prefilled);
        let mut session = RenderSession::new();
        let fragment = Fragment::new(FragmentMetadata::new("Widget"), Counting(calls.clone()));

        let html = renderer.render(&mut session, &fragment).await.unwrap();

        assert_eq!(html, "<b>prefilled</b>");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.stats().bodies_rendered, 0);
    }

    #[tokio::test]
    async fn test_cached_fragment_wrapper_markup() {
        let renderer = FragmentRenderer::new(TraceEvents::default());
        let mut session = RenderSession::new();
        let metadata = FragmentMetadata::new("Banner")
            .with_cache(CacheContext::new("a\"b"))
            .with_wrapper(CACHED_FRAGMENT_WRAPPER)
            .with_wrapper("Border");
        let fragment = Fragment::markup(metadata, Markup::new().html("<p>hi</p>"));

        let html = renderer.render(&mut session, &fragment).await.unwrap();

        assert_eq!(
            html,
            r#"<div class="cached-fragment" data-cache-id="a&quot;b"><p>hi</p></div>"#
        );
    }
}
