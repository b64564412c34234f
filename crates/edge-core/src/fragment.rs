//! Fragment metadata and the per-render display context.

use crate::cache_context::CacheContext;
use crate::content::HtmlContent;

/// Metadata the rendering engine attaches to every renderable fragment.
#[derive(Debug, Clone, Default)]
pub struct FragmentMetadata {
    /// Fragment type name (e.g. `"Menu"`, `"Banner"`).
    pub fragment_type: String,
    /// Cache parameters; `None` means the fragment is never cached.
    pub cache: Option<CacheContext>,
    /// Wrapper templates applied around the rendered output.
    pub wrappers: Vec<String>,
}

impl FragmentMetadata {
    /// Metadata for a non-cached fragment.
    pub fn new(fragment_type: impl Into<String>) -> Self {
        Self {
            fragment_type: fragment_type.into(),
            cache: None,
            wrappers: Vec::new(),
        }
    }

    /// Make the fragment cacheable.
    pub fn with_cache(mut self, cache: CacheContext) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Add a wrapper template.
    pub fn with_wrapper(mut self, wrapper: impl Into<String>) -> Self {
        self.wrappers.push(wrapper.into());
        self
    }

    /// Whether the fragment carries cache parameters.
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// The cache parameters, if any.
    pub fn cache(&self) -> Option<&CacheContext> {
        self.cache.as_ref()
    }

    /// The cache id, if the fragment is cacheable.
    pub fn cache_id(&self) -> Option<&str> {
        self.cache.as_ref().map(|c| c.cache_id.as_str())
    }
}

/// State handed to display hooks for one render of one fragment.
#[derive(Debug)]
pub struct DisplayContext {
    /// Metadata of the fragment being rendered.
    pub metadata: FragmentMetadata,
    /// Already-rendered content. When set before the body renders, the
    /// engine uses it instead of rendering the body.
    pub child_content: Option<HtmlContent>,
    /// Set once a cache scope was opened for this fragment instance. Only
    /// that instance may close it.
    pub scope_opened: bool,
}

impl DisplayContext {
    /// Create a display context with no content yet.
    pub fn new(metadata: FragmentMetadata) -> Self {
        Self {
            metadata,
            child_content: None,
            scope_opened: false,
        }
    }

    /// Create a display context whose content is supplied up front.
    pub fn with_content(metadata: FragmentMetadata, content: HtmlContent) -> Self {
        Self {
            metadata,
            child_content: Some(content),
            scope_opened: false,
        }
    }
}
