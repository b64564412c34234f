//! Rendered HTML content and encoding.

/// Errors produced while writing content.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// A single-use buffer was written out a second time.
    #[error("view buffer has already been written out")]
    AlreadyConsumed,
}

/// HTML encoder applied to raw text when content is written out.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlEncoder;

impl HtmlEncoder {
    /// Create the default encoder.
    pub fn new() -> Self {
        Self
    }

    /// Append `text` to `out`, escaping markup-significant characters.
    pub fn encode_into(&self, text: &str, out: &mut String) {
        let mut last = 0;
        for (i, ch) in text.char_indices() {
            let escaped = match ch {
                '&' => "&amp;",
                '<' => "&lt;",
                '>' => "&gt;",
                '"' => "&quot;",
                '\'' => "&#39;",
                _ => continue,
            };
            out.push_str(&text[last..i]);
            out.push_str(escaped);
            last = i + ch.len_utf8();
        }
        out.push_str(&text[last..]);
    }

    /// Encode `text` into a new string.
    pub fn encode(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        self.encode_into(text, &mut out);
        out
    }
}

/// Content produced for a fragment.
#[derive(Debug)]
pub enum HtmlContent {
    /// Already-encoded markup, written verbatim.
    Html(String),
    /// Raw text, encoded on write.
    Text(String),
    /// Incrementally built view output that can be written out once.
    Buffer(ViewBuffer),
}

impl HtmlContent {
    /// Empty markup.
    pub fn empty() -> Self {
        Self::Html(String::new())
    }

    /// Pre-encoded markup.
    pub fn html(value: impl Into<String>) -> Self {
        Self::Html(value.into())
    }

    /// Raw text.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Write the content to `out`, encoding raw text with `encoder`.
    ///
    /// `Html` and `Text` can be written any number of times. A `Buffer`
    /// hands over its pieces on the first write and fails afterwards.
    pub fn write_to(&mut self, out: &mut String, encoder: &HtmlEncoder) -> Result<(), ContentError> {
        match self {
            Self::Html(html) => {
                out.push_str(html);
                Ok(())
            }
            Self::Text(text) => {
                encoder.encode_into(text, out);
                Ok(())
            }
            Self::Buffer(buffer) => buffer.write_to(out, encoder),
        }
    }

    /// The markup, when this content is already encoded.
    pub fn as_html(&self) -> Option<&str> {
        match self {
            Self::Html(html) => Some(html),
            _ => None,
        }
    }
}

impl From<ViewBuffer> for HtmlContent {
    fn from(buffer: ViewBuffer) -> Self {
        Self::Buffer(buffer)
    }
}

/// Output buffered by a view while it renders.
#[derive(Debug)]
pub struct ViewBuffer {
    pieces: Option<Vec<HtmlContent>>,
}

impl Default for ViewBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            pieces: Some(Vec::new()),
        }
    }

    /// Append pre-encoded markup.
    pub fn push_html(&mut self, html: impl Into<String>) -> &mut Self {
        self.push(HtmlContent::Html(html.into()))
    }

    /// Append raw text.
    pub fn push_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(HtmlContent::Text(text.into()))
    }

    /// Append nested content.
    pub fn push(&mut self, content: HtmlContent) -> &mut Self {
        if let Some(pieces) = self.pieces.as_mut() {
            pieces.push(content);
        }
        self
    }

    /// Whether the buffer has already been written out.
    pub fn is_consumed(&self) -> bool {
        self.pieces.is_none()
    }

    fn write_to(&mut self, out: &mut String, encoder: &HtmlEncoder) -> Result<(), ContentError> {
        let pieces = self.pieces.take().ok_or(ContentError::AlreadyConsumed)?;
        for mut piece in pieces {
            piece.write_to(out, encoder)?;
        }
        Ok(())
    }
}
