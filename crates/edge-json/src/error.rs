//! Serializer error types.

use thiserror::Error;

/// Errors produced by the pooling serializers.
#[derive(Error, Debug)]
pub enum SerializerError {
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Encoded output was not valid UTF-8.
    #[error("encoded output is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A stored document carries a different type discriminator.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A stored document has no type discriminator.
    #[error("document has no type discriminator")]
    MissingDiscriminator,
}

/// Result type for serializer operations.
pub type SerializerResult<T> = Result<T, SerializerError>;
