//! Persistence-facing serializer: type discriminators, no nulls.

use std::sync::Arc;

use edge_core::BufferPool;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SerializerError, SerializerResult};
use crate::serializer::encode;

/// Property holding the type discriminator.
pub const TYPE_PROPERTY: &str = "$type";

/// Property holding a non-object payload.
pub const VALUES_PROPERTY: &str = "$values";

/// A type stored as a document.
///
/// The discriminator is written with every document and checked on read,
/// so it must stay stable once documents exist. Polymorphic payloads are
/// modelled as tagged enums and share one discriminator.
pub trait DocumentType {
    /// Stable discriminator written as `$type`.
    const TYPE_NAME: &'static str;
}

/// Pooling serializer for stored documents.
///
/// Differs from [`PoolingJsonSerializer`](crate::PoolingJsonSerializer) in
/// that documents carry a `$type` discriminator, null-valued properties are
/// omitted, and trailing content after the document is ignored on read.
#[derive(Debug, Clone)]
pub struct PoolingContentSerializer {
    pool: Arc<BufferPool>,
}

impl PoolingContentSerializer {
    /// Create a serializer over a shared buffer pool.
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self { pool }
    }

    /// The pool buffers are borrowed from.
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Serialize a document.
    pub fn serialize<T: Serialize + DocumentType>(&self, item: &T) -> SerializerResult<String> {
        let mut value = serde_json::to_value(item)?;
        strip_nulls(&mut value);

        let mut document = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert(VALUES_PROPERTY.to_string(), other);
                map
            }
        };
        document.insert(TYPE_PROPERTY.to_string(), Value::String(T::TYPE_NAME.to_string()));

        encode(&self.pool, &document)
    }

    /// Deserialize a document, checking its discriminator.
    pub fn deserialize<T: DeserializeOwned + DocumentType>(&self, content: &str) -> SerializerResult<T> {
        let Value::Object(mut document) = self.deserialize_dynamic(content)? else {
            return Err(SerializerError::MissingDiscriminator);
        };

        match document.remove(TYPE_PROPERTY) {
            Some(Value::String(found)) if found == T::TYPE_NAME => {}
            Some(Value::String(found)) => {
                return Err(SerializerError::TypeMismatch {
                    expected: T::TYPE_NAME.to_string(),
                    found,
                })
            }
            _ => return Err(SerializerError::MissingDiscriminator),
        }

        let payload = match document.remove(VALUES_PROPERTY) {
            Some(values) if document.is_empty() => values,
            Some(values) => {
                document.insert(VALUES_PROPERTY.to_string(), values);
                Value::Object(document)
            }
            None => Value::Object(document),
        };

        Ok(serde_json::from_value(payload)?)
    }

    /// Read a document without binding it to a type.
    pub fn deserialize_dynamic(&self, content: &str) -> SerializerResult<Value> {
        let mut buf = self.pool.acquire();
        buf.extend_from_slice(content.as_bytes());

        // Reads the first value only; trailing content is not checked.
        let mut de = serde_json::Deserializer::from_slice(&buf);
        Ok(Value::deserialize(&mut de)?)
    }
}

/// Remove null-valued properties, recursively.
fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use edge_core::buffer_pool;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ContentItem {
        content_item_id: String,
        display_text: Option<String>,
        published: bool,
        modified_utc: Option<DateTime<Utc>>,
        parts: Vec<Part>,
    }

    impl DocumentType for ContentItem {
        const TYPE_NAME: &'static str = "ContentItem";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind")]
    enum Part {
        Title { title: String },
        Body { html: String, summary: Option<String> },
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Tags(Vec<String>);

    impl DocumentType for Tags {
        const TYPE_NAME: &'static str = "Tags";
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Other {
        content_item_id: String,
    }

    impl DocumentType for Other {
        const TYPE_NAME: &'static str = "Other";
    }

    fn serializer() -> PoolingContentSerializer {
        PoolingContentSerializer::new(Arc::new(buffer_pool()))
    }

    fn item() -> ContentItem {
        ContentItem {
            content_item_id: "4x7k".to_string(),
            display_text: None,
            published: true,
            modified_utc: Some(Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap()),
            parts: vec![
                Part::Title {
                    title: "Home".to_string(),
                },
                Part::Body {
                    html: "<p>Hi</p>".to_string(),
                    summary: None,
                },
            ],
        }
    }

    #[test]
    fn test_document_roundtrip() {
        let s = serializer();
        let json = s.serialize(&item()).unwrap();
        let back: ContentItem = s.deserialize(&json).unwrap();
        assert_eq!(back, item());
    }

    #[test]
    fn test_discriminator_written_and_nulls_omitted() {
        let s = serializer();
        let json = s.serialize(&item()).unwrap();

        assert!(json.starts_with(r#"{"$type":"ContentItem""#));
        assert!(!json.contains("display_text"));
        assert!(!json.contains("summary"));
        assert!(!json.contains("null"));
        assert!(json.contains(r#""kind":"Body""#));
        assert!(json.contains(r#""modified_utc":"2024-05-02T08:00:00Z""#));
    }

    #[test]
    fn test_non_object_payload() {
        let s = serializer();
        let tags = Tags(vec!["a".to_string(), "b".to_string()]);

        let json = s.serialize(&tags).unwrap();
        assert_eq!(json, r#"{"$type":"Tags","$values":["a","b"]}"#);

        let back: Tags = s.deserialize(&json).unwrap();
        assert_eq!(back, tags);
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let s = serializer();
        let json = s.serialize(&item()).unwrap();

        let err = s.deserialize::<Other>(&json).unwrap_err();
        assert!(matches!(
            err,
            SerializerError::TypeMismatch { ref expected, ref found }
                if expected == "Other" && found == "ContentItem"
        ));
    }

    #[test]
    fn test_missing_discriminator_rejected() {
        let s = serializer();
        let err = s.deserialize::<Other>(r#"{"content_item_id":"1"}"#).unwrap_err();
        assert!(matches!(err, SerializerError::MissingDiscriminator));
    }

    #[test]
    fn test_trailing_content_ignored() {
        let s = serializer();
        let value = s
            .deserialize_dynamic(r#"{"$type":"Other","content_item_id":"9"} trailing"#)
            .unwrap();
        assert_eq!(value["content_item_id"], "9");
        assert_eq!(value[TYPE_PROPERTY], "Other");
    }

    #[test]
    fn test_buffers_returned_on_failure() {
        let s = serializer();

        assert!(s.deserialize_dynamic("{ not json").is_err());
        assert!(s.deserialize::<Other>("[1, 2").is_err());

        assert_eq!(s.pool().borrowed(), 0);
        assert!(s.pool().available() >= 1);
    }
}
