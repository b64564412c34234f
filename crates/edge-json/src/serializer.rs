//! Pooled-buffer JSON serializer with default settings.

use std::sync::Arc;

use edge_core::{buffer_pool, BufferPool};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::SerializerResult;

/// JSON serializer that borrows its scratch buffers from a shared pool.
///
/// Used for cache values, which are always read back as the shape they
/// were written with, so no type discriminators are emitted. Output is
/// locale independent: numbers use `serde_json`'s fixed formatting and
/// timestamps serialize as RFC 3339.
#[derive(Debug, Clone)]
pub struct PoolingJsonSerializer {
    pool: Arc<BufferPool>,
}

impl PoolingJsonSerializer {
    /// Create a serializer over a shared buffer pool.
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self { pool }
    }

    /// Create a serializer with its own default-sized pool.
    pub fn with_default_pool() -> Self {
        Self::new(Arc::new(buffer_pool()))
    }

    /// The pool buffers are borrowed from.
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Serialize `item` to a JSON string.
    pub fn serialize<T: Serialize + ?Sized>(&self, item: &T) -> SerializerResult<String> {
        encode(&self.pool, item)
    }

    /// Deserialize a JSON string.
    pub fn deserialize<T: DeserializeOwned>(&self, content: &str) -> SerializerResult<T> {
        let mut buf = self.pool.acquire();
        buf.extend_from_slice(content.as_bytes());
        Ok(serde_json::from_slice(&buf)?)
    }
}

/// Write `item` into a pooled buffer and copy the text out.
///
/// The buffer goes back to the pool when this returns, on success or error.
pub(crate) fn encode<T: Serialize + ?Sized>(pool: &BufferPool, item: &T) -> SerializerResult<String> {
    let mut buf = pool.acquire();
    serde_json::to_writer(&mut *buf, item)?;
    Ok(std::str::from_utf8(&buf)?.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        id: String,
        price: f64,
        count: u32,
        note: Option<String>,
        created_at: DateTime<Utc>,
    }

    fn sample() -> Entry {
        Entry {
            id: "sku-1".to_string(),
            price: 1234.5,
            count: 3,
            note: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_roundtrip() {
        let serializer = PoolingJsonSerializer::with_default_pool();
        let json = serializer.serialize(&sample()).unwrap();
        let back: Entry = serializer.deserialize(&json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_invariant_formatting() {
        let serializer = PoolingJsonSerializer::with_default_pool();
        let json = serializer.serialize(&sample()).unwrap();

        assert!(json.contains(r#""price":1234.5"#));
        assert!(json.contains(r#""created_at":"2024-03-01T12:30:00Z""#));
        // Default settings keep null fields.
        assert!(json.contains(r#""note":null"#));
    }

    #[test]
    fn test_buffers_returned_after_success() {
        let serializer = PoolingJsonSerializer::with_default_pool();

        for _ in 0..5 {
            let json = serializer.serialize(&sample()).unwrap();
            let _: Entry = serializer.deserialize(&json).unwrap();
        }

        assert_eq!(serializer.pool().borrowed(), 0);
        assert_eq!(serializer.pool().created(), 1);
    }

    #[test]
    fn test_buffers_returned_after_malformed_input() {
        let serializer = PoolingJsonSerializer::with_default_pool();

        let result: SerializerResult<Entry> = serializer.deserialize(r#"{"id": "sku-1", "price": }"#);
        assert!(result.is_err());
        assert_eq!(serializer.pool().borrowed(), 0);
        assert_eq!(serializer.pool().available(), 1);
    }

    #[test]
    fn test_buffers_returned_after_encode_failure() {
        use std::collections::HashMap;

        let serializer = PoolingJsonSerializer::with_default_pool();
        // JSON object keys must be strings.
        let mut map = HashMap::new();
        map.insert(vec![1u8], "value");

        assert!(serializer.serialize(&map).is_err());
        assert_eq!(serializer.pool().borrowed(), 0);
    }

    #[test]
    fn test_shared_pool_across_serializers() {
        let pool = Arc::new(buffer_pool());
        let a = PoolingJsonSerializer::new(pool.clone());
        let b = a.clone();

        a.serialize(&1u32).unwrap();
        b.serialize(&2u32).unwrap();

        assert_eq!(pool.created(), 1);
    }
}
