//! Pooled-buffer JSON serialization.
//!
//! This crate provides:
//! - `PoolingJsonSerializer` - Default settings, used for cache values
//! - `PoolingContentSerializer` - Type discriminators and null omission, used for stored documents
//!
//! Both borrow scratch buffers from a shared [`edge_core::BufferPool`] for the
//! duration of one call and return them on every exit path.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use edge_json::PoolingJsonSerializer;
//!
//! let serializer = PoolingJsonSerializer::new(Arc::new(edge_core::buffer_pool()));
//! let json = serializer.serialize(&vec![1, 2, 3])?;
//! let back: Vec<i32> = serializer.deserialize(&json)?;
//! ```

mod document;
mod error;
mod serializer;

pub use document::*;
pub use error::*;
pub use serializer::*;
