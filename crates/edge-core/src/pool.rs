//! Object pooling for reusable scratch buffers.
//!
//! Objects are borrowed through a guard that resets them and hands them
//! back to the pool when it goes out of scope, whichever way the scope
//! is left.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Objects that can be cleared before they go back into a pool.
pub trait Reusable {
    /// Clear contents, keeping allocated capacity.
    fn reset(&mut self);

    /// Capacity currently held, used to drop oversized objects.
    fn capacity(&self) -> usize;
}

impl Reusable for Vec<u8> {
    fn reset(&mut self) {
        self.clear();
    }

    fn capacity(&self) -> usize {
        Vec::capacity(self)
    }
}

impl Reusable for String {
    fn reset(&mut self) {
        self.clear();
    }

    fn capacity(&self) -> usize {
        String::capacity(self)
    }
}

/// A pool of reusable objects.
pub struct ObjectPool<T> {
    available: Mutex<Vec<T>>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    /// Maximum number of idle objects kept.
    max_size: usize,
    /// Objects grown past this capacity are dropped instead of pooled.
    max_capacity: usize,
    borrowed: AtomicUsize,
    created: AtomicUsize,
}

impl<T: Reusable> ObjectPool<T> {
    /// Create a pool with the given factory and idle limit.
    pub fn new<F>(factory: F, max_size: usize) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            available: Mutex::new(Vec::with_capacity(max_size)),
            factory: Box::new(factory),
            max_size,
            max_capacity: usize::MAX,
            borrowed: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
        }
    }

    /// Drop returned objects whose capacity exceeds `max_capacity`.
    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Borrow an object; it returns to the pool when the guard drops.
    pub fn acquire(&self) -> PooledObject<'_, T> {
        let obj = self.available.lock().pop().unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            (self.factory)()
        });

        self.borrowed.fetch_add(1, Ordering::Relaxed);

        PooledObject {
            obj: Some(obj),
            pool: self,
        }
    }

    fn release(&self, mut obj: T) {
        self.borrowed.fetch_sub(1, Ordering::Relaxed);

        if obj.capacity() > self.max_capacity {
            return;
        }
        obj.reset();

        let mut available = self.available.lock();
        if available.len() < self.max_size {
            available.push(obj);
        }
    }

    /// Number of idle objects.
    pub fn available(&self) -> usize {
        self.available.lock().len()
    }

    /// Number of objects currently borrowed.
    pub fn borrowed(&self) -> usize {
        self.borrowed.load(Ordering::Relaxed)
    }

    /// Total number of objects ever created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

impl<T> std::fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("max_size", &self.max_size)
            .field("max_capacity", &self.max_capacity)
            .field("borrowed", &self.borrowed.load(Ordering::Relaxed))
            .field("created", &self.created.load(Ordering::Relaxed))
            .finish()
    }
}

/// A borrowed object that returns to its pool on drop.
pub struct PooledObject<'a, T: Reusable> {
    obj: Option<T>,
    pool: &'a ObjectPool<T>,
}

impl<T: Reusable> Deref for PooledObject<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // Only `drop` takes the object out.
        self.obj.as_ref().expect("pooled object used after release")
    }
}

impl<T: Reusable> DerefMut for PooledObject<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.obj.as_mut().expect("pooled object used after release")
    }
}

impl<T: Reusable> Drop for PooledObject<'_, T> {
    fn drop(&mut self) {
        if let Some(obj) = self.obj.take() {
            self.pool.release(obj);
        }
    }
}

/// Pool of byte buffers used as serialization scratch space.
pub type BufferPool = ObjectPool<Vec<u8>>;

/// Pool of string builders used to materialize rendered content.
pub type StringPool = ObjectPool<String>;

/// Idle buffers kept by [`buffer_pool`] and [`string_pool`].
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Initial capacity of a pooled buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4 * 1024;

/// Buffers grown beyond this are not kept.
pub const DEFAULT_MAX_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Create a byte buffer pool with default limits.
pub fn buffer_pool() -> BufferPool {
    ObjectPool::new(|| Vec::with_capacity(DEFAULT_BUFFER_CAPACITY), DEFAULT_POOL_SIZE)
        .with_max_capacity(DEFAULT_MAX_BUFFER_CAPACITY)
}

/// Create a string builder pool with default limits.
pub fn string_pool() -> StringPool {
    ObjectPool::new(|| String::with_capacity(DEFAULT_BUFFER_CAPACITY), DEFAULT_POOL_SIZE)
        .with_max_capacity(DEFAULT_MAX_BUFFER_CAPACITY)
}
