//! Array pooling.
//!
//! Arrays decoded from the wire pass through [`ArrayPool::adopt`] and keep
//! their own storage. Converters that build arrays request them with
//! `malloc`, and releasing a sample hands every array member back.
//! [`ArrayUnpool`] is the default and keeps nothing. [`ArrayAllocator`]
//! recycles arrays by (element type, length).

use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::PooledArray;

/// Pluggable array allocator.
pub trait ArrayPool: Send + Sync {
    /// A recycled `Vec<T>` (as `Box<dyn Any>`) of exactly `len` elements.
    fn take(&self, element: TypeId, len: usize) -> Option<Box<dyn Any + Send>>;

    /// Accept an array back.
    fn free(&self, array: PooledArray);
}

impl dyn ArrayPool + '_ {
    /// Allocate `len` elements, recycled when possible.
    pub fn malloc<T: Clone + Default + Send + 'static>(&self, len: usize) -> Vec<T> {
        match self.take_typed::<T>(len) {
            Some(v) => v,
            None => vec![T::default(); len],
        }
    }

    /// Hand over an array decoded from the wire.
    ///
    /// The wire array already owns its storage, so it is returned untouched
    /// and the pool is not consulted. Recycled buffers stay available to
    /// [`malloc`](Self::malloc).
    pub fn adopt<T: Send + 'static>(&self, wire: Vec<T>) -> Vec<T> {
        wire
    }

    fn take_typed<T: Send + 'static>(&self, len: usize) -> Option<Vec<T>> {
        let boxed = self.take(TypeId::of::<T>(), len)?;
        let v = boxed.downcast::<Vec<T>>().ok()?;
        (v.len() == len).then_some(*v)
    }
}

/// Pool that never retains arrays.
#[derive(Debug, Default)]
pub struct ArrayUnpool;

impl ArrayPool for ArrayUnpool {
    fn take(&self, _element: TypeId, _len: usize) -> Option<Box<dyn Any + Send>> {
        None
    }

    fn free(&self, _array: PooledArray) {}
}

/// Pool keyed by element type and length.
///
/// At most [`ArrayAllocator::MAX_PER_SHAPE`] arrays are held per key; extra
/// arrays are dropped. String arrays are never pooled: recycling them would keep every string
/// allocation alive while saving nothing.
#[derive(Default)]
pub struct ArrayAllocator {
    free_lists: Mutex<HashMap<(TypeId, usize), Vec<Box<dyn Any + Send>>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    returned: AtomicUsize,
}

impl ArrayAllocator {
    pub const MAX_PER_SHAPE: usize = 8;

    pub fn new() -> Self {
        Self::default()
    }

    /// Requests served from the pool.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Requests that found nothing.
    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    /// Arrays accepted back.
    pub fn returned(&self) -> usize {
        self.returned.load(Ordering::Relaxed)
    }

    /// Arrays currently held.
    pub fn pooled(&self) -> usize {
        self.free_lists.lock().values().map(Vec::len).sum()
    }

    fn is_pooled_type(element: TypeId) -> bool {
        element != TypeId::of::<String>()
    }
}

impl ArrayPool for ArrayAllocator {
    fn take(&self, element: TypeId, len: usize) -> Option<Box<dyn Any + Send>> {
        if !Self::is_pooled_type(element) {
            return None;
        }
        let found = self.free_lists.lock().get_mut(&(element, len)).and_then(Vec::pop);
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn free(&self, array: PooledArray) {
        if !Self::is_pooled_type(array.element) || array.len == 0 {
            return;
        }
        let mut free_lists = self.free_lists.lock();
        let list = free_lists.entry((array.element, array.len)).or_default();
        if list.len() < Self::MAX_PER_SHAPE {
            list.push(array.data);
            self.returned.fetch_add(1, Ordering::Relaxed);
        }
    }
}
