//! Memo store implementations

use crate::error::Result;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

/// A memo store that can be reset as a unit
pub trait Invalidate {
    /// Drop every cached entry in this store
    fn invalidate(&self);
}

/// Single-entry memo store for a value derived from facade configuration
///
/// Holds at most one `Arc<T>`. After [`MemoCell::invalidate`], the next
/// access recomputes and produces a fresh allocation.
#[derive(Debug, Default)]
pub struct MemoCell<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> MemoCell<T> {
    /// Create an empty cell
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Return the cached value, computing and storing it on first access
    ///
    /// The lock is held across `init`, so a concurrent access observes
    /// either nothing or the fully computed value.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = slot.as_ref() {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(init()?);
        *slot = Some(Arc::clone(&value));
        Ok(value)
    }

    /// Return the cached value without computing
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T> Invalidate for MemoCell<T> {
    fn invalidate(&self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Argument-keyed memo store
///
/// Unbounded by policy: entries live until [`MemoMap::invalidate_all`] or a
/// [`CacheSet`] sweep. If memory bounding is ever needed it must be added as
/// an explicit eviction policy, not inherited from the store.
///
/// No single-flight guarantee: the lock is released between the lookup and
/// the caller's computation, so concurrent misses on the same key may each
/// execute, with the last insert winning. Callers whose lookup starts after
/// the first insert completes observe the cached `Arc`.
#[derive(Debug)]
pub struct MemoMap<K, V> {
    entries: Mutex<HashMap<K, Arc<V>>>,
}

impl<K: Eq + Hash, V> MemoMap<K, V> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a cached result by key
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Store a computed result under its argument key
    pub fn insert(&self, key: K, value: Arc<V>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    /// Drop every cached entry
    pub fn invalidate_all(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, V> Default for MemoMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> Invalidate for MemoMap<K, V> {
    fn invalidate(&self) {
        self.invalidate_all();
    }
}

/// The enumerated set of memo stores owned by one facade
///
/// Registered once at facade construction; `clear_all` is the only sweep
/// operation, so the invalidation set stays auditable in one place.
pub struct CacheSet {
    handles: Vec<Arc<dyn Invalidate + Send + Sync>>,
}

impl CacheSet {
    /// Build the set from the facade's memo stores
    pub fn new(handles: Vec<Arc<dyn Invalidate + Send + Sync>>) -> Self {
        Self { handles }
    }

    /// Reset every registered store
    pub fn clear_all(&self) {
        for handle in &self.handles {
            handle.invalidate();
        }
    }

    /// Number of registered stores
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether any stores are registered
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl std::fmt::Debug for CacheSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSet")
            .field("handles", &self.handles.len())
            .finish()
    }
}
