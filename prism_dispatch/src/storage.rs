//! Versioned instance attribute storage.
//!
//! Each class fixes, once, an ordered list of *expected keys*: the attribute
//! names its initializers assign, merged with those of every ancestor. The
//! list is tagged with a [`StorageVersion`] and instances of the class store
//! those keys in a fixed array found by a short linear scan. Everything else
//! spills into a lazily allocated fallback map.
//!
//! # Layout
//!
//! ```text
//! InstanceStorage
//! ├── layout: Arc<StorageLayout>     (version + expected keys, shared by class)
//! ├── values: [ValueCell; N]         (N = expected key count, never grows)
//! └── fallback: OnceLock<RwLock<FxHashMap<Symbol, Value>>>
//! ```
//!
//! # Unset Cells
//!
//! A cell that was never written (or was removed) is *unset*, which is
//! distinct from holding `Value::None`.

use crate::symbol::Symbol;
use crate::value::Value;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Value Cell
// =============================================================================

/// A single storage cell.
///
/// `None` inside the lock is the unset state. Replacement and
/// compare-and-unset are atomic with respect to each other.
#[derive(Default)]
pub struct ValueCell(Mutex<Option<Value>>);

impl ValueCell {
    /// Create an unset cell.
    #[inline]
    pub const fn unset() -> Self {
        Self(Mutex::new(None))
    }

    /// Read the cell, `None` when unset.
    #[inline]
    pub fn get(&self) -> Option<Value> {
        self.0.lock().clone()
    }

    /// Store a value, returning the previous one.
    #[inline]
    pub fn set(&self, value: Value) -> Option<Value> {
        self.0.lock().replace(value)
    }

    /// Unset the cell, returning what it held.
    #[inline]
    pub fn take(&self) -> Option<Value> {
        self.0.lock().take()
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.lock().is_some()
    }

    /// Unset the cell only if it still holds `expected` (by identity).
    pub fn compare_and_unset(&self, expected: &Value) -> bool {
        let mut guard = self.0.lock();
        match guard.as_ref() {
            Some(current) if current.is(expected) => {
                *guard = None;
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for ValueCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(v) => write!(f, "{:?}", v),
            None => f.write_str("<unset>"),
        }
    }
}

// =============================================================================
// Storage Versions
// =============================================================================

/// Identifier of an expected-key list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StorageVersion(u64);

impl StorageVersion {
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Monotonic allocator for storage versions.
#[derive(Debug)]
pub struct VersionCounter(AtomicU64);

impl VersionCounter {
    pub const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    /// Allocate the next version.
    #[inline]
    pub fn next(&self) -> StorageVersion {
        StorageVersion(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for VersionCounter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Storage Layout
// =============================================================================

/// The fixed expected-key list of a class.
#[derive(Debug)]
pub struct StorageLayout {
    version: StorageVersion,
    keys: Box<[Symbol]>,
}

impl StorageLayout {
    /// Create a layout. Duplicate keys are dropped, first occurrence wins.
    pub fn new(version: StorageVersion, keys: impl IntoIterator<Item = Symbol>) -> Self {
        let mut unique: Vec<Symbol> = Vec::new();
        for key in keys {
            if !unique.contains(&key) {
                unique.push(key);
            }
        }
        Self {
            version,
            keys: unique.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn version(&self) -> StorageVersion {
        self.version
    }

    #[inline]
    pub fn keys(&self) -> &[Symbol] {
        &self.keys
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Position of `key` in the expected list.
    #[inline]
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k.as_str() == key)
    }
}

// =============================================================================
// Instance Storage
// =============================================================================

/// Per-instance attribute storage.
pub struct InstanceStorage {
    layout: Arc<StorageLayout>,
    values: Box<[ValueCell]>,
    fallback: OnceLock<RwLock<FxHashMap<Symbol, Value>>>,
}

impl InstanceStorage {
    /// Allocate storage for `layout` with every cell unset.
    pub fn new(layout: Arc<StorageLayout>) -> Self {
        let values = (0..layout.len()).map(|_| ValueCell::unset()).collect();
        Self {
            layout,
            values,
            fallback: OnceLock::new(),
        }
    }

    #[inline]
    pub fn layout(&self) -> &Arc<StorageLayout> {
        &self.layout
    }

    #[inline]
    pub fn version(&self) -> StorageVersion {
        self.layout.version()
    }

    #[inline]
    fn fallback(&self) -> &RwLock<FxHashMap<Symbol, Value>> {
        self.fallback.get_or_init(|| RwLock::new(FxHashMap::default()))
    }

    /// Whether the fallback map has been allocated.
    #[inline]
    pub fn has_fallback(&self) -> bool {
        self.fallback.get().is_some()
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.layout.index_of(key) {
            Some(index) => self.values[index].get(),
            None => self.fallback.get()?.read().get(key).cloned(),
        }
    }

    /// Read an expected key by its layout index.
    #[inline]
    pub fn get_index(&self, index: usize) -> Option<Value> {
        self.values.get(index)?.get()
    }

    /// Store a value, returning the previous one.
    pub fn set(&self, key: &str, value: Value) -> Option<Value> {
        match self.layout.index_of(key) {
            Some(index) => self.values[index].set(value),
            None => self.fallback().write().insert(Symbol::new(key), value),
        }
    }

    /// Whether `key` currently holds a value.
    pub fn contains(&self, key: &str) -> bool {
        match self.layout.index_of(key) {
            Some(index) => self.values[index].is_set(),
            None => self
                .fallback
                .get()
                .is_some_and(|map| map.read().contains_key(key)),
        }
    }

    /// Remove `key`, returning whether a value was present.
    ///
    /// Array cells are cleared with compare-and-unset against the value just
    /// observed, so two racing removals report exactly one success.
    pub fn remove(&self, key: &str) -> bool {
        match self.layout.index_of(key) {
            Some(index) => {
                let cell = &self.values[index];
                loop {
                    let Some(current) = cell.get() else {
                        return false;
                    };
                    if cell.compare_and_unset(&current) {
                        return true;
                    }
                }
            }
            None => match self.fallback.get() {
                Some(map) => map.write().remove(key).is_some(),
                None => false,
            },
        }
    }

    /// Number of set entries.
    pub fn len(&self) -> usize {
        let fixed = self.values.iter().filter(|cell| cell.is_set()).count();
        fixed + self.fallback.get().map_or(0, |map| map.read().len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all set entries: expected keys in layout order, then
    /// fallback entries in unspecified order.
    pub fn items(&self) -> Vec<(Symbol, Value)> {
        let mut items: Vec<(Symbol, Value)> = self
            .layout
            .keys()
            .iter()
            .zip(self.values.iter())
            .filter_map(|(key, cell)| cell.get().map(|v| (key.clone(), v)))
            .collect();
        if let Some(map) = self.fallback.get() {
            items.extend(map.read().iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        items
    }

    /// Snapshot of all set keys.
    pub fn keys(&self) -> Vec<Symbol> {
        self.items().into_iter().map(|(k, _)| k).collect()
    }

    /// Unset every cell and empty the fallback map.
    pub fn clear(&self) {
        for cell in self.values.iter() {
            cell.take();
        }
        if let Some(map) = self.fallback.get() {
            map.write().clear();
        }
    }
}

impl std::fmt::Debug for InstanceStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceStorage")
            .field("version", &self.version())
            .field("items", &self.items())
            .finish()
    }
}
