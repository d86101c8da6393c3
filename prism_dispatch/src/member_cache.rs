//! Per-runtime cache of member lookups.
//!
//! Attribute lookup walks the ancestor order and asks each class's member
//! mapping for the name. This cache memoizes the outcome per (class, name),
//! misses included, so repeated accesses on the same class skip the walk.
//!
//! # Invalidation
//!
//! Every entry records the class version it was computed against. A class
//! version changes whenever its bases or members change, or when a member
//! of any ancestor changes, so an entry whose version differs from the
//! class's current version is stale and treated as a miss.
//!
//! [`MemberCache::invalidate_class`] drops entries eagerly; it is only an
//! optimization, version checks alone keep lookups correct.
//!
//! # Bounds
//!
//! Misses are keyed by whatever names callers ask for, so each class holds
//! at most [`MAX_ENTRIES_PER_CLASS`] entries. A full class sheds its stale
//! entries and cached misses before taking a new one; a miss that still
//! does not fit is not cached.
//!
//! # Thread Safety
//!
//! Uses `RwLock` for concurrent read access with exclusive write access.

use crate::attribute::ResolvedSlot;
use crate::class::{ClassId, ClassObject};
use crate::symbol::Symbol;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Entries kept per class before stale entries and misses are shed.
pub const MAX_ENTRIES_PER_CLASS: usize = 1024;

// =============================================================================
// Cache Entry
// =============================================================================

/// A memoized lookup.
#[derive(Debug, Clone)]
pub struct CachedMember {
    /// Class version the lookup was computed against.
    pub version: u64,
    /// The slot found, or `None` when no class in the order defines it.
    pub resolved: Option<ResolvedSlot>,
}

impl CachedMember {
    #[inline]
    pub fn is_current(&self, class: &ClassObject) -> bool {
        self.version == class.version()
    }
}

// =============================================================================
// Member Cache
// =============================================================================

/// Lookup cache keyed by class and member name.
pub struct MemberCache {
    entries: RwLock<FxHashMap<ClassId, FxHashMap<Symbol, CachedMember>>>,

    /// Cache hit counter
    hits: AtomicU64,

    /// Cache miss counter, stale entries included
    misses: AtomicU64,

    /// Invalidation counter
    invalidations: AtomicU64,
}

impl MemberCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// The current entry for `name` on `class`.
    #[inline]
    pub fn get(&self, class: &ClassObject, name: &str) -> Option<CachedMember> {
        let result = self
            .entries
            .read()
            .get(&class.id())
            .and_then(|names| names.get(name))
            .filter(|entry| entry.is_current(class))
            .cloned();

        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Record a lookup, replacing any stale entry.
    #[inline]
    pub fn insert(&self, class: ClassId, name: Symbol, entry: CachedMember) {
        let mut entries = self.entries.write();
        let names = entries.entry(class).or_default();

        if names.len() >= MAX_ENTRIES_PER_CLASS && !names.contains_key(&name) {
            let before = names.len();
            names.retain(|_, cached| cached.version == entry.version && cached.resolved.is_some());
            tracing::trace!(
                class = class.raw(),
                shed = before - names.len(),
                "member cache shed entries"
            );
            if entry.resolved.is_none() && names.len() >= MAX_ENTRIES_PER_CLASS {
                return;
            }
        }
        names.insert(name, entry);
    }

    /// Drop every entry of `class`.
    pub fn invalidate_class(&self, class: ClassId) {
        let removed = self.entries.write().remove(&class);
        if removed.is_some() {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(class = class.raw(), "member cache invalidated");
        }
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.write().clear();
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// (hits, misses, invalidations)
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.invalidations.load(Ordering::Relaxed),
        )
    }

    /// Hit rate as a percentage; 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    /// Number of cached (class, name) pairs.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(|names| names.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemberCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemberCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (hits, misses, invalidations) = self.stats();
        f.debug_struct("MemberCache")
            .field("len", &self.len())
            .field("hits", &hits)
            .field("misses", &misses)
            .field("invalidations", &invalidations)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
