//! Attribute and type names.
//!
//! A `Symbol` is a cheaply clonable, immutable string used for every name the
//! dispatch engine handles: attribute names, class names, parameter type names.
//! Equality first compares pointers, so symbols cloned from the same source
//! (the common case for slot keys and cached signatures) compare in O(1).
//!
//! Symbols hash and compare exactly like `str`, which lets name-keyed maps be
//! queried with a borrowed `&str` without allocating.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Immutable shared name.
#[derive(Clone)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Create a symbol from a string slice.
    #[inline]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Borrow the underlying string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether two symbols share the same allocation.
    #[inline]
    pub fn ptr_eq(a: &Symbol, b: &Symbol) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Check whether this is a `__dunder__` name.
    #[inline]
    pub fn is_dunder(&self) -> bool {
        let s = self.as_str();
        s.len() > 4 && s.starts_with("__") && s.ends_with("__")
    }
}

impl PartialEq for Symbol {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Symbol::ptr_eq(self, other) || self.as_str() == other.as_str()
    }
}

impl Eq for Symbol {}

impl PartialEq<str> for Symbol {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Symbol {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Hash for Symbol {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Borrow<str> for Symbol {
    #[inline]
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for Symbol {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for Symbol {
    #[inline]
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Symbol {
    #[inline]
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&Symbol> for Symbol {
    #[inline]
    fn from(name: &Symbol) -> Self {
        name.clone()
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Well-Known Names
// =============================================================================

/// Special attribute names installed or consulted by the engine.
pub mod dunder {
    pub const CLASS: &str = "__class__";
    pub const DICT: &str = "__dict__";
    pub const WEAKREF: &str = "__weakref__";
    pub const DOC: &str = "__doc__";
    pub const NAME: &str = "__name__";
    pub const BASES: &str = "__bases__";
    pub const MRO: &str = "__mro__";
    pub const NEW: &str = "__new__";
    pub const INIT: &str = "__init__";
    pub const CALL: &str = "__call__";
    pub const GET: &str = "__get__";
    pub const SET: &str = "__set__";
    pub const DELETE: &str = "__delete__";
    pub const GETITEM: &str = "__getitem__";
    pub const SETITEM: &str = "__setitem__";
}
