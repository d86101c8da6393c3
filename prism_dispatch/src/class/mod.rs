//! Class objects.
//!
//! A `ClassObject` describes a class of the dynamic object model. It contains:
//! - The class name (and the host type name used in native signatures)
//! - Declared bases and the computed ancestor order (MRO)
//! - The member mapping from attribute name to [`AttributeSlot`]
//! - A version counter bumped on every base or member change
//! - The fixed-slot count and expected attribute names of its instances
//!
//! # Architecture
//!
//! ```text
//! ClassObject
//! ├── id: ClassId
//! ├── name: RwLock<Symbol>                       (__name__ is assignable)
//! ├── hierarchy: RwLock<Hierarchy>               (bases + Arc<[ClassId]> MRO)
//! ├── members: RwLock<FxHashMap<Symbol, Arc<AttributeSlot>>>
//! ├── version: AtomicU64
//! ├── flags: ClassFlags
//! ├── slot_names / init_attrs                    (instance layout inputs)
//! └── layout: OnceLock<Arc<StorageLayout>>       (computed once)
//! ```
//!
//! # Thread Safety
//!
//! The hierarchy is swapped as a whole under a per-class lock, so a reader
//! sees either the old or the new order, never a mix. Members are replaced
//! wholesale; slots are never mutated in place.

pub mod builder;
pub mod mro;

pub use builder::ClassSpec;
pub use mro::{ClassLookup, linearize};

use crate::slot::AttributeSlot;
use crate::storage::StorageLayout;
use crate::symbol::Symbol;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

// =============================================================================
// Class Identity
// =============================================================================

/// Unique identifier of a class within a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ClassId(pub u32);

impl ClassId {
    /// The root class `object`.
    pub const OBJECT: Self = Self(0);
    /// The metatype `type`.
    pub const TYPE: Self = Self(1);
    pub const NONE: Self = Self(2);
    pub const BOOL: Self = Self(3);
    pub const INT: Self = Self(4);
    pub const FLOAT: Self = Self(5);
    pub const STR: Self = Self(6);
    pub const TUPLE: Self = Self(7);
    pub const DICT: Self = Self(8);
    pub const MAPPING_PROXY: Self = Self(9);
    pub const FUNCTION: Self = Self(10);
    pub const METHOD: Self = Self(11);
    pub const DESCRIPTOR: Self = Self(12);

    /// Number of classes created during bootstrap.
    pub const BUILTIN_COUNT: u32 = 13;

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::BUILTIN_COUNT
    }
}

impl std::fmt::Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Declared bases. Most classes have one or two.
pub type Bases = SmallVec<[ClassId; 2]>;

/// A computed ancestor order, starting with the class itself.
pub type Mro = SmallVec<[ClassId; 8]>;

// =============================================================================
// Class Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags describing class capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassFlags: u32 {
        /// Instances carry an attribute mapping (`__dict__`).
        const HAS_DICT = 1 << 0;
        /// Instances support weak references (`__weakref__`).
        const WEAKREFABLE = 1 << 1;
        /// Class declares `__slots__`.
        const HAS_SLOTS = 1 << 2;
        /// Members of this class are always externally visible.
        const EXPOSED = 1 << 3;
        /// Class was built from native members.
        const NATIVE = 1 << 4;
        /// Created during runtime bootstrap.
        const BUILTIN = 1 << 5;
    }
}

impl Default for ClassFlags {
    fn default() -> Self {
        Self::empty()
    }
}

// =============================================================================
// Hierarchy
// =============================================================================

#[derive(Debug, Clone)]
struct Hierarchy {
    bases: Bases,
    mro: Arc<[ClassId]>,
}

/// Everything needed to construct a class; assembled by the runtime.
pub(crate) struct ClassParts {
    pub id: ClassId,
    pub name: Symbol,
    pub native_name: Option<Symbol>,
    pub bases: Bases,
    pub mro: Arc<[ClassId]>,
    pub flags: ClassFlags,
    pub members: FxHashMap<Symbol, Arc<AttributeSlot>>,
    pub slot_names: Vec<Symbol>,
    pub init_attrs: Vec<Symbol>,
    pub doc: Option<Arc<str>>,
}

// =============================================================================
// Class Object
// =============================================================================

/// A class of the object model.
pub struct ClassObject {
    id: ClassId,
    name: RwLock<Symbol>,
    native_name: Option<Symbol>,
    hierarchy: RwLock<Hierarchy>,
    members: RwLock<FxHashMap<Symbol, Arc<AttributeSlot>>>,
    version: AtomicU64,
    flags: ClassFlags,
    slot_names: Box<[Symbol]>,
    init_attrs: Box<[Symbol]>,
    layout: OnceLock<Arc<StorageLayout>>,
    doc: Option<Arc<str>>,
}

impl ClassObject {
    pub(crate) fn from_parts(parts: ClassParts) -> Self {
        Self {
            id: parts.id,
            name: RwLock::new(parts.name),
            native_name: parts.native_name,
            hierarchy: RwLock::new(Hierarchy {
                bases: parts.bases,
                mro: parts.mro,
            }),
            members: RwLock::new(parts.members),
            version: AtomicU64::new(1),
            flags: parts.flags,
            slot_names: parts.slot_names.into_boxed_slice(),
            init_attrs: parts.init_attrs.into_boxed_slice(),
            layout: OnceLock::new(),
            doc: parts.doc,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// The class name.
    #[inline]
    pub fn name(&self) -> Symbol {
        self.name.read().clone()
    }

    pub(crate) fn set_name(&self, name: Symbol) {
        *self.name.write() = name;
        self.bump_version();
    }

    /// Type name used when matching native signatures.
    ///
    /// Native classes may carry a host name distinct from their visible name
    /// (`float` is `double` to the host); other classes use their name.
    #[inline]
    pub fn signature_name(&self) -> Symbol {
        match &self.native_name {
            Some(name) => name.clone(),
            None => self.name(),
        }
    }

    /// Declared bases, in order.
    #[inline]
    pub fn bases(&self) -> Bases {
        self.hierarchy.read().bases.clone()
    }

    /// The ancestor order, starting with this class.
    #[inline]
    pub fn mro(&self) -> Arc<[ClassId]> {
        self.hierarchy.read().mro.clone()
    }

    /// Current version; changes whenever bases or members change.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    #[inline]
    pub fn flags(&self) -> ClassFlags {
        self.flags
    }

    #[inline]
    pub fn has_dict(&self) -> bool {
        self.flags.contains(ClassFlags::HAS_DICT)
    }

    #[inline]
    pub fn is_weakrefable(&self) -> bool {
        self.flags.contains(ClassFlags::WEAKREFABLE)
    }

    #[inline]
    pub fn is_exposed(&self) -> bool {
        self.flags.contains(ClassFlags::EXPOSED)
    }

    /// Total `__slots__` cells of instances, ancestors included.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_names.len()
    }

    /// Names of the fixed slots, in index order.
    #[inline]
    pub fn slot_names(&self) -> &[Symbol] {
        &self.slot_names
    }

    /// Whether instances of `self` and `other` share one fixed layout,
    /// so an instance may be moved between them.
    pub fn layout_compatible(&self, other: &ClassObject) -> bool {
        self.slot_names == other.slot_names
            && self.has_dict() == other.has_dict()
            && self.is_weakrefable() == other.is_weakrefable()
            && self.flags.contains(ClassFlags::BUILTIN) == other.flags.contains(ClassFlags::BUILTIN)
    }

    /// Attribute names assigned by this class's own initializer.
    #[inline]
    pub fn init_attrs(&self) -> &[Symbol] {
        &self.init_attrs
    }

    /// Opaque documentation string.
    #[inline]
    pub fn doc(&self) -> Option<&Arc<str>> {
        self.doc.as_ref()
    }

    /// Whether `ancestor` appears in this class's order.
    pub fn is_subclass_of(&self, ancestor: ClassId) -> bool {
        self.hierarchy.read().mro.contains(&ancestor)
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// The slot defined directly on this class under `name`.
    #[inline]
    pub fn member(&self, name: &str) -> Option<Arc<AttributeSlot>> {
        self.members.read().get(name).cloned()
    }

    #[inline]
    pub fn has_member(&self, name: &str) -> bool {
        self.members.read().contains_key(name)
    }

    /// Names defined directly on this class, sorted.
    pub fn member_names(&self) -> Vec<Symbol> {
        let mut names: Vec<Symbol> = self.members.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of the member mapping, sorted by name.
    pub fn members(&self) -> Vec<(Symbol, Arc<AttributeSlot>)> {
        let mut members: Vec<_> = self
            .members
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        members
    }

    /// Install or replace a member. Returns the replaced slot.
    pub(crate) fn set_member(
        &self,
        name: Symbol,
        slot: Arc<AttributeSlot>,
    ) -> Option<Arc<AttributeSlot>> {
        let previous = self.members.write().insert(name, slot);
        self.bump_version();
        previous
    }

    /// Remove a member. Returns the removed slot.
    pub(crate) fn remove_member(&self, name: &str) -> Option<Arc<AttributeSlot>> {
        let removed = self.members.write().remove(name);
        if removed.is_some() {
            self.bump_version();
        }
        removed
    }

    // =========================================================================
    // Hierarchy & Versioning
    // =========================================================================

    /// Swap in new bases and order in one step.
    pub(crate) fn replace_hierarchy(&self, bases: Bases, mro: Arc<[ClassId]>) {
        *self.hierarchy.write() = Hierarchy { bases, mro };
        self.bump_version();
    }

    #[inline]
    pub(crate) fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn layout_cell(&self) -> &OnceLock<Arc<StorageLayout>> {
        &self.layout
    }
}

impl std::fmt::Debug for ClassObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassObject")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("mro", &self.mro())
            .field("version", &self.version())
            .field("flags", &self.flags)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::slot::UserDescriptorSlot;
    use crate::value::Value;
    use std::thread;

    #[test]
    fn test_simple_class_creation() {
        let rt = Runtime::new();
        let class = rt.define_class(ClassSpec::new("MyClass")).unwrap();

        assert_eq!(class.name(), "MyClass");
        assert_eq!(class.bases().as_slice(), &[ClassId::OBJECT]);
        assert_eq!(&*class.mro(), &[class.id(), ClassId::OBJECT]);
        assert!(class.has_dict());
        assert!(!class.id().is_builtin());
    }

    #[test]
    fn test_class_id_uniqueness() {
        let rt = Runtime::new();
        let a = rt.define_class(ClassSpec::new("A")).unwrap();
        let b = rt.define_class(ClassSpec::new("B")).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_member_changes_bump_version() {
        let rt = Runtime::new();
        let class = rt.define_class(ClassSpec::new("Versioned")).unwrap();
        let v0 = class.version();

        class.set_member(
            Symbol::new("x"),
            Arc::new(AttributeSlot::User(UserDescriptorSlot::new("x", Value::Int(1)))),
        );
        let v1 = class.version();
        assert!(v1 > v0);

        assert!(class.remove_member("missing").is_none());
        assert_eq!(class.version(), v1);

        assert!(class.remove_member("x").is_some());
        assert!(class.version() > v1);
    }

    #[test]
    fn test_signature_name_prefers_native_name() {
        let rt = Runtime::new();
        assert_eq!(rt.builtin(ClassId::FLOAT).name(), "float");
        assert_eq!(rt.builtin(ClassId::FLOAT).signature_name(), "double");
        assert_eq!(rt.builtin(ClassId::INT).signature_name(), "int");
    }

    #[test]
    fn test_concurrent_member_writes() {
        let rt = Runtime::new();
        let class = rt.define_class(ClassSpec::new("ThreadTest")).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let class = class.clone();
                thread::spawn(move || {
                    let name = Symbol::from(format!("attr_{}", i));
                    class.set_member(
                        name.clone(),
                        Arc::new(AttributeSlot::User(UserDescriptorSlot::new(name.clone(), Value::Int(i)))),
                    );
                    assert!(class.has_member(name.as_str()));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..4 {
            assert!(class.has_member(&format!("attr_{}", i)));
        }
    }
}
