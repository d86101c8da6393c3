//! The dispatch runtime.
//!
//! A [`Runtime`] owns every table the engine needs: the class table, the
//! class id and storage version counters, the operator table, the member
//! cache and the configuration. It is created once by the embedder and
//! passed by reference to every operation; there is no global state.
//!
//! # Bootstrap
//!
//! Construction registers the builtin classes under fixed ids:
//!
//! ```text
//! object ─┬─ type            (__name__, __bases__, __mro__, __dict__)
//!         ├─ NoneType
//!         ├─ int ── bool
//!         ├─ float           (host name "double")
//!         ├─ str             (host name "string")
//!         ├─ tuple, dict, mappingproxy
//!         └─ builtin_function, method, descriptor
//! ```
//!
//! `object` carries `__class__`. Builtin classes are immutable: their
//! names, bases and members cannot be reassigned.

use crate::class::builder::{inherited_slots, namespace_slot};
use crate::class::{Bases, ClassFlags, ClassId, ClassLookup, ClassObject, ClassParts, linearize};
use crate::config::DispatchConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::instance::Instance;
use crate::member_cache::MemberCache;
use crate::native::OperatorTable;
use crate::overload::TypeSig;
use crate::slot::{AttributeSlot, DataSlot, DataSlotKind, DictSlot};
use crate::storage::{InstanceStorage, StorageLayout, VersionCounter};
use crate::symbol::{Symbol, dunder};
use crate::value::Value;
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::smallvec;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

// =============================================================================
// Runtime
// =============================================================================

/// Registry and entry point of the dispatch engine.
pub struct Runtime {
    config: DispatchConfig,
    classes: DashMap<ClassId, Arc<ClassObject>>,
    builtins: Box<[Arc<ClassObject>]>,
    next_class_id: AtomicU32,
    storage_versions: VersionCounter,
    operators: OperatorTable,
    member_cache: MemberCache,
    /// Serializes base reassignment against class definition.
    hierarchy_lock: Mutex<()>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        let builtins = bootstrap();
        let classes = DashMap::with_capacity(builtins.len());
        for class in builtins.iter() {
            classes.insert(class.id(), class.clone());
        }
        tracing::debug!(builtins = builtins.len(), "runtime bootstrapped");

        Self {
            config,
            classes,
            builtins,
            next_class_id: AtomicU32::new(ClassId::BUILTIN_COUNT),
            storage_versions: VersionCounter::new(),
            operators: OperatorTable::new(),
            member_cache: MemberCache::new(),
            hierarchy_lock: Mutex::new(()),
        }
    }

    #[inline]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    #[inline]
    pub fn member_cache(&self) -> &MemberCache {
        &self.member_cache
    }

    #[inline]
    pub(crate) fn operators(&self) -> &OperatorTable {
        &self.operators
    }

    #[inline]
    pub(crate) fn hierarchy_lock(&self) -> &Mutex<()> {
        &self.hierarchy_lock
    }

    // =========================================================================
    // Class Table
    // =========================================================================

    /// Look up a class by id.
    #[inline]
    pub fn class(&self, id: ClassId) -> Option<Arc<ClassObject>> {
        self.classes.get(&id).map(|entry| entry.value().clone())
    }

    /// A builtin class by one of the fixed builtin ids.
    ///
    /// Other ids go through [`Runtime::class`].
    #[inline]
    pub(crate) fn builtin(&self, id: ClassId) -> Arc<ClassObject> {
        debug_assert!(id.is_builtin(), "{id} is not a builtin class");
        self.builtins[id.raw() as usize].clone()
    }

    /// Number of registered classes, builtins included.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub(crate) fn allocate_class_id(&self) -> ClassId {
        ClassId(self.next_class_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn register_class(&self, class: Arc<ClassObject>) {
        self.classes.insert(class.id(), class);
    }

    /// Every registered class whose order contains `id`, `id` excluded.
    fn subclasses_of(&self, id: ClassId) -> Vec<Arc<ClassObject>> {
        let snapshot: Vec<Arc<ClassObject>> = self
            .classes
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        snapshot
            .into_iter()
            .filter(|class| class.id() != id && class.is_subclass_of(id))
            .collect()
    }

    /// The class of any value.
    pub fn class_of(&self, value: &Value) -> Arc<ClassObject> {
        let id = match value {
            Value::None => ClassId::NONE,
            Value::Bool(_) => ClassId::BOOL,
            Value::Int(_) => ClassId::INT,
            Value::Float(_) => ClassId::FLOAT,
            Value::Str(_) => ClassId::STR,
            Value::Tuple(_) => ClassId::TUPLE,
            Value::Class(_) => ClassId::TYPE,
            Value::Instance(object) => return object.class(),
            Value::Dict(_) => ClassId::DICT,
            Value::MemberView(_) => ClassId::MAPPING_PROXY,
            Value::Slot(_) => ClassId::DESCRIPTOR,
            Value::Function(_) | Value::Constructor(_) => ClassId::FUNCTION,
            Value::Bound(_) => ClassId::METHOD,
        };
        self.builtin(id)
    }

    /// Type signature of an argument list, as matched against native
    /// parameter types.
    pub fn signature_of(&self, args: &[Value]) -> TypeSig {
        args.iter()
            .map(|arg| self.class_of(arg).signature_name())
            .collect()
    }

    // =========================================================================
    // Class Members
    // =========================================================================

    /// Define or replace a member on `class`.
    ///
    /// A [`Value::Slot`] is installed as-is; any other value is wrapped in a
    /// user descriptor slot. Versions of `class` and of every subclass are
    /// bumped.
    pub fn set_class_member(
        &self,
        class: &Arc<ClassObject>,
        name: &str,
        value: Value,
    ) -> DispatchResult<()> {
        ensure_mutable(class, name)?;
        let name = Symbol::new(name);
        let slot = namespace_slot(&name, value);
        class.set_member(name, slot);
        self.members_changed(class);
        Ok(())
    }

    /// Remove a member defined directly on `class`.
    pub fn remove_class_member(&self, class: &Arc<ClassObject>, name: &str) -> DispatchResult<bool> {
        ensure_mutable(class, name)?;
        let removed = class.remove_member(name).is_some();
        if removed {
            self.members_changed(class);
        }
        Ok(removed)
    }

    fn members_changed(&self, class: &ClassObject) {
        self.member_cache.invalidate_class(class.id());
        for subclass in self.subclasses_of(class.id()) {
            subclass.bump_version();
            self.member_cache.invalidate_class(subclass.id());
        }
    }

    // =========================================================================
    // Hierarchy Changes
    // =========================================================================

    /// Replace the declared bases of `class`.
    ///
    /// Recomputes the order of `class` and of every class whose order
    /// contains it. Either every order is replaced or, on failure, none.
    pub fn set_bases(&self, class: &Arc<ClassObject>, bases: &[ClassId]) -> DispatchResult<()> {
        let _guard = self.hierarchy_lock.lock();
        ensure_mutable(class, dunder::BASES)?;
        if bases.is_empty() {
            return Err(DispatchError::incompatible(format!(
                "can only assign a non-empty tuple to {}.__bases__",
                class.name()
            )));
        }

        let new_bases = self.resolve_classes(bases)?;
        if let Some(sub) = new_bases.iter().find(|b| b.is_subclass_of(class.id())) {
            tracing::debug!(class = %class.name(), base = %sub.name(), "base reassignment would cycle");
            return Err(DispatchError::Cycle {
                class: class.name().to_string(),
            });
        }
        let old_bases = self.resolve_classes(&class.bases())?;
        self.check_layout(class, &old_bases, &new_bases)?;

        let mut overlay = Overlay {
            runtime: self,
            updated: FxHashMap::default(),
        };
        let mro = linearize(class.id(), bases, &overlay)?;
        overlay.updated.insert(class.id(), mro.iter().copied().collect());

        // A base's order is a strict suffix of its subclass's order, so
        // shorter orders are recomputed first.
        let mut dependents = self.subclasses_of(class.id());
        dependents.sort_by_key(|dependent| dependent.mro().len());
        for dependent in &dependents {
            let mro = linearize(dependent.id(), &dependent.bases(), &overlay)?;
            overlay.updated.insert(dependent.id(), mro.iter().copied().collect());
        }

        let mut updated = overlay.updated;
        if let Some(mro) = updated.remove(&class.id()) {
            class.replace_hierarchy(bases.iter().copied().collect(), mro);
        }
        self.member_cache.invalidate_class(class.id());
        for dependent in &dependents {
            if let Some(mro) = updated.remove(&dependent.id()) {
                dependent.replace_hierarchy(dependent.bases(), mro);
            }
            self.member_cache.invalidate_class(dependent.id());
        }

        tracing::debug!(
            class = %class.name(),
            bases = bases.len(),
            dependents = dependents.len(),
            version = class.version(),
            "bases reassigned"
        );
        Ok(())
    }

    fn resolve_classes(&self, ids: &[ClassId]) -> DispatchResult<Vec<Arc<ClassObject>>> {
        ids.iter()
            .map(|&id| self.class(id).ok_or(DispatchError::UnknownClass(id.raw())))
            .collect()
    }

    /// New bases must keep the fixed instance layout of `class`.
    fn check_layout(
        &self,
        class: &ClassObject,
        old_bases: &[Arc<ClassObject>],
        new_bases: &[Arc<ClassObject>],
    ) -> DispatchResult<()> {
        let name = class.name();
        let before = inherited_slots(&name, old_bases)?;
        let after = inherited_slots(&name, new_bases)?;
        let gains_dict = !class.has_dict() && new_bases.iter().any(|b| b.has_dict());
        let gains_weakref = !class.is_weakrefable() && new_bases.iter().any(|b| b.is_weakrefable());
        if before != after || gains_dict || gains_weakref {
            return Err(DispatchError::LayoutConflict(format!(
                "__bases__ assignment: '{}' instance layout differs from the new bases",
                name
            )));
        }
        Ok(())
    }

    /// Move `object` to `class`.
    ///
    /// Only allowed between classes with the same fixed instance layout.
    pub fn reclassify(&self, object: &Arc<Instance>, class: Arc<ClassObject>) -> DispatchResult<()> {
        let current = object.class();
        if !current.layout_compatible(&class) {
            return Err(DispatchError::incompatible(format!(
                "__class__ assignment: '{}' object layout differs from '{}'",
                current.name(),
                class.name()
            )));
        }
        tracing::debug!(from = %current.name(), to = %class.name(), "instance reclassified");
        object.set_class(class);
        Ok(())
    }

    // =========================================================================
    // Instances & Storage
    // =========================================================================

    /// Allocate a bare instance of `class` without running initializers.
    pub fn instantiate(&self, class: &Arc<ClassObject>) -> Value {
        Value::Instance(Arc::new(Instance::new(class.clone())))
    }

    /// The expected-key layout of `class`, computed once.
    ///
    /// Keys are the initializer attribute names of every class in the
    /// order, root first, capped at `max_expected_keys`.
    pub fn storage_layout(&self, class: &ClassObject) -> Arc<StorageLayout> {
        class
            .layout_cell()
            .get_or_init(|| {
                let mut keys: Vec<Symbol> = Vec::new();
                let mut add = |attrs: &[Symbol]| {
                    for attr in attrs {
                        if !keys.contains(attr) {
                            keys.push(attr.clone());
                        }
                    }
                };
                for id in class.mro().iter().rev() {
                    if *id == class.id() {
                        add(class.init_attrs());
                    } else if let Some(ancestor) = self.class(*id) {
                        add(ancestor.init_attrs());
                    }
                }
                keys.truncate(self.config.max_expected_keys);

                let layout = StorageLayout::new(self.storage_versions.next(), keys);
                tracing::trace!(
                    class = %class.name(),
                    version = layout.version().raw(),
                    keys = layout.len(),
                    "storage layout computed"
                );
                Arc::new(layout)
            })
            .clone()
    }

    /// Fresh attribute storage for an instance of `class`.
    pub fn create_storage(&self, class: &ClassObject) -> InstanceStorage {
        InstanceStorage::new(self.storage_layout(class))
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Invoke any callable value.
    pub fn call(&self, callable: &Value, args: &[Value]) -> DispatchResult<Value> {
        match callable {
            Value::Function(target) => target.call(self, args),
            Value::Constructor(ctor) => ctor.call(self, args),
            Value::Bound(bound) => bound.call(self, args),
            Value::Slot(slot) => slot.call(self, args),
            Value::Class(class) => self.construct(class, args),
            Value::Instance(object) => {
                let class = object.class();
                match self.lookup_slot(&class, dunder::CALL) {
                    Some(resolved) => {
                        let bound = resolved.slot.try_get(self, Some(callable), &class)?;
                        self.call(&bound, args)
                    }
                    None => Err(not_callable(&class)),
                }
            }
            other => Err(not_callable(&self.class_of(other))),
        }
    }

    /// Create an instance of `class`.
    ///
    /// A `__new__` found in the order receives the class followed by `args`;
    /// otherwise a bare instance is allocated. `__init__` then runs on the
    /// result when it is an instance of `class`.
    pub fn construct(&self, class: &Arc<ClassObject>, args: &[Value]) -> DispatchResult<Value> {
        if class.id() == ClassId::TYPE {
            if let [value] = args {
                return Ok(Value::Class(self.class_of(value)));
            }
        }

        let new = self.lookup_slot(class, dunder::NEW);
        let has_new = new.is_some();
        let object = match new {
            Some(resolved) => {
                let new = resolved.slot.try_get(self, None, class)?;
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(Value::Class(class.clone()));
                full.extend_from_slice(args);
                self.call(&new, &full)?
            }
            None if class.flags().contains(ClassFlags::BUILTIN) && class.id() != ClassId::OBJECT => {
                return Err(DispatchError::incompatible(format!(
                    "cannot create '{}' instances",
                    class.name()
                )));
            }
            None => self.instantiate(class),
        };

        let initializes = matches!(&object, Value::Instance(o) if o.class().is_subclass_of(class.id()));
        if !initializes {
            return Ok(object);
        }
        match self.lookup_slot(class, dunder::INIT) {
            Some(resolved) => {
                let init = resolved.slot.try_get(self, Some(&object), class)?;
                self.call(&init, args)?;
            }
            None if !args.is_empty() && !has_new => {
                return Err(DispatchError::incompatible(format!(
                    "{}() takes no arguments",
                    class.name()
                )));
            }
            None => {}
        }
        Ok(object)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("classes", &self.classes.len())
            .field("config", &self.config)
            .field("member_cache", &self.member_cache)
            .finish_non_exhaustive()
    }
}

impl ClassLookup for Runtime {
    fn mro_of(&self, class: ClassId) -> Option<Arc<[ClassId]>> {
        self.class(class).map(|c| c.mro())
    }

    fn name_of(&self, class: ClassId) -> Option<Symbol> {
        self.class(class).map(|c| c.name())
    }
}

/// Lookup seeing orders planned but not yet applied.
struct Overlay<'a> {
    runtime: &'a Runtime,
    updated: FxHashMap<ClassId, Arc<[ClassId]>>,
}

impl ClassLookup for Overlay<'_> {
    fn mro_of(&self, class: ClassId) -> Option<Arc<[ClassId]>> {
        match self.updated.get(&class) {
            Some(mro) => Some(mro.clone()),
            None => self.runtime.mro_of(class),
        }
    }

    fn name_of(&self, class: ClassId) -> Option<Symbol> {
        self.runtime.name_of(class)
    }
}

fn ensure_mutable(class: &ClassObject, attr: &str) -> DispatchResult<()> {
    if class.flags().contains(ClassFlags::BUILTIN) {
        return Err(DispatchError::incompatible(format!(
            "cannot set '{}' attribute of immutable type '{}'",
            attr,
            class.name()
        )));
    }
    Ok(())
}

fn not_callable(class: &ClassObject) -> DispatchError {
    DispatchError::NotCallable {
        type_name: class.name().to_string(),
    }
}

// =============================================================================
// Bootstrap
// =============================================================================

fn bootstrap() -> Box<[Arc<ClassObject>]> {
    let data = |kind: DataSlotKind| Arc::new(AttributeSlot::Data(DataSlot::new(kind)));
    let builtin = |id: ClassId,
                   name: &str,
                   native: Option<&str>,
                   bases: Bases,
                   members: FxHashMap<Symbol, Arc<AttributeSlot>>| {
        let mut mro: Vec<ClassId> = vec![id];
        match bases.as_slice() {
            [ClassId::INT] => mro.extend([ClassId::INT, ClassId::OBJECT]),
            [] => {}
            _ => mro.push(ClassId::OBJECT),
        }
        let mut flags = ClassFlags::BUILTIN;
        if native.is_some() {
            flags |= ClassFlags::NATIVE;
        }
        Arc::new(ClassObject::from_parts(ClassParts {
            id,
            name: Symbol::new(name),
            native_name: native.map(Symbol::new),
            bases,
            mro: mro.into(),
            flags,
            members,
            slot_names: Vec::new(),
            init_attrs: Vec::new(),
            doc: None,
        }))
    };

    let mut object_members = FxHashMap::default();
    object_members.insert(Symbol::new(dunder::CLASS), data(DataSlotKind::ClassIdentity));

    let mut type_members = FxHashMap::default();
    type_members.insert(Symbol::new(dunder::NAME), data(DataSlotKind::ClassName));
    type_members.insert(Symbol::new(dunder::BASES), data(DataSlotKind::Bases));
    type_members.insert(Symbol::new(dunder::MRO), data(DataSlotKind::Mro));
    type_members.insert(Symbol::new(dunder::DICT), Arc::new(AttributeSlot::Dict(DictSlot)));

    let object: Bases = smallvec![ClassId::OBJECT];
    let classes = vec![
        builtin(ClassId::OBJECT, "object", None, Bases::new(), object_members),
        builtin(ClassId::TYPE, "type", None, object.clone(), type_members),
        builtin(ClassId::NONE, "NoneType", None, object.clone(), FxHashMap::default()),
        builtin(ClassId::BOOL, "bool", None, smallvec![ClassId::INT], FxHashMap::default()),
        builtin(ClassId::INT, "int", None, object.clone(), FxHashMap::default()),
        builtin(ClassId::FLOAT, "float", Some("double"), object.clone(), FxHashMap::default()),
        builtin(ClassId::STR, "str", Some("string"), object.clone(), FxHashMap::default()),
        builtin(ClassId::TUPLE, "tuple", None, object.clone(), FxHashMap::default()),
        builtin(ClassId::DICT, "dict", None, object.clone(), FxHashMap::default()),
        builtin(ClassId::MAPPING_PROXY, "mappingproxy", None, object.clone(), FxHashMap::default()),
        builtin(ClassId::FUNCTION, "builtin_function", None, object.clone(), FxHashMap::default()),
        builtin(ClassId::METHOD, "method", None, object.clone(), FxHashMap::default()),
        builtin(ClassId::DESCRIPTOR, "descriptor", None, object, FxHashMap::default()),
    ];
    debug_assert_eq!(classes.len(), ClassId::BUILTIN_COUNT as usize);
    debug_assert!(classes.iter().enumerate().all(|(i, c)| c.id().raw() as usize == i));
    classes.into_boxed_slice()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassSpec;
    use crate::native::NativeMember;
    use crate::overload::NativeThunk;

    #[test]
    fn test_builtins_registered() {
        let rt = Runtime::new();
        assert_eq!(rt.class_count(), ClassId::BUILTIN_COUNT as usize);
        assert_eq!(rt.builtin(ClassId::OBJECT).mro().as_ref(), &[ClassId::OBJECT]);
        assert_eq!(
            rt.builtin(ClassId::BOOL).mro().as_ref(),
            &[ClassId::BOOL, ClassId::INT, ClassId::OBJECT]
        );
        assert_eq!(rt.builtin(ClassId::FLOAT).signature_name(), "double");
        assert_eq!(rt.builtin(ClassId::FLOAT).name(), "float");
    }

    #[test]
    fn test_class_ids_are_unique() {
        let rt = Runtime::new();
        let a = rt.define_class(ClassSpec::new("A")).unwrap();
        let b = rt.define_class(ClassSpec::new("B")).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(!a.id().is_builtin());
        assert!(Arc::ptr_eq(&rt.class(a.id()).unwrap(), &a));
    }

    #[test]
    fn test_class_of_values() {
        let rt = Runtime::new();
        let class = rt.define_class(ClassSpec::new("A")).unwrap();
        let obj = rt.instantiate(&class);
        assert_eq!(rt.class_of(&Value::None).id(), ClassId::NONE);
        assert_eq!(rt.class_of(&Value::str("s")).id(), ClassId::STR);
        assert_eq!(rt.class_of(&Value::Class(class.clone())).id(), ClassId::TYPE);
        assert_eq!(rt.class_of(&obj).id(), class.id());
    }

    #[test]
    fn test_signature_of_uses_host_names() {
        let rt = Runtime::new();
        let sig = rt.signature_of(&[Value::Float(1.0), Value::Int(1), Value::str("s"), Value::Bool(true)]);
        let names: Vec<&str> = sig.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, ["double", "int", "string", "bool"]);
    }

    #[test]
    fn test_storage_layout_root_first_and_cached() {
        let rt = Runtime::new();
        let base = rt.define_class(ClassSpec::new("B").init_attrs(["a", "b"])).unwrap();
        let derived = rt
            .define_class(ClassSpec::new("D").base(base.id()).init_attrs(["c", "a"]))
            .unwrap();

        let layout = rt.storage_layout(&derived);
        let keys: Vec<&str> = layout.keys().iter().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert!(Arc::ptr_eq(&layout, &rt.storage_layout(&derived)));
        assert_ne!(layout.version(), rt.storage_layout(&base).version());
    }

    #[test]
    fn test_identical_keys_get_distinct_versions() {
        let rt = Runtime::new();
        let a = rt.define_class(ClassSpec::new("A").init_attrs(["x"])).unwrap();
        let b = rt.define_class(ClassSpec::new("B").init_attrs(["x"])).unwrap();
        assert_ne!(rt.storage_layout(&a).version(), rt.storage_layout(&b).version());
    }

    #[test]
    fn test_storage_layout_respects_cap() {
        let rt = Runtime::with_config(DispatchConfig {
            max_expected_keys: 2,
            ..Default::default()
        });
        let class = rt.define_class(ClassSpec::new("A").init_attrs(["x", "y", "z"])).unwrap();
        let storage = rt.create_storage(&class);
        assert_eq!(storage.layout().len(), 2);
        storage.set("z", Value::Int(3));
        assert!(storage.has_fallback());
        assert_eq!(storage.get("z"), Some(Value::Int(3)));
    }

    #[test]
    fn test_set_class_member_bumps_subclasses() {
        let rt = Runtime::new();
        let base = rt.define_class(ClassSpec::new("B")).unwrap();
        let derived = rt.define_class(ClassSpec::new("D").base(base.id())).unwrap();
        let before = derived.version();

        rt.set_class_member(&base, "x", Value::Int(1)).unwrap();
        assert!(derived.version() > before);
        assert!(rt.remove_class_member(&base, "x").unwrap());
        assert!(!rt.remove_class_member(&base, "x").unwrap());
    }

    #[test]
    fn test_builtin_members_are_immutable() {
        let rt = Runtime::new();
        let int = rt.builtin(ClassId::INT);
        assert!(rt.set_class_member(&int, "x", Value::Int(1)).is_err());
    }

    #[test]
    fn test_set_bases_relinearizes_dependents() {
        let rt = Runtime::new();
        let a = rt.define_class(ClassSpec::new("A")).unwrap();
        let b = rt.define_class(ClassSpec::new("B")).unwrap();
        let c = rt.define_class(ClassSpec::new("C").base(b.id())).unwrap();
        let d = rt.define_class(ClassSpec::new("D").base(c.id())).unwrap();
        let version = d.version();

        rt.set_bases(&b, &[a.id()]).unwrap();
        assert_eq!(b.mro().as_ref(), &[b.id(), a.id(), ClassId::OBJECT]);
        assert_eq!(
            d.mro().as_ref(),
            &[d.id(), c.id(), b.id(), a.id(), ClassId::OBJECT]
        );
        assert!(d.version() > version);
    }

    #[test]
    fn test_set_bases_cycle_rejected() {
        let rt = Runtime::new();
        let a = rt.define_class(ClassSpec::new("A")).unwrap();
        let b = rt.define_class(ClassSpec::new("B").base(a.id())).unwrap();
        let before = a.mro();

        assert!(matches!(rt.set_bases(&a, &[b.id()]), Err(DispatchError::Cycle { .. })));
        assert_eq!(a.mro(), before);
    }

    #[test]
    fn test_set_bases_is_all_or_nothing() {
        let rt = Runtime::new();
        let x = rt.define_class(ClassSpec::new("X")).unwrap();
        let y = rt.define_class(ClassSpec::new("Y")).unwrap();
        let a = rt.define_class(ClassSpec::new("A")).unwrap();
        // D = (A, X, Y) is fine while A does not derive from Y.
        let d = rt
            .define_class(ClassSpec::new("D").bases([a.id(), x.id(), y.id()]))
            .unwrap();
        let d_before = d.mro();
        let a_before = a.mro();

        // A(Y, X) makes D's order inconsistent: X before Y in D, Y before X in A.
        let err = rt.set_bases(&a, &[y.id(), x.id()]).unwrap_err();
        assert!(matches!(err, DispatchError::InconsistentHierarchy { .. }));
        assert_eq!(a.mro(), a_before);
        assert_eq!(d.mro(), d_before);
    }

    #[test]
    fn test_set_bases_layout_conflict() {
        let rt = Runtime::new();
        let slotted = rt.define_class(ClassSpec::new("S").slots(["a"])).unwrap();
        let plain = rt.define_class(ClassSpec::new("P")).unwrap();
        let child = rt.define_class(ClassSpec::new("C").base(slotted.id())).unwrap();
        assert!(matches!(
            rt.set_bases(&child, &[plain.id()]),
            Err(DispatchError::LayoutConflict(_))
        ));
    }

    #[test]
    fn test_reclassify_requires_compatible_layout() {
        let rt = Runtime::new();
        let a = rt.define_class(ClassSpec::new("A")).unwrap();
        let b = rt.define_class(ClassSpec::new("B")).unwrap();
        let s = rt.define_class(ClassSpec::new("S").slots(["x"])).unwrap();
        let Value::Instance(obj) = rt.instantiate(&a) else {
            unreachable!()
        };

        rt.reclassify(&obj, b.clone()).unwrap();
        assert_eq!(obj.class().id(), b.id());
        assert!(rt.reclassify(&obj, s).is_err());
        assert!(rt.reclassify(&obj, rt.builtin(ClassId::INT)).is_err());
    }

    fn returns_args() -> NativeThunk {
        Arc::new(|_, args: &[Value]| Ok(Value::tuple(args.iter().cloned())))
    }

    #[test]
    fn test_call_native_constructor() {
        let rt = Runtime::new();
        let class = rt
            .define_class(ClassSpec::new("Point").member(NativeMember::constructor(["int", "int"], returns_args())))
            .unwrap();
        let out = rt
            .call(&Value::Class(class), &[Value::Int(1), Value::Int(2)])
            .unwrap();
        assert_eq!(out, Value::tuple([Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn test_construct_runs_init() {
        let rt = Runtime::new();
        let init: NativeThunk = Arc::new(|rt: &Runtime, args: &[Value]| -> DispatchResult<Value> {
            rt.set_attr(&args[0], "value", args[1].clone())?;
            Ok(Value::None)
        });
        let class = rt
            .define_class(ClassSpec::new("Box").member(NativeMember::method("__init__", ["object"], "void", init)))
            .unwrap();

        let obj = rt.call(&Value::Class(class.clone()), &[Value::Int(7)]).unwrap();
        assert_eq!(rt.class_of(&obj).id(), class.id());
        assert_eq!(rt.get_attr(&obj, "value").unwrap(), Some(Value::Int(7)));
    }

    #[test]
    fn test_construct_without_init_rejects_arguments() {
        let rt = Runtime::new();
        let class = rt.define_class(ClassSpec::new("Plain")).unwrap();
        assert!(rt.call(&Value::Class(class.clone()), &[]).is_ok());
        assert!(rt.call(&Value::Class(class), &[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_builtin_classes_not_constructible() {
        let rt = Runtime::new();
        assert!(rt.call(&Value::Class(rt.builtin(ClassId::INT)), &[]).is_err());
        let typed = rt
            .call(&Value::Class(rt.builtin(ClassId::TYPE)), &[Value::Int(1)])
            .unwrap();
        assert_eq!(typed.as_class().map(|c| c.id()), Some(ClassId::INT));
    }

    #[test]
    fn test_call_dunder_call() {
        let rt = Runtime::new();
        let class = rt
            .define_class(ClassSpec::new("F").member(NativeMember::method("__call__", ["int"], "object", returns_args())))
            .unwrap();
        let obj = rt.instantiate(&class);
        let out = rt.call(&obj, &[Value::Int(4)]).unwrap();
        assert_eq!(out.as_tuple().map(|t| t.len()), Some(2));
        assert!(matches!(
            rt.call(&Value::Int(1), &[]),
            Err(DispatchError::NotCallable { type_name }) if type_name == "int"
        ));
    }
}
