//! Attribute lookup protocol.
//!
//! # Instances
//!
//! 1. Find the slot for the name in the ancestor order of the object's class.
//! 2. A data descriptor wins over instance storage.
//! 3. Otherwise a value in instance storage wins.
//! 4. Otherwise a non-data slot is asked for the value.
//!
//! # Classes
//!
//! Classes are instances of the metatype `type`, so class-level access
//! consults the metatype first:
//!
//! 1. A data descriptor found in the metatype's order.
//! 2. A slot found in the class's own order, accessed without an instance.
//! 3. A non-data slot found in the metatype's order.
//!
//! Missing attributes are reported as `None` / `false`, never as errors.

use crate::class::{ClassId, ClassObject};
use crate::error::{DispatchError, DispatchResult};
use crate::member_cache::CachedMember;
use crate::runtime::Runtime;
use crate::slot::AttributeSlot;
use crate::symbol::Symbol;
use crate::value::Value;
use std::sync::Arc;

// =============================================================================
// Lookup Results
// =============================================================================

/// A slot located in an ancestor order.
#[derive(Debug, Clone)]
pub struct ResolvedSlot {
    pub slot: Arc<AttributeSlot>,
    /// Class whose member mapping holds the slot.
    pub defining_class: ClassId,
    /// Position of the defining class in the searched order.
    pub mro_index: usize,
}

/// What a compiled access site needs to specialize on.
///
/// A plan is valid while the class version equals `version`. The flags
/// are a snapshot: user descriptors may change them by redefining
/// `__set__` / `__delete__` on the wrapped value's class.
#[derive(Debug, Clone)]
pub struct AccessPlan {
    pub class_id: ClassId,
    pub version: u64,
    pub resolved: Option<ResolvedSlot>,
    /// The slot shadows instance storage.
    pub data_descriptor: bool,
    /// Getting through the slot cannot fail.
    pub always_succeeds: bool,
}

impl AccessPlan {
    #[inline]
    pub fn is_valid_for(&self, class: &ClassObject) -> bool {
        self.class_id == class.id() && self.version == class.version()
    }

    #[inline]
    pub fn slot(&self) -> Option<&Arc<AttributeSlot>> {
        self.resolved.as_ref().map(|r| &r.slot)
    }
}

// =============================================================================
// Lookup
// =============================================================================

impl Runtime {
    /// Find `name` in the ancestor order of `class`.
    pub fn lookup_slot(&self, class: &Arc<ClassObject>, name: &str) -> Option<ResolvedSlot> {
        if !self.config().member_cache_enabled {
            return self.walk_mro(class, name);
        }
        if let Some(cached) = self.member_cache().get(class, name) {
            return cached.resolved;
        }

        let version = class.version();
        let resolved = self.walk_mro(class, name);
        self.member_cache().insert(
            class.id(),
            Symbol::new(name),
            CachedMember {
                version,
                resolved: resolved.clone(),
            },
        );
        resolved
    }

    fn walk_mro(&self, class: &Arc<ClassObject>, name: &str) -> Option<ResolvedSlot> {
        for (index, id) in class.mro().iter().enumerate() {
            let holder = if *id == class.id() {
                Some(class.clone())
            } else {
                self.class(*id)
            };
            if let Some(slot) = holder.and_then(|h| h.member(name)) {
                return Some(ResolvedSlot {
                    slot,
                    defining_class: *id,
                    mro_index: index,
                });
            }
        }
        None
    }

    /// The slot governing `name` on an instance of `class`.
    ///
    /// With an instance, a non-data slot shadowed by the instance's own
    /// storage does not govern access and `None` is returned.
    pub fn resolve_attribute(
        &self,
        name: &str,
        instance: Option<&Value>,
        class: &Arc<ClassObject>,
    ) -> Option<ResolvedSlot> {
        let resolved = self.lookup_slot(class, name)?;
        if let Some(Value::Instance(object)) = instance {
            if !resolved.slot.is_data_descriptor(self)
                && object.storage().is_some_and(|s| s.contains(name))
            {
                return None;
            }
        }
        Some(resolved)
    }

    /// Plan access to `name` on instances of `class`.
    pub fn plan_attribute_access(&self, class: &Arc<ClassObject>, name: &str) -> AccessPlan {
        let version = class.version();
        let resolved = self.lookup_slot(class, name);
        let (data_descriptor, always_succeeds) = match &resolved {
            Some(r) => (r.slot.is_data_descriptor(self), r.slot.always_succeeds_on_get(self)),
            None => (false, false),
        };
        AccessPlan {
            class_id: class.id(),
            version,
            resolved,
            data_descriptor,
            always_succeeds,
        }
    }

    // =========================================================================
    // Get / Set / Delete
    // =========================================================================

    /// Read `name` from `object`. `Ok(None)` when the attribute is missing.
    pub fn get_attr(&self, object: &Value, name: &str) -> DispatchResult<Option<Value>> {
        if let Value::Class(class) = object {
            return self.class_get_attr(class, name);
        }

        let class = self.class_of(object);
        let resolved = self.lookup_slot(&class, name);
        if let Some(r) = &resolved {
            if r.slot.is_data_descriptor(self) {
                return r.slot.try_get(self, Some(object), &class).map(Some);
            }
        }
        if let Value::Instance(instance) = object {
            if let Some(value) = instance.storage().and_then(|s| s.get(name)) {
                return Ok(Some(value));
            }
        }
        match resolved {
            Some(r) => r.slot.try_get(self, Some(object), &class).map(Some),
            None => Ok(None),
        }
    }

    /// Write `name` on `object`. `Ok(false)` when the object has nowhere to
    /// put it.
    pub fn set_attr(&self, object: &Value, name: &str, value: Value) -> DispatchResult<bool> {
        if let Value::Class(class) = object {
            return self.class_set_attr(class, name, value).map(|_| true);
        }

        let class = self.class_of(object);
        let resolved = self.lookup_slot(&class, name);
        if let Some(r) = &resolved {
            if r.slot.is_data_descriptor(self) {
                r.slot.try_set(self, Some(object), &class, value)?;
                return Ok(true);
            }
        }
        if let Value::Instance(instance) = object {
            if class.has_dict() {
                instance.storage_or_create(self)?.set(name, value);
                return Ok(true);
            }
        }
        match resolved {
            Some(_) => Err(DispatchError::read_only(name)),
            None => Ok(false),
        }
    }

    /// Delete `name` from `object`. `Ok(false)` when it was not present.
    pub fn del_attr(&self, object: &Value, name: &str) -> DispatchResult<bool> {
        if let Value::Class(class) = object {
            return self.class_del_attr(class, name);
        }

        let class = self.class_of(object);
        let resolved = self.lookup_slot(&class, name);
        if let Some(r) = &resolved {
            if r.slot.is_data_descriptor(self) {
                r.slot.try_delete(self, Some(object), &class)?;
                return Ok(true);
            }
        }
        if let Value::Instance(instance) = object {
            if instance.storage().is_some_and(|s| s.remove(name)) {
                return Ok(true);
            }
        }
        match resolved {
            Some(_) => Err(DispatchError::read_only(name)),
            None => Ok(false),
        }
    }

    // =========================================================================
    // Class-Level Access
    // =========================================================================

    fn metatype_slot(&self, name: &str) -> (Arc<ClassObject>, Option<ResolvedSlot>) {
        let meta = self.builtin(ClassId::TYPE);
        let resolved = self.lookup_slot(&meta, name);
        (meta, resolved)
    }

    fn class_get_attr(&self, class: &Arc<ClassObject>, name: &str) -> DispatchResult<Option<Value>> {
        let receiver = Value::Class(class.clone());
        let (meta, meta_slot) = self.metatype_slot(name);
        if let Some(r) = &meta_slot {
            if r.slot.is_data_descriptor(self) {
                return r.slot.try_get(self, Some(&receiver), &meta).map(Some);
            }
        }
        if let Some(r) = self.lookup_slot(class, name) {
            return r.slot.try_get(self, None, class).map(Some);
        }
        match meta_slot {
            Some(r) => r.slot.try_get(self, Some(&receiver), &meta).map(Some),
            None => Ok(None),
        }
    }

    fn class_set_attr(&self, class: &Arc<ClassObject>, name: &str, value: Value) -> DispatchResult<()> {
        let (meta, meta_slot) = self.metatype_slot(name);
        if let Some(r) = meta_slot.filter(|r| r.slot.is_data_descriptor(self)) {
            return r
                .slot
                .try_set(self, Some(&Value::Class(class.clone())), &meta, value);
        }
        self.set_class_member(class, name, value)
    }

    fn class_del_attr(&self, class: &Arc<ClassObject>, name: &str) -> DispatchResult<bool> {
        let (meta, meta_slot) = self.metatype_slot(name);
        if let Some(r) = meta_slot.filter(|r| r.slot.is_data_descriptor(self)) {
            r.slot
                .try_delete(self, Some(&Value::Class(class.clone())), &meta)?;
            return Ok(true);
        }
        self.remove_class_member(class, name)
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Visible attribute names of `object`, sorted.
    ///
    /// Instances list their storage keys and the members of their class's
    /// order; classes list the members of their own order.
    pub fn member_names(&self, object: &Value) -> Vec<Symbol> {
        let class = match object {
            Value::Class(class) => class.clone(),
            other => self.class_of(other),
        };

        let mut names: Vec<Symbol> = Vec::new();
        for id in class.mro().iter() {
            let Some(holder) = self.class(*id) else {
                continue;
            };
            names.extend(
                holder
                    .members()
                    .into_iter()
                    .filter(|(_, slot)| slot.is_visible())
                    .map(|(name, _)| name),
            );
        }
        if let Value::Instance(instance) = object {
            if let Some(storage) = instance.storage() {
                names.extend(storage.keys());
            }
        }
        names.sort();
        names.dedup();
        names
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassSpec;
    use crate::native::{MemberTags, NativeMember};
    use crate::overload::NativeThunk;
    use crate::symbol::dunder;

    fn constant(value: i64) -> NativeThunk {
        Arc::new(move |_, _| Ok(Value::Int(value)))
    }

    #[test]
    fn test_instance_storage_round_trip() {
        let rt = Runtime::new();
        let class = rt.define_class(ClassSpec::new("A").init_attrs(["x"])).unwrap();
        let obj = rt.instantiate(&class);

        assert_eq!(rt.get_attr(&obj, "x").unwrap(), None);
        assert!(rt.set_attr(&obj, "x", Value::Int(1)).unwrap());
        assert!(rt.set_attr(&obj, "extra", Value::Int(2)).unwrap());
        assert_eq!(rt.get_attr(&obj, "x").unwrap(), Some(Value::Int(1)));
        assert_eq!(rt.get_attr(&obj, "extra").unwrap(), Some(Value::Int(2)));

        assert!(rt.del_attr(&obj, "x").unwrap());
        assert!(!rt.del_attr(&obj, "x").unwrap());
        assert_eq!(rt.get_attr(&obj, "x").unwrap(), None);
    }

    #[test]
    fn test_storage_shadows_non_data_slot() {
        let rt = Runtime::new();
        let class = rt
            .define_class(ClassSpec::new("A").attr("x", Value::Int(1)))
            .unwrap();
        let obj = rt.instantiate(&class);

        assert_eq!(rt.get_attr(&obj, "x").unwrap(), Some(Value::Int(1)));
        rt.set_attr(&obj, "x", Value::Int(2)).unwrap();
        assert_eq!(rt.get_attr(&obj, "x").unwrap(), Some(Value::Int(2)));
        assert!(rt.resolve_attribute("x", Some(&obj), &class).is_none());
        assert!(rt.resolve_attribute("x", None, &class).is_some());
    }

    #[test]
    fn test_data_descriptor_shadows_storage() {
        let rt = Runtime::new();
        let class = rt
            .define_class(ClassSpec::new("A").member(
                NativeMember::property("x", "int", constant(10)).with_setter(Arc::new(|_, _| Ok(Value::None))),
            ))
            .unwrap();
        let obj = rt.instantiate(&class);

        let Value::Instance(instance) = &obj else {
            unreachable!()
        };
        instance.storage_or_create(&rt).unwrap().set("x", Value::Int(99));
        assert_eq!(rt.get_attr(&obj, "x").unwrap(), Some(Value::Int(10)));
    }

    #[test]
    fn test_class_level_access() {
        let rt = Runtime::new();
        let base = rt.define_class(ClassSpec::new("Base").attr("k", Value::Int(1))).unwrap();
        let class = rt.define_class(ClassSpec::new("A").base(base.id())).unwrap();
        let receiver = Value::Class(class.clone());

        assert_eq!(rt.get_attr(&receiver, "k").unwrap(), Some(Value::Int(1)));
        assert_eq!(rt.get_attr(&receiver, "__name__").unwrap(), Some(Value::str("A")));
        let class_of_class = rt.get_attr(&receiver, dunder::CLASS).unwrap().unwrap();
        assert_eq!(class_of_class.as_class().map(|c| c.id()), Some(ClassId::TYPE));
        assert!(matches!(
            rt.get_attr(&receiver, dunder::DICT).unwrap(),
            Some(Value::MemberView(c)) if c.id() == class.id()
        ));
        assert_eq!(rt.get_attr(&receiver, "missing").unwrap(), None);
    }

    #[test]
    fn test_class_level_set_goes_through_metatype() {
        let rt = Runtime::new();
        let class = rt.define_class(ClassSpec::new("A")).unwrap();
        let receiver = Value::Class(class.clone());

        rt.set_attr(&receiver, "__name__", Value::str("Renamed")).unwrap();
        assert_eq!(class.name(), "Renamed");

        rt.set_attr(&receiver, "k", Value::Int(5)).unwrap();
        assert!(class.has_member("k"));
        assert!(rt.del_attr(&receiver, "k").unwrap());
        assert!(!class.has_member("k"));
    }

    #[test]
    fn test_inherited_member_change_is_seen() {
        let rt = Runtime::new();
        let base = rt.define_class(ClassSpec::new("Base").attr("k", Value::Int(1))).unwrap();
        let class = rt.define_class(ClassSpec::new("A").base(base.id())).unwrap();
        let obj = rt.instantiate(&class);

        assert_eq!(rt.get_attr(&obj, "k").unwrap(), Some(Value::Int(1)));
        rt.set_class_member(&base, "k", Value::Int(2)).unwrap();
        assert_eq!(rt.get_attr(&obj, "k").unwrap(), Some(Value::Int(2)));
    }

    #[test]
    fn test_slotted_instance_rejects_unknown_attribute() {
        let rt = Runtime::new();
        let class = rt.define_class(ClassSpec::new("S").slots(["a"])).unwrap();
        let obj = rt.instantiate(&class);

        assert!(rt.set_attr(&obj, "a", Value::Int(1)).unwrap());
        assert!(!rt.set_attr(&obj, "b", Value::Int(1)).unwrap());
        assert_eq!(rt.get_attr(&obj, "a").unwrap(), Some(Value::Int(1)));
    }

    #[test]
    fn test_method_is_not_assignable_on_slotted_instance() {
        let rt = Runtime::new();
        let class = rt
            .define_class(
                ClassSpec::new("S")
                    .slots([])
                    .member(NativeMember::method("m", [], "int", constant(1))),
            )
            .unwrap();
        let obj = rt.instantiate(&class);
        assert!(matches!(
            rt.set_attr(&obj, "m", Value::Int(1)),
            Err(DispatchError::ReadOnlyAttribute { .. })
        ));
    }

    #[test]
    fn test_bound_method_call() {
        let rt = Runtime::new();
        let class = rt
            .define_class(ClassSpec::new("A").member(NativeMember::method("m", [], "int", constant(3))))
            .unwrap();
        let obj = rt.instantiate(&class);
        let bound = rt.get_attr(&obj, "m").unwrap().unwrap();
        assert_eq!(rt.call(&bound, &[]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_static_property_on_class() {
        let rt = Runtime::new();
        let class = rt
            .define_class(ClassSpec::new("A").member(
                NativeMember::property("Count", "int", constant(4)).with_tags(MemberTags::STATIC),
            ))
            .unwrap();
        assert_eq!(
            rt.get_attr(&Value::Class(class), "Count").unwrap(),
            Some(Value::Int(4))
        );
    }

    #[test]
    fn test_plan_attribute_access() {
        let rt = Runtime::new();
        let class = rt
            .define_class(
                ClassSpec::new("A")
                    .attr("plain", Value::Int(1))
                    .member(NativeMember::property("p", "int", constant(1))),
            )
            .unwrap();

        let plain = rt.plan_attribute_access(&class, "plain");
        assert!(plain.always_succeeds);
        assert!(!plain.data_descriptor);
        assert!(plain.is_valid_for(&class));

        let prop = rt.plan_attribute_access(&class, "p");
        assert!(prop.data_descriptor);

        let missing = rt.plan_attribute_access(&class, "nope");
        assert!(missing.slot().is_none());

        rt.set_class_member(&class, "other", Value::None).unwrap();
        assert!(!plain.is_valid_for(&class));
    }

    #[test]
    fn test_lookup_uses_member_cache() {
        let rt = Runtime::new();
        let class = rt.define_class(ClassSpec::new("A").attr("k", Value::Int(1))).unwrap();
        rt.lookup_slot(&class, "k");
        let (hits_before, _, _) = rt.member_cache().stats();
        let resolved = rt.lookup_slot(&class, "k").unwrap();
        let (hits_after, _, _) = rt.member_cache().stats();
        assert_eq!(hits_after, hits_before + 1);
        assert_eq!(resolved.defining_class, class.id());
        assert_eq!(resolved.mro_index, 0);
    }

    #[test]
    fn test_member_names_lists_visible_members() {
        let rt = Runtime::new();
        let class = rt
            .define_class(
                ClassSpec::new("A")
                    .attr("k", Value::Int(1))
                    .member(NativeMember::method("hidden", [], "int", constant(1)).with_tags(MemberTags::SPECIAL_NAME)),
            )
            .unwrap();
        let obj = rt.instantiate(&class);
        rt.set_attr(&obj, "own", Value::Int(1)).unwrap();

        let names = rt.member_names(&obj);
        assert!(names.iter().any(|n| n == "k"));
        assert!(names.iter().any(|n| n == "own"));
        assert!(names.iter().any(|n| n == dunder::CLASS));
        assert!(!names.iter().any(|n| n == "hidden"));
        assert!(names.windows(2).all(|w| w[0] < w[1]));
    }
}
