//! Attribute slots.
//!
//! Every entry of a class's member mapping is an [`AttributeSlot`]: a closed
//! set of descriptor kinds sharing one get/set/delete protocol.
//!
//! | Variant    | Data descriptor        | Get never fails       |
//! |------------|------------------------|-----------------------|
//! | `Data`     | yes                    | yes                   |
//! | `Dict`     | yes                    | no                    |
//! | `WeakRef`  | yes                    | no                    |
//! | `User`     | if `__set__`/`__delete__` | if no `__get__`    |
//! | `Indexed`  | yes                    | no                    |
//! | `Native`   | properties/fields/events | methods/constructors |
//!
//! Data descriptors shadow instance storage on lookup; non-data descriptors
//! are shadowed by it.

pub mod data;
pub mod dict;
pub mod indexed;
pub mod native;
pub mod user;
pub mod weakref;

pub use data::{DataSlot, DataSlotKind};
pub use dict::DictSlot;
pub use indexed::IndexedSlot;
pub use native::{NativeCallableSlot, NativeSlotFlags, NativeSlotKind};
pub use user::UserDescriptorSlot;
pub use weakref::WeakRefSlot;

use crate::class::ClassObject;
use crate::error::{DispatchError, DispatchResult};
use crate::runtime::Runtime;
use crate::value::Value;
use std::sync::Arc;

/// A descriptor stored in a class's member mapping.
#[derive(Debug)]
pub enum AttributeSlot {
    /// Class-tracked state such as `__class__` or `__mro__`.
    Data(DataSlot),
    /// `__dict__`.
    Dict(DictSlot),
    /// `__weakref__`.
    WeakRef(WeakRefSlot),
    /// An arbitrary value, possibly implementing the descriptor protocol.
    User(UserDescriptorSlot),
    /// One `__slots__` entry.
    Indexed(IndexedSlot),
    /// Native methods, properties, fields, indexers, events, constructors.
    Native(NativeCallableSlot),
}

impl AttributeSlot {
    /// Get through this slot.
    ///
    /// `instance` is the object the attribute was looked up on, or `None`
    /// for access through the class `owner`.
    pub fn try_get(
        self: &Arc<Self>,
        runtime: &Runtime,
        instance: Option<&Value>,
        owner: &Arc<ClassObject>,
    ) -> DispatchResult<Value> {
        match &**self {
            Self::Data(slot) => Ok(slot.get(runtime, instance, owner)),
            Self::Dict(slot) => slot.get(runtime, instance, owner),
            Self::WeakRef(slot) => slot.get(self, instance),
            Self::User(slot) => slot.get(runtime, instance, owner),
            Self::Indexed(slot) => slot.get(self, instance),
            Self::Native(slot) => slot.get(self, runtime, instance, owner),
        }
    }

    /// Set through this slot.
    pub fn try_set(
        &self,
        runtime: &Runtime,
        instance: Option<&Value>,
        owner: &Arc<ClassObject>,
        value: Value,
    ) -> DispatchResult<()> {
        match self {
            Self::Data(slot) => slot.set(runtime, instance, owner, value),
            Self::Dict(slot) => slot.set(instance, value),
            Self::WeakRef(slot) => slot.set(instance, value),
            Self::User(slot) => slot.set(runtime, instance, value),
            Self::Indexed(slot) => slot.set(instance, value),
            Self::Native(slot) => slot.set(runtime, instance, value),
        }
    }

    /// Delete through this slot.
    pub fn try_delete(
        &self,
        runtime: &Runtime,
        instance: Option<&Value>,
        _owner: &Arc<ClassObject>,
    ) -> DispatchResult<()> {
        match self {
            Self::Data(slot) => Err(DispatchError::read_only(slot.name())),
            Self::Dict(slot) => slot.delete(runtime, instance),
            Self::WeakRef(slot) => Err(DispatchError::unsupported(slot.name(), "delete")),
            Self::User(slot) => slot.delete(runtime, instance),
            Self::Indexed(slot) => slot.delete(instance),
            Self::Native(slot) => slot.delete(runtime, instance),
        }
    }

    /// Whether this slot shadows instance storage.
    pub fn is_data_descriptor(&self, runtime: &Runtime) -> bool {
        match self {
            Self::Data(_) | Self::Dict(_) | Self::WeakRef(_) | Self::Indexed(_) => true,
            Self::User(slot) => slot.is_data_descriptor(runtime),
            Self::Native(slot) => slot.is_data_descriptor(),
        }
    }

    /// Whether `try_get` can never fail.
    pub fn always_succeeds_on_get(&self, runtime: &Runtime) -> bool {
        match self {
            Self::Data(_) => true,
            Self::Dict(_) | Self::WeakRef(_) | Self::Indexed(_) => false,
            Self::User(slot) => slot.always_succeeds_on_get(runtime),
            Self::Native(slot) => slot.always_succeeds_on_get(),
        }
    }

    /// Attribute name the slot was created for.
    pub fn name(&self) -> &str {
        match self {
            Self::Data(slot) => slot.name(),
            Self::Dict(slot) => slot.name(),
            Self::WeakRef(slot) => slot.name(),
            Self::User(slot) => slot.name(),
            Self::Indexed(slot) => slot.name(),
            Self::Native(slot) => slot.name(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Data(_) | Self::Dict(_) | Self::WeakRef(_) => "getset_descriptor",
            Self::User(_) => "user_descriptor",
            Self::Indexed(_) => "member_descriptor",
            Self::Native(slot) => slot.kind().name(),
        }
    }

    /// Listed by `member_names`.
    pub fn is_visible(&self) -> bool {
        match self {
            Self::Native(slot) => !slot.flags().contains(NativeSlotFlags::HIDDEN),
            _ => true,
        }
    }

    /// Call the slot as an unbound value.
    pub fn call(self: &Arc<Self>, runtime: &Runtime, args: &[Value]) -> DispatchResult<Value> {
        match &**self {
            Self::Native(slot) => slot.call(runtime, args),
            Self::User(slot) => runtime.call(slot.value(), args),
            other => Err(DispatchError::NotCallable {
                type_name: other.kind_name().to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        let data = AttributeSlot::Data(DataSlot::new(DataSlotKind::Mro));
        assert_eq!(data.kind_name(), "getset_descriptor");
        assert_eq!(data.name(), "__mro__");

        let indexed = AttributeSlot::Indexed(IndexedSlot::new("x", crate::class::ClassId::OBJECT, 0));
        assert_eq!(indexed.kind_name(), "member_descriptor");
        assert!(indexed.is_visible());
    }

    #[test]
    fn test_fixed_variants_are_data_descriptors() {
        let rt = Runtime::new();
        let slots = [
            AttributeSlot::Data(DataSlot::new(DataSlotKind::ClassIdentity)),
            AttributeSlot::Dict(DictSlot),
            AttributeSlot::WeakRef(WeakRefSlot),
            AttributeSlot::Indexed(IndexedSlot::new("x", crate::class::ClassId::OBJECT, 0)),
        ];
        for slot in slots {
            assert!(slot.is_data_descriptor(&rt), "{}", slot.name());
        }
    }

    #[test]
    fn test_non_callable_slot() {
        let rt = Runtime::new();
        let slot = Arc::new(AttributeSlot::Dict(DictSlot));
        assert!(matches!(
            slot.call(&rt, &[]),
            Err(DispatchError::NotCallable { .. })
        ));
    }
}
