//! Data slots over class-tracked state.
//!
//! `__class__` lives on `object`; `__name__`, `__bases__` and `__mro__` live
//! on the metatype `type`, so class-level lookups reach them with the class
//! as the instance.

use crate::class::{ClassFlags, ClassId, ClassObject};
use crate::error::{DispatchError, DispatchResult};
use crate::runtime::Runtime;
use crate::symbol::{Symbol, dunder};
use crate::value::Value;
use std::sync::Arc;

/// Which piece of state a [`DataSlot`] tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSlotKind {
    /// `__class__`: the class of the instance.
    ClassIdentity,
    /// `__name__` of a class.
    ClassName,
    /// `__bases__` of a class.
    Bases,
    /// `__mro__` of a class.
    Mro,
}

/// A data slot. Gets always succeed; deletes never do.
#[derive(Debug, Clone, Copy)]
pub struct DataSlot {
    kind: DataSlotKind,
}

impl DataSlot {
    pub const fn new(kind: DataSlotKind) -> Self {
        Self { kind }
    }

    #[inline]
    pub fn kind(&self) -> DataSlotKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            DataSlotKind::ClassIdentity => dunder::CLASS,
            DataSlotKind::ClassName => dunder::NAME,
            DataSlotKind::Bases => dunder::BASES,
            DataSlotKind::Mro => dunder::MRO,
        }
    }

    pub(super) fn get(
        &self,
        runtime: &Runtime,
        instance: Option<&Value>,
        owner: &Arc<ClassObject>,
    ) -> Value {
        match self.kind {
            DataSlotKind::ClassIdentity => match instance {
                Some(value) => Value::Class(runtime.class_of(value)),
                None => Value::Class(runtime.builtin(ClassId::TYPE)),
            },
            DataSlotKind::ClassName => Value::Str(target(instance, owner).name().as_str().into()),
            DataSlotKind::Bases => {
                class_tuple(runtime, target(instance, owner).bases().iter().copied())
            }
            DataSlotKind::Mro => class_tuple(runtime, target(instance, owner).mro().iter().copied()),
        }
    }

    pub(super) fn set(
        &self,
        runtime: &Runtime,
        instance: Option<&Value>,
        owner: &Arc<ClassObject>,
        value: Value,
    ) -> DispatchResult<()> {
        match self.kind {
            DataSlotKind::ClassIdentity => {
                let Some(Value::Instance(object)) = instance else {
                    return Err(DispatchError::incompatible(
                        "__class__ assignment only supported for instances of user classes",
                    ));
                };
                let Value::Class(class) = value else {
                    return Err(DispatchError::incompatible(
                        "__class__ must be set to a class",
                    ));
                };
                runtime.reclassify(object, class)
            }
            DataSlotKind::ClassName => {
                let class = target(instance, owner);
                ensure_mutable(class, self.name())?;
                match value {
                    Value::Str(name) => {
                        class.set_name(Symbol::new(&name));
                        Ok(())
                    }
                    _ => Err(DispatchError::incompatible(format!(
                        "can only assign string to {}.__name__",
                        class.name()
                    ))),
                }
            }
            DataSlotKind::Bases => {
                let class = target(instance, owner);
                ensure_mutable(class, self.name())?;
                let bases = value
                    .as_tuple()
                    .filter(|items| !items.is_empty())
                    .ok_or_else(|| {
                        DispatchError::incompatible(format!(
                            "can only assign a non-empty tuple to {}.__bases__",
                            class.name()
                        ))
                    })?
                    .iter()
                    .map(|item| match item {
                        Value::Class(base) => Ok(base.id()),
                        other => Err(DispatchError::incompatible(format!(
                            "{}.__bases__ must contain only classes, not {:?}",
                            class.name(),
                            other
                        ))),
                    })
                    .collect::<DispatchResult<Vec<_>>>()?;
                runtime.set_bases(class, &bases)
            }
            DataSlotKind::Mro => Err(DispatchError::read_only(self.name())),
        }
    }
}

/// The class a class-level data slot applies to.
fn target<'a>(instance: Option<&'a Value>, owner: &'a Arc<ClassObject>) -> &'a Arc<ClassObject> {
    match instance {
        Some(Value::Class(class)) => class,
        _ => owner,
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

fn class_tuple(runtime: &Runtime, ids: impl Iterator<Item = ClassId>) -> Value {
    Value::tuple(ids.filter_map(|id| runtime.class(id)).map(Value::Class))
}
