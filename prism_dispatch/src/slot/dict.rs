//! The `__dict__` slot.

use crate::class::ClassObject;
use crate::error::{DispatchError, DispatchResult};
use crate::runtime::Runtime;
use crate::symbol::dunder;
use crate::value::Value;
use std::sync::Arc;

/// Exposes instance attribute storage, or a read-only view of a class's
/// members when accessed through the class.
#[derive(Debug, Clone, Copy, Default)]
pub struct DictSlot;

impl DictSlot {
    #[inline]
    pub fn name(&self) -> &'static str {
        dunder::DICT
    }

    pub(super) fn get(
        &self,
        runtime: &Runtime,
        instance: Option<&Value>,
        owner: &Arc<ClassObject>,
    ) -> DispatchResult<Value> {
        match instance {
            None => Ok(Value::MemberView(owner.clone())),
            Some(Value::Class(class)) => Ok(Value::MemberView(class.clone())),
            Some(Value::Instance(object)) => Ok(Value::Dict(object.storage_or_create(runtime)?)),
            Some(_) => Err(DispatchError::unsupported(self.name(), "get")),
        }
    }

    pub(super) fn set(&self, instance: Option<&Value>, value: Value) -> DispatchResult<()> {
        match instance {
            Some(Value::Instance(object)) if object.class().has_dict() => match value {
                Value::Dict(storage) => {
                    object.replace_storage(storage);
                    Ok(())
                }
                other => Err(DispatchError::incompatible(format!(
                    "__dict__ must be set to a dictionary, not {:?}",
                    other
                ))),
            },
            Some(Value::Instance(_)) => Err(DispatchError::unsupported(self.name(), "set")),
            _ => Err(DispatchError::read_only(self.name())),
        }
    }

    pub(super) fn delete(&self, runtime: &Runtime, instance: Option<&Value>) -> DispatchResult<()> {
        match instance {
            Some(Value::Instance(object)) => {
                let class = object.class();
                if !class.has_dict() {
                    return Err(DispatchError::unsupported(self.name(), "delete"));
                }
                object.replace_storage(Arc::new(runtime.create_storage(&class)));
                Ok(())
            }
            _ => Err(DispatchError::unsupported(self.name(), "delete")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassSpec;
    use crate::slot::AttributeSlot;

    #[test]
    fn test_instance_dict_created_on_demand() {
        let rt = Runtime::new();
        let class = rt.define_class(ClassSpec::new("A")).unwrap();
        let obj = rt.instantiate(&class);
        let slot = Arc::new(AttributeSlot::Dict(DictSlot));

        let first = slot.try_get(&rt, Some(&obj), &class).unwrap();
        let second = slot.try_get(&rt, Some(&obj), &class).unwrap();
        assert!(first.as_dict().is_some());
        assert!(first.is(&second));
    }

    #[test]
    fn test_class_access_yields_member_view() {
        let rt = Runtime::new();
        let class = rt.define_class(ClassSpec::new("A")).unwrap();
        let slot = Arc::new(AttributeSlot::Dict(DictSlot));
        assert!(matches!(
            slot.try_get(&rt, None, &class).unwrap(),
            Value::MemberView(c) if Arc::ptr_eq(&c, &class)
        ));
    }

    #[test]
    fn test_set_requires_mapping() {
        let rt = Runtime::new();
        let class = rt.define_class(ClassSpec::new("A")).unwrap();
        let obj = rt.instantiate(&class);
        let slot = AttributeSlot::Dict(DictSlot);

        assert!(slot.try_set(&rt, Some(&obj), &class, Value::Int(1)).is_err());

        let fresh = Arc::new(rt.create_storage(&class));
        fresh.set("k", Value::Int(9));
        slot.try_set(&rt, Some(&obj), &class, Value::Dict(fresh)).unwrap();
        assert_eq!(rt.get_attr(&obj, "k").unwrap(), Some(Value::Int(9)));
    }

    #[test]
    fn test_delete_clears_mapping() {
        let rt = Runtime::new();
        let class = rt.define_class(ClassSpec::new("A")).unwrap();
        let obj = rt.instantiate(&class);
        rt.set_attr(&obj, "k", Value::Int(1)).unwrap();

        AttributeSlot::Dict(DictSlot)
            .try_delete(&rt, Some(&obj), &class)
            .unwrap();
        assert_eq!(rt.get_attr(&obj, "k").unwrap(), None);
    }

    #[test]
    fn test_slotted_instance_has_no_dict() {
        let rt = Runtime::new();
        let class = rt
            .define_class(ClassSpec::new("S").slots(["a"]))
            .unwrap();
        let obj = rt.instantiate(&class);
        let slot = Arc::new(AttributeSlot::Dict(DictSlot));
        assert!(slot.try_get(&rt, Some(&obj), &class).is_err());
        assert!(slot.try_delete(&rt, Some(&obj), &class).is_err());
    }
}
