//! Slots wrapping arbitrary values.
//!
//! A wrapped value participates in the descriptor protocol when its class
//! defines `__get__`, `__set__` or `__delete__`. Which of those exist is
//! cached per (class, version) of the wrapped value, so redefining a
//! protocol member on that class takes effect on the next access.

use crate::class::{ClassId, ClassObject};
use crate::error::{DispatchError, DispatchResult};
use crate::runtime::Runtime;
use crate::slot::AttributeSlot;
use crate::symbol::{Symbol, dunder};
use crate::value::Value;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Protocol {
    class: Arc<ClassObject>,
    version: u64,
    get: Option<Arc<AttributeSlot>>,
    set: Option<Arc<AttributeSlot>>,
    delete: Option<Arc<AttributeSlot>>,
}

impl Protocol {
    fn is_current(&self, class: &ClassObject) -> bool {
        self.class.id() == class.id() && self.version == class.version()
    }
}

/// A slot holding a plain value.
#[derive(Debug)]
pub struct UserDescriptorSlot {
    name: Symbol,
    value: Value,
    protocol: Mutex<Option<Protocol>>,
}

impl UserDescriptorSlot {
    pub fn new(name: impl Into<Symbol>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            protocol: Mutex::new(None),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The wrapped value.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Class id and version the protocol cache was computed against.
    pub fn cached_against(&self) -> Option<(ClassId, u64)> {
        self.protocol
            .lock()
            .as_ref()
            .map(|p| (p.class.id(), p.version))
    }

    fn protocol(&self, runtime: &Runtime) -> Protocol {
        let class = runtime.class_of(&self.value);
        let mut cached = self.protocol.lock();
        if let Some(protocol) = cached.as_ref().filter(|p| p.is_current(&class)) {
            return protocol.clone();
        }

        let lookup = |name: &str| runtime.lookup_slot(&class, name).map(|r| r.slot);
        let protocol = Protocol {
            version: class.version(),
            get: lookup(dunder::GET),
            set: lookup(dunder::SET),
            delete: lookup(dunder::DELETE),
            class,
        };
        tracing::trace!(
            name = %self.name,
            class = %protocol.class.name(),
            version = protocol.version,
            "descriptor protocol refreshed"
        );
        *cached = Some(protocol.clone());
        protocol
    }

    /// Call a protocol member with the wrapped value as receiver.
    fn invoke(
        &self,
        runtime: &Runtime,
        protocol: &Protocol,
        member: &Arc<AttributeSlot>,
        args: &[Value],
    ) -> DispatchResult<Value> {
        let bound = member.try_get(runtime, Some(&self.value), &protocol.class)?;
        runtime.call(&bound, args)
    }

    pub(super) fn get(
        &self,
        runtime: &Runtime,
        instance: Option<&Value>,
        owner: &Arc<ClassObject>,
    ) -> DispatchResult<Value> {
        let protocol = self.protocol(runtime);
        match &protocol.get {
            Some(get) => self.invoke(
                runtime,
                &protocol,
                get,
                &[
                    instance.cloned().unwrap_or(Value::None),
                    Value::Class(owner.clone()),
                ],
            ),
            None => Ok(self.value.clone()),
        }
    }

    pub(super) fn set(
        &self,
        runtime: &Runtime,
        instance: Option<&Value>,
        value: Value,
    ) -> DispatchResult<()> {
        let protocol = self.protocol(runtime);
        match &protocol.set {
            Some(set) => self
                .invoke(
                    runtime,
                    &protocol,
                    set,
                    &[instance.cloned().unwrap_or(Value::None), value],
                )
                .map(|_| ()),
            None => Err(DispatchError::read_only(self.name())),
        }
    }

    pub(super) fn delete(&self, runtime: &Runtime, instance: Option<&Value>) -> DispatchResult<()> {
        let protocol = self.protocol(runtime);
        match &protocol.delete {
            Some(delete) => self
                .invoke(
                    runtime,
                    &protocol,
                    delete,
                    &[instance.cloned().unwrap_or(Value::None)],
                )
                .map(|_| ()),
            None => Err(DispatchError::unsupported(self.name(), "delete")),
        }
    }

    pub(super) fn is_data_descriptor(&self, runtime: &Runtime) -> bool {
        let protocol = self.protocol(runtime);
        protocol.set.is_some() || protocol.delete.is_some()
    }

    pub(super) fn always_succeeds_on_get(&self, runtime: &Runtime) -> bool {
        self.protocol(runtime).get.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassId, ClassSpec};
    use crate::native::NativeMember;
    use crate::overload::{CallTarget, NativeSignature};
    use crate::slot::{NativeCallableSlot, NativeSlotFlags};

    fn user(value: Value) -> Arc<AttributeSlot> {
        Arc::new(AttributeSlot::User(UserDescriptorSlot::new("attr", value)))
    }

    #[test]
    fn test_plain_value_returned_unchanged() {
        let rt = Runtime::new();
        let owner = rt.builtin(ClassId::OBJECT);
        let slot = user(Value::Int(5));

        assert_eq!(slot.try_get(&rt, None, &owner).unwrap(), Value::Int(5));
        assert!(slot.always_succeeds_on_get(&rt));
        assert!(!slot.is_data_descriptor(&rt));
        assert!(matches!(
            slot.try_set(&rt, None, &owner, Value::Int(1)),
            Err(DispatchError::ReadOnlyAttribute { .. })
        ));
        assert!(matches!(
            slot.try_delete(&rt, None, &owner),
            Err(DispatchError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_get_protocol_is_delegated() {
        let rt = Runtime::new();
        let desc_class = rt
            .define_class(ClassSpec::new("Desc").member(NativeMember::method(
                "__get__",
                ["object", "type"],
                "object",
                Arc::new(|_, args: &[Value]| {
                    // args: [self, instance, owner]
                    Ok(Value::tuple([Value::str("got"), args[1].clone()]))
                }),
            )))
            .unwrap();
        let owner = rt.define_class(ClassSpec::new("Owner")).unwrap();
        let slot = user(rt.instantiate(&desc_class));

        let out = slot.try_get(&rt, Some(&Value::Int(3)), &owner).unwrap();
        assert_eq!(out, Value::tuple([Value::str("got"), Value::Int(3)]));
        assert!(!slot.always_succeeds_on_get(&rt));
        assert!(!slot.is_data_descriptor(&rt));
    }

    #[test]
    fn test_protocol_cache_follows_class_version() {
        let rt = Runtime::new();
        let desc_class = rt.define_class(ClassSpec::new("Desc")).unwrap();
        let owner = rt.define_class(ClassSpec::new("Owner")).unwrap();
        let slot = user(rt.instantiate(&desc_class));
        let AttributeSlot::User(inner) = &*slot else {
            unreachable!()
        };

        assert!(!slot.is_data_descriptor(&rt));
        let before = inner.cached_against().unwrap();

        let setter = CallTarget::new(
            dunder::SET,
            [NativeSignature::new(
                ["object", "object"],
                "void",
                Arc::new(|_, _| Ok(Value::None)),
            )],
        );
        rt.set_class_member(
            &desc_class,
            dunder::SET,
            Value::Slot(Arc::new(AttributeSlot::Native(NativeCallableSlot::method(
                dunder::SET,
                Arc::new(setter),
                NativeSlotFlags::empty(),
            )))),
        )
        .unwrap();

        assert!(slot.is_data_descriptor(&rt));
        let after = inner.cached_against().unwrap();
        assert_eq!(before.0, after.0);
        assert!(after.1 > before.1);
        slot.try_set(&rt, None, &owner, Value::Int(1)).unwrap();
    }
}
