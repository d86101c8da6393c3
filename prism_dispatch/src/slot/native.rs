//! Slots backed by native call targets.
//!
//! Methods and indexers bind to the instance they are read through.
//! Properties, fields and events invoke their getter. Constructors always
//! surface the constructor itself.

use super::AttributeSlot;
use crate::class::ClassObject;
use crate::error::{DispatchError, DispatchResult};
use crate::overload::{BoundCallable, CallTarget, ConstructorTarget};
use crate::runtime::Runtime;
use crate::symbol::Symbol;
use crate::value::Value;
use std::sync::Arc;

/// What a native slot exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeSlotKind {
    Method,
    Property,
    Field,
    Indexer,
    Event,
    Constructor,
}

impl NativeSlotKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Method => "method_descriptor",
            Self::Property => "property",
            Self::Field => "field",
            Self::Indexer => "indexer",
            Self::Event => "event",
            Self::Constructor => "constructor",
        }
    }
}

bitflags::bitflags! {
    /// Behavior flags of native slots.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NativeSlotFlags: u8 {
        /// Class-level reads invoke the getter instead of returning the slot.
        const ALWAYS_DATA = 1 << 0;
        /// Binds to the owning class instead of the instance.
        const CLASS_METHOD = 1 << 1;
        /// No receiver at all.
        const STATIC = 1 << 2;
        /// Not externally visible.
        const HIDDEN = 1 << 3;
    }
}

/// A slot over native callables.
#[derive(Debug)]
pub struct NativeCallableSlot {
    name: Symbol,
    kind: NativeSlotKind,
    flags: NativeSlotFlags,
    /// Method target, or getter for properties, fields and events.
    getter: Option<Arc<CallTarget>>,
    setter: Option<Arc<CallTarget>>,
    deleter: Option<Arc<CallTarget>>,
    constructor: Option<Arc<ConstructorTarget>>,
    doc: Option<Arc<str>>,
}

impl NativeCallableSlot {
    /// A method slot; `kind` is [`NativeSlotKind::Method`].
    pub fn method(name: impl Into<Symbol>, target: Arc<CallTarget>, flags: NativeSlotFlags) -> Self {
        Self::callable(name, NativeSlotKind::Method, target, flags)
    }

    /// A binding slot of the given kind (method or indexer).
    pub fn callable(
        name: impl Into<Symbol>,
        kind: NativeSlotKind,
        target: Arc<CallTarget>,
        flags: NativeSlotFlags,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            flags,
            getter: Some(target),
            setter: None,
            deleter: None,
            constructor: None,
            doc: None,
        }
    }

    /// A property, field or event slot.
    pub fn accessor(
        name: impl Into<Symbol>,
        kind: NativeSlotKind,
        getter: Option<Arc<CallTarget>>,
        setter: Option<Arc<CallTarget>>,
        deleter: Option<Arc<CallTarget>>,
        flags: NativeSlotFlags,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            flags,
            getter,
            setter,
            deleter,
            constructor: None,
            doc: None,
        }
    }

    /// A `__new__` slot.
    pub fn constructor(name: impl Into<Symbol>, constructor: Arc<ConstructorTarget>) -> Self {
        Self {
            name: name.into(),
            kind: NativeSlotKind::Constructor,
            flags: NativeSlotFlags::STATIC,
            getter: None,
            setter: None,
            deleter: None,
            constructor: Some(constructor),
            doc: None,
        }
    }

    pub fn with_doc(mut self, doc: Option<Arc<str>>) -> Self {
        self.doc = doc;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline]
    pub fn kind(&self) -> NativeSlotKind {
        self.kind
    }

    #[inline]
    pub fn flags(&self) -> NativeSlotFlags {
        self.flags
    }

    #[inline]
    pub fn doc(&self) -> Option<&Arc<str>> {
        self.doc.as_ref()
    }

    /// The method target or getter.
    #[inline]
    pub fn target(&self) -> Option<&Arc<CallTarget>> {
        self.getter.as_ref()
    }

    #[inline]
    fn binds(&self) -> bool {
        matches!(self.kind, NativeSlotKind::Method | NativeSlotKind::Indexer)
    }

    pub(super) fn is_data_descriptor(&self) -> bool {
        matches!(
            self.kind,
            NativeSlotKind::Property | NativeSlotKind::Field | NativeSlotKind::Event
        ) || self.flags.contains(NativeSlotFlags::ALWAYS_DATA)
    }

    pub(super) fn always_succeeds_on_get(&self) -> bool {
        match self.kind {
            NativeSlotKind::Method | NativeSlotKind::Indexer => self.getter.is_some(),
            NativeSlotKind::Constructor => self.constructor.is_some(),
            _ => false,
        }
    }

    fn unsupported(&self, operation: &'static str) -> DispatchError {
        DispatchError::unsupported(self.name.as_str(), operation)
    }

    // =========================================================================
    // Descriptor Protocol
    // =========================================================================

    pub(super) fn get(
        &self,
        this: &Arc<AttributeSlot>,
        runtime: &Runtime,
        instance: Option<&Value>,
        owner: &Arc<ClassObject>,
    ) -> DispatchResult<Value> {
        if self.kind == NativeSlotKind::Constructor {
            return match &self.constructor {
                Some(ctor) => Ok(Value::Constructor(ctor.clone())),
                None => Err(self.unsupported("get")),
            };
        }

        let Some(getter) = &self.getter else {
            return Err(self.unsupported("get"));
        };

        if self.binds() {
            let function = Value::Function(getter.clone());
            if self.flags.contains(NativeSlotFlags::STATIC) {
                return Ok(function);
            }
            if self.flags.contains(NativeSlotFlags::CLASS_METHOD) {
                let receiver = match instance {
                    Some(Value::Class(class)) => Value::Class(class.clone()),
                    _ => Value::Class(owner.clone()),
                };
                return Ok(bind(receiver, function));
            }
            return Ok(match instance {
                Some(receiver) => bind(receiver.clone(), function),
                None => Value::Slot(this.clone()),
            });
        }

        if self.flags.contains(NativeSlotFlags::STATIC) {
            return getter.call(runtime, &[]);
        }
        match instance {
            Some(receiver) => getter.invoke(runtime, Some(receiver), &[]),
            None if self.flags.contains(NativeSlotFlags::ALWAYS_DATA) => getter.call(runtime, &[]),
            None => Ok(Value::Slot(this.clone())),
        }
    }

    pub(super) fn set(
        &self,
        runtime: &Runtime,
        instance: Option<&Value>,
        value: Value,
    ) -> DispatchResult<()> {
        let Some(setter) = &self.setter else {
            return Err(DispatchError::read_only(self.name.as_str()));
        };
        let receiver = if self.flags.contains(NativeSlotFlags::STATIC) {
            None
        } else {
            Some(instance.ok_or_else(|| DispatchError::read_only(self.name.as_str()))?)
        };
        setter.invoke(runtime, receiver, &[value]).map(|_| ())
    }

    pub(super) fn delete(&self, runtime: &Runtime, instance: Option<&Value>) -> DispatchResult<()> {
        let Some(deleter) = &self.deleter else {
            return Err(self.unsupported("delete"));
        };
        let receiver = if self.flags.contains(NativeSlotFlags::STATIC) {
            None
        } else {
            Some(instance.ok_or_else(|| self.unsupported("delete"))?)
        };
        deleter.invoke(runtime, receiver, &[]).map(|_| ())
    }

    /// Call the slot read through its class.
    pub(super) fn call(&self, runtime: &Runtime, args: &[Value]) -> DispatchResult<Value> {
        match (self.kind, &self.constructor, &self.getter) {
            (NativeSlotKind::Constructor, Some(ctor), _) => ctor.call(runtime, args),
            (NativeSlotKind::Method | NativeSlotKind::Indexer, _, Some(target)) => {
                if self.flags.contains(NativeSlotFlags::STATIC) {
                    return target.call(runtime, args);
                }
                match args.split_first() {
                    Some((receiver, rest)) => target.invoke(runtime, Some(receiver), rest),
                    None => Err(DispatchError::incompatible(format!(
                        "unbound method {}() needs an argument",
                        self.name
                    ))),
                }
            }
            _ => Err(DispatchError::NotCallable {
                type_name: self.kind.name().to_owned(),
            }),
        }
    }
}

#[inline]
fn bind(receiver: Value, callable: Value) -> Value {
    Value::Bound(Arc::new(BoundCallable::new(receiver, callable)))
}
