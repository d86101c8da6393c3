//! Dynamic values flowing through the dispatch engine.
//!
//! Values are reference counted; the engine never owns or collects them.
//! Scalars compare by value, every heap variant compares by identity.

use crate::class::ClassObject;
use crate::instance::Instance;
use crate::overload::{BoundCallable, CallTarget, ConstructorTarget};
use crate::slot::AttributeSlot;
use crate::storage::InstanceStorage;
use std::fmt;
use std::sync::Arc;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    /// The absent value.
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Tuple(Arc<[Value]>),
    /// A class object.
    Class(Arc<ClassObject>),
    /// An instance of a class.
    Instance(Arc<Instance>),
    /// An instance attribute mapping.
    Dict(Arc<InstanceStorage>),
    /// Read-only view over a class's member mapping.
    MemberView(Arc<ClassObject>),
    /// An attribute slot surfaced as a first-class value.
    Slot(Arc<AttributeSlot>),
    /// A native call target.
    Function(Arc<CallTarget>),
    /// A native constructor.
    Constructor(Arc<ConstructorTarget>),
    /// A callable bound to a receiver.
    Bound(Arc<BoundCallable>),
}

impl Value {
    /// Create a string value.
    #[inline]
    pub fn str(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }

    /// Create a tuple value.
    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_class(&self) -> Option<&Arc<ClassObject>> {
        match self {
            Self::Class(c) => Some(c),
            _ => None,
        }
    }

    #[inline]
    pub fn as_instance(&self) -> Option<&Arc<Instance>> {
        match self {
            Self::Instance(i) => Some(i),
            _ => None,
        }
    }

    #[inline]
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    #[inline]
    pub fn as_dict(&self) -> Option<&Arc<InstanceStorage>> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Identity comparison.
    ///
    /// Scalars are identical when equal; heap values when they are the same
    /// allocation.
    pub fn is(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => Arc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Arc::ptr_eq(a, b),
            (Self::Class(a), Self::Class(b)) => Arc::ptr_eq(a, b),
            (Self::Instance(a), Self::Instance(b)) => Arc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Arc::ptr_eq(a, b),
            (Self::MemberView(a), Self::MemberView(b)) => Arc::ptr_eq(a, b),
            (Self::Slot(a), Self::Slot(b)) => Arc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            (Self::Constructor(a), Self::Constructor(b)) => Arc::ptr_eq(a, b),
            (Self::Bound(a), Self::Bound(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            _ => self.is(other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<Arc<ClassObject>> for Value {
    fn from(class: Arc<ClassObject>) -> Self {
        Self::Class(class)
    }
}

impl From<Arc<Instance>> for Value {
    fn from(instance: Arc<Instance>) -> Self {
        Self::Instance(instance)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::Str(s) => write!(f, "{:?}", s),
            Self::Tuple(items) => {
                let mut t = f.debug_tuple("");
                for item in items.iter() {
                    t.field(item);
                }
                t.finish()
            }
            Self::Class(c) => write!(f, "<class '{}'>", c.name()),
            Self::Instance(i) => write!(f, "<{} object>", i.class().name()),
            Self::Dict(d) => write!(f, "<dict len={}>", d.len()),
            Self::MemberView(c) => write!(f, "<mappingproxy of '{}'>", c.name()),
            Self::Slot(s) => write!(f, "<{} '{}'>", s.kind_name(), s.name()),
            Self::Function(t) => write!(f, "<built-in function {}>", t.name()),
            Self::Constructor(c) => write!(f, "<constructor {}>", c.target().name()),
            Self::Bound(b) => write!(f, "<bound {:?} of {:?}>", b.callable(), b.receiver()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_identity() {
        assert!(Value::Int(3).is(&Value::Int(3)));
        assert!(!Value::Int(3).is(&Value::Float(3.0)));
        assert!(Value::None.is(&Value::None));
    }

    #[test]
    fn test_strings_compare_by_content_but_not_identity() {
        let a = Value::str("abc");
        let b = Value::str("abc");
        assert_eq!(a, b);
        assert!(!a.is(&b));
        assert!(a.is(&a.clone()));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from(7i64).as_int(), Some(7));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert!(Value::None.as_int().is_none());
        let t = Value::tuple([Value::Int(1), Value::Int(2)]);
        assert_eq!(t.as_tuple().map(|t| t.len()), Some(2));
    }
}
