//! Constructor redirection.
//!
//! `__new__` receives the class being constructed as its first argument.
//! Native constructors do not expect it, so a [`ConstructorTarget`] drops
//! that argument before forwarding to the wrapped [`CallTarget`].

use super::{CallTarget, TypeSig};
use crate::error::{DispatchError, DispatchResult};
use crate::runtime::Runtime;
use crate::symbol::Symbol;
use crate::value::Value;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// A call target invoked as a constructor.
pub struct ConstructorTarget {
    target: Arc<CallTarget>,
    narrowed: Mutex<FxHashMap<TypeSig, Arc<ConstructorTarget>>>,
}

impl ConstructorTarget {
    pub fn new(target: Arc<CallTarget>) -> Self {
        Self {
            target,
            narrowed: Mutex::new(FxHashMap::default()),
        }
    }

    #[inline]
    pub fn target(&self) -> &Arc<CallTarget> {
        &self.target
    }

    /// Narrow to the constructors accepting `requested`, class excluded.
    pub fn resolve(
        &self,
        runtime: &Runtime,
        requested: &[Symbol],
    ) -> DispatchResult<Arc<ConstructorTarget>> {
        let mut cache = self.narrowed.lock();
        if let Some(hit) = cache.get(requested) {
            return Ok(hit.clone());
        }
        let narrowed = Arc::new(ConstructorTarget::new(
            self.target.resolve(runtime, requested)?,
        ));
        cache.insert(requested.iter().cloned().collect(), narrowed.clone());
        Ok(narrowed)
    }

    /// Invoke with the owning class as `args[0]`.
    pub fn call(&self, runtime: &Runtime, args: &[Value]) -> DispatchResult<Value> {
        match args.split_first() {
            Some((Value::Class(_), rest)) => self.target.call(runtime, rest),
            _ => Err(DispatchError::incompatible(format!(
                "{}() needs a class as its first argument",
                self.target.name()
            ))),
        }
    }
}

impl fmt::Debug for ConstructorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorTarget")
            .field("target", &self.target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassId;
    use crate::overload::NativeSignature;

    fn point_ctor() -> ConstructorTarget {
        let target = CallTarget::new(
            "__new__",
            [
                NativeSignature::new(
                    ["int", "int"],
                    "void",
                    Arc::new(|_, args: &[Value]| Ok(Value::tuple(args.iter().cloned()))),
                ),
                NativeSignature::new([], "void", Arc::new(|_, _| Ok(Value::tuple([])))),
            ],
        );
        ConstructorTarget::new(Arc::new(target))
    }

    #[test]
    fn test_class_argument_is_dropped() {
        let rt = Runtime::new();
        let ctor = point_ctor();
        let class = Value::Class(rt.builtin(ClassId::OBJECT));
        let out = ctor
            .call(&rt, &[class, Value::Int(1), Value::Int(2)])
            .unwrap();
        assert_eq!(out, Value::tuple([Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn test_missing_class_argument() {
        let rt = Runtime::new();
        assert!(matches!(
            point_ctor().call(&rt, &[Value::Int(1)]),
            Err(DispatchError::Incompatible(_))
        ));
    }

    #[test]
    fn test_narrowed_constructor_is_memoized() {
        let rt = Runtime::new();
        let ctor = point_ctor();
        let sig: TypeSig = [Symbol::new("int"), Symbol::new("int")].into_iter().collect();
        let a = ctor.resolve(&rt, &sig).unwrap();
        let b = ctor.resolve(&rt, &sig).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.target().candidates().len(), 1);
    }
}
