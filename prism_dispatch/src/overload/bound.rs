//! Callables bound to a receiver.

use crate::error::DispatchResult;
use crate::runtime::Runtime;
use crate::value::Value;

/// A callable with its receiver fixed.
///
/// Calling it passes the receiver ahead of the arguments. Native targets
/// receive it as their first native argument while overload matching
/// considers only the explicit arguments.
#[derive(Debug, Clone)]
pub struct BoundCallable {
    receiver: Value,
    callable: Value,
}

impl BoundCallable {
    pub fn new(receiver: Value, callable: Value) -> Self {
        Self { receiver, callable }
    }

    #[inline]
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    #[inline]
    pub fn callable(&self) -> &Value {
        &self.callable
    }

    pub fn call(&self, runtime: &Runtime, args: &[Value]) -> DispatchResult<Value> {
        match &self.callable {
            Value::Function(target) => target.invoke(runtime, Some(&self.receiver), args),
            other => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(self.receiver.clone());
                full.extend_from_slice(args);
                runtime.call(other, &full)
            }
        }
    }
}
