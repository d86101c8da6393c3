//! The `__weakref__` slot.

use super::AttributeSlot;
use crate::error::{DispatchError, DispatchResult};
use crate::instance::WeakRefRecord;
use crate::symbol::dunder;
use crate::value::Value;
use std::sync::Arc;

/// Weak-reference bookkeeping of weak-referenceable instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeakRefSlot;

impl WeakRefSlot {
    #[inline]
    pub fn name(&self) -> &'static str {
        dunder::WEAKREF
    }

    pub(super) fn get(
        &self,
        this: &Arc<AttributeSlot>,
        instance: Option<&Value>,
    ) -> DispatchResult<Value> {
        match instance {
            None => Ok(Value::Slot(this.clone())),
            Some(Value::Instance(object)) if object.class().is_weakrefable() => Ok(object
                .weakref()
                .map(|record| record.callback)
                .unwrap_or(Value::None)),
            Some(_) => Err(DispatchError::unsupported(self.name(), "get")),
        }
    }

    pub(super) fn set(&self, instance: Option<&Value>, value: Value) -> DispatchResult<()> {
        match instance {
            Some(Value::Instance(object)) if object.class().is_weakrefable() => {
                object.install_weakref(WeakRefRecord { callback: value });
                Ok(())
            }
            _ => Err(DispatchError::unsupported(self.name(), "set")),
        }
    }
}
