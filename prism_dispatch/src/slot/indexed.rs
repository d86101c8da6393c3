//! `__slots__` entries.

use super::AttributeSlot;
use crate::class::ClassId;
use crate::error::{DispatchError, DispatchResult};
use crate::instance::Instance;
use crate::storage::ValueCell;
use crate::symbol::Symbol;
use crate::value::Value;
use std::sync::Arc;

/// Reads and writes one cell of an instance's fixed slot array.
#[derive(Debug, Clone)]
pub struct IndexedSlot {
    name: Symbol,
    owner: ClassId,
    index: usize,
}

impl IndexedSlot {
    pub fn new(name: impl Into<Symbol>, owner: ClassId, index: usize) -> Self {
        Self {
            name: name.into(),
            owner,
            index,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    fn cell<'a>(&self, object: &'a Instance) -> DispatchResult<&'a ValueCell> {
        let class = object.class();
        if !class.is_subclass_of(self.owner) {
            return Err(DispatchError::incompatible(format!(
                "descriptor '{}' does not apply to a '{}' object",
                self.name,
                class.name()
            )));
        }
        object.slot_cell(self.index).ok_or_else(|| DispatchError::UsedBeforeSet {
            name: self.name.to_string(),
        })
    }

    fn instance<'a>(&self, instance: Option<&'a Value>) -> DispatchResult<&'a Arc<Instance>> {
        match instance {
            Some(Value::Instance(object)) => Ok(object),
            _ => Err(DispatchError::incompatible(format!(
                "descriptor '{}' needs an instance",
                self.name
            ))),
        }
    }

    pub(super) fn get(
        &self,
        this: &Arc<AttributeSlot>,
        instance: Option<&Value>,
    ) -> DispatchResult<Value> {
        if instance.is_none() {
            return Ok(Value::Slot(this.clone()));
        }
        self.cell(self.instance(instance)?)?
            .get()
            .ok_or_else(|| DispatchError::UsedBeforeSet {
                name: self.name.to_string(),
            })
    }

    pub(super) fn set(&self, instance: Option<&Value>, value: Value) -> DispatchResult<()> {
        self.cell(self.instance(instance)?)?.set(value);
        Ok(())
    }

    pub(super) fn delete(&self, instance: Option<&Value>) -> DispatchResult<()> {
        match self.cell(self.instance(instance)?)?.take() {
            Some(_) => Ok(()),
            None => Err(DispatchError::UsedBeforeSet {
                name: self.name.to_string(),
            }),
        }
    }
}
