//! Instances of user-defined and native classes.
//!
//! An instance carries:
//! - its class, swappable at runtime through `__class__` assignment,
//! - an optional attribute mapping ([`InstanceStorage`]) created on first
//!   write when the class supports one,
//! - a fixed array of `__slots__` cells sized by the class layout,
//! - an optional weak-reference record.
//!
//! # Memory Layout
//!
//! ```text
//! Instance
//! ├── class: RwLock<Arc<ClassObject>>
//! ├── storage: RwLock<Option<Arc<InstanceStorage>>>   (lazy)
//! ├── slots: [ValueCell; class.slot_count()]          (fixed)
//! └── weakref: Mutex<Option<WeakRefRecord>>
//! ```

use crate::class::ClassObject;
use crate::error::{DispatchError, DispatchResult};
use crate::runtime::Runtime;
use crate::storage::{InstanceStorage, ValueCell};
use crate::value::Value;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Weak-reference bookkeeping installed through `__weakref__`.
#[derive(Debug, Clone)]
pub struct WeakRefRecord {
    /// Callback invoked when the referent dies; `None` when absent.
    pub callback: Value,
}

/// An object instance.
pub struct Instance {
    class: RwLock<Arc<ClassObject>>,
    storage: RwLock<Option<Arc<InstanceStorage>>>,
    slots: Box<[ValueCell]>,
    weakref: Mutex<Option<WeakRefRecord>>,
}

impl Instance {
    /// Allocate an instance of `class` with every slot unset and no storage.
    pub fn new(class: Arc<ClassObject>) -> Self {
        let slots = (0..class.slot_count()).map(|_| ValueCell::unset()).collect();
        Self {
            class: RwLock::new(class),
            storage: RwLock::new(None),
            slots,
            weakref: Mutex::new(None),
        }
    }

    // =========================================================================
    // Class
    // =========================================================================

    /// The current class.
    #[inline]
    pub fn class(&self) -> Arc<ClassObject> {
        self.class.read().clone()
    }

    /// Replace the class. Callers validate layout compatibility first.
    pub(crate) fn set_class(&self, class: Arc<ClassObject>) {
        *self.class.write() = class;
    }

    // =========================================================================
    // Attribute Storage
    // =========================================================================

    /// The attribute mapping, if one has been created.
    #[inline]
    pub fn storage(&self) -> Option<Arc<InstanceStorage>> {
        self.storage.read().clone()
    }

    /// The attribute mapping, creating it from the class layout on demand.
    pub fn storage_or_create(&self, runtime: &Runtime) -> DispatchResult<Arc<InstanceStorage>> {
        if let Some(storage) = self.storage() {
            return Ok(storage);
        }
        let class = self.class();
        if !class.has_dict() {
            return Err(DispatchError::unsupported(
                crate::symbol::dunder::DICT,
                "create",
            ));
        }
        let mut guard = self.storage.write();
        // Another writer may have won while we waited.
        if let Some(storage) = guard.as_ref() {
            return Ok(storage.clone());
        }
        let storage = Arc::new(runtime.create_storage(&class));
        *guard = Some(storage.clone());
        Ok(storage)
    }

    /// Replace the attribute mapping wholesale.
    pub(crate) fn replace_storage(&self, storage: Arc<InstanceStorage>) {
        *self.storage.write() = Some(storage);
    }

    // =========================================================================
    // Fixed Slots
    // =========================================================================

    /// The `__slots__` cell at `index`.
    #[inline]
    pub fn slot_cell(&self, index: usize) -> Option<&ValueCell> {
        self.slots.get(index)
    }

    /// Number of fixed slots.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    // =========================================================================
    // Weak References
    // =========================================================================

    /// The registered weak-reference record.
    pub fn weakref(&self) -> Option<WeakRefRecord> {
        self.weakref.lock().clone()
    }

    /// Install a new weak-reference record, replacing any previous one.
    pub(crate) fn install_weakref(&self, record: WeakRefRecord) {
        *self.weakref.lock() = Some(record);
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class().name())
            .field("slots", &self.slots)
            .field("storage", &self.storage())
            .finish()
    }
}
