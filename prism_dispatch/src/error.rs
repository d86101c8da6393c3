//! Dispatch error taxonomy.
//!
//! Every failure surfaced by the engine is synchronous and user visible.
//! A missing attribute is deliberately *not* an error: lookups return
//! `Option`/`bool` and the caller decides how to report it.

use thiserror::Error;

/// Errors produced by linearization, attribute access and call dispatch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// C3 linearization found no total order.
    #[error(
        "cannot create a consistent method resolution order (MRO) for bases {head}{}",
        format_blocking(blocking)
    )]
    InconsistentHierarchy {
        /// First head that could not be placed.
        head: String,
        /// Every other head blocking progress at the time of failure.
        blocking: Vec<String>,
    },

    /// A class would become its own ancestor.
    #[error("a class cannot inherit from itself: '{class}'")]
    Cycle {
        /// Name of the offending class.
        class: String,
    },

    /// A base class id is not registered.
    #[error("unknown class #{0}")]
    UnknownClass(u32),

    /// No candidate signature matched the requested one.
    #[error(
        "no overload of '{name}' accepts ({requested}); candidates: {}",
        available.join(", ")
    )]
    NoMatchingOverload {
        /// Dispatch name.
        name: String,
        /// Requested parameter types.
        requested: String,
        /// Signature of every candidate.
        available: Vec<String>,
    },

    /// The attribute cannot be assigned or deleted.
    #[error("attribute '{name}' is read-only")]
    ReadOnlyAttribute {
        /// Attribute name.
        name: String,
    },

    /// The slot does not support the requested operation.
    #[error("cannot {operation} attribute '{name}'")]
    UnsupportedOperation {
        /// Attribute name.
        name: String,
        /// "get", "set" or "delete".
        operation: &'static str,
    },

    /// An indexed slot was read or deleted while unset.
    #[error("slot '{name}' is used before it is set")]
    UsedBeforeSet {
        /// Slot name.
        name: String,
    },

    /// A value failed a type or cross-compatibility check.
    #[error("{0}")]
    Incompatible(String),

    /// Bases disagree on the fixed instance layout.
    #[error("multiple bases have instance lay-out conflict: {0}")]
    LayoutConflict(String),

    /// The value cannot be invoked.
    #[error("'{type_name}' object is not callable")]
    NotCallable {
        /// Type name of the value.
        type_name: String,
    },

    /// Raised by a native invocation thunk.
    #[error("{0}")]
    Native(String),
}

/// Result alias used across the crate.
pub type DispatchResult<T> = Result<T, DispatchError>;

fn format_blocking(blocking: &[String]) -> String {
    if blocking.is_empty() {
        String::new()
    } else {
        format!(" (blocked by {})", blocking.join(", "))
    }
}

impl DispatchError {
    /// Shorthand for [`DispatchError::ReadOnlyAttribute`].
    pub fn read_only(name: impl Into<String>) -> Self {
        Self::ReadOnlyAttribute { name: name.into() }
    }

    /// Shorthand for [`DispatchError::UnsupportedOperation`].
    pub fn unsupported(name: impl Into<String>, operation: &'static str) -> Self {
        Self::UnsupportedOperation {
            name: name.into(),
            operation,
        }
    }

    /// Shorthand for [`DispatchError::Incompatible`].
    pub fn incompatible(message: impl Into<String>) -> Self {
        Self::Incompatible(message.into())
    }
}
