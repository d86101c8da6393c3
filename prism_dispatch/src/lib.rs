//! Member resolution and call dispatch for a dynamic object model.
//!
//! This crate provides:
//! - C3 linearization of class hierarchies (`class::mro`)
//! - Class objects, definition and base reassignment (`class`)
//! - The attribute slot protocol: data, `__dict__`, `__weakref__`, user
//!   descriptors, `__slots__` entries and native members (`slot`)
//! - Versioned per-instance attribute storage (`storage`)
//! - Exact-signature overload resolution with memoization (`overload`)
//! - Naming and operator classification of native members (`native`)
//! - The attribute lookup protocol and its member cache
//!   (`attribute`, `member_cache`)
//!
//! Everything hangs off an explicit [`Runtime`]:
//!
//! ```
//! use prism_dispatch::{ClassSpec, Runtime, Value};
//!
//! let runtime = Runtime::new();
//! let point = runtime.define_class(ClassSpec::new("Point").init_attrs(["x", "y"])).unwrap();
//! let p = runtime.instantiate(&point);
//! runtime.set_attr(&p, "x", Value::Int(1)).unwrap();
//! assert_eq!(runtime.get_attr(&p, "x").unwrap(), Some(Value::Int(1)));
//! ```

pub mod attribute;
pub mod class;
pub mod config;
pub mod error;
pub mod instance;
pub mod member_cache;
pub mod native;
pub mod overload;
pub mod runtime;
pub mod slot;
pub mod storage;
pub mod symbol;
pub mod value;

// Re-export commonly used items
pub use attribute::{AccessPlan, ResolvedSlot};
pub use class::{ClassFlags, ClassId, ClassLookup, ClassObject, ClassSpec, linearize};
pub use config::DispatchConfig;
pub use error::{DispatchError, DispatchResult};
pub use instance::Instance;
pub use member_cache::MemberCache;
pub use native::{
    MemberKind, MemberProvider, MemberTags, NameResolver, NativeMember, OperatorKind,
    OperatorTable, StaticMemberProvider, Visibility,
};
pub use overload::{BoundCallable, CallTarget, ConstructorTarget, NativeSignature, NativeThunk, TypeSig};
pub use runtime::Runtime;
pub use slot::AttributeSlot;
pub use storage::{InstanceStorage, StorageLayout, StorageVersion};
pub use symbol::Symbol;
pub use value::Value;
