//! Native member records and providers.
//!
//! The embedding layer describes host types as flat lists of
//! [`NativeMember`] records. The engine never inspects a host type itself:
//! it only reads names, parameter and return type names, visibility, tags
//! and the invocation thunks attached to each record.

pub mod names;
pub mod operators;

pub use names::{MemberCategory, NameResolver, ResolvedMember};
pub use operators::{OperatorInfo, OperatorKind, OperatorTable};

use crate::overload::{NativeThunk, TypeSig};
use crate::symbol::Symbol;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Member Records
// =============================================================================

/// What a native member is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Method,
    Constructor,
    Property,
    Field,
    Indexer,
    Event,
}

/// Host visibility of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Internal,
    Private,
}

bitflags::bitflags! {
    /// Special tags carried by native members.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemberTags: u32 {
        /// No receiver.
        const STATIC = 1 << 0;
        /// Static member receiving the owning class as first argument.
        const CLASS_METHOD = 1 << 1;
        /// Compiler-generated name such as a property accessor.
        const SPECIAL_NAME = 1 << 2;
        /// Explicit implementation of an interface member (`IFoo.Bar`).
        const EXPLICIT_INTERFACE = 1 << 3;
    }
}

/// The type a member was declared on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaringType {
    pub name: Symbol,
    /// Members of exposed types are always externally visible.
    pub exposed: bool,
}

/// A structured description of one host member.
#[derive(Clone)]
pub struct NativeMember {
    pub name: Symbol,
    pub kind: MemberKind,
    /// Parameter type names, receiver excluded. For properties, fields and
    /// events this is empty; for indexers it holds the index types.
    pub parameter_types: TypeSig,
    pub return_type: Symbol,
    pub visibility: Visibility,
    pub tags: MemberTags,
    /// `None` means the type the member is being installed on.
    pub declaring_type: Option<DeclaringType>,
    /// Invocation thunk for methods and constructors, getter otherwise.
    pub thunk: Option<NativeThunk>,
    pub setter: Option<NativeThunk>,
    pub deleter: Option<NativeThunk>,
    /// First parameter is an implicit context parameter.
    pub has_context_param: bool,
    pub doc: Option<Arc<str>>,
}

impl NativeMember {
    fn new(name: &str, kind: MemberKind, return_type: &str) -> Self {
        Self {
            name: Symbol::new(name),
            kind,
            parameter_types: TypeSig::new(),
            return_type: Symbol::new(return_type),
            visibility: Visibility::Public,
            tags: MemberTags::empty(),
            declaring_type: None,
            thunk: None,
            setter: None,
            deleter: None,
            has_context_param: false,
            doc: None,
        }
    }

    /// An instance method.
    pub fn method<'a>(
        name: &str,
        params: impl IntoIterator<Item = &'a str>,
        return_type: &str,
        thunk: NativeThunk,
    ) -> Self {
        let mut member = Self::new(name, MemberKind::Method, return_type);
        member.parameter_types = params.into_iter().map(Symbol::new).collect();
        member.thunk = Some(thunk);
        member
    }

    /// A constructor. The thunk receives the arguments without the class.
    pub fn constructor<'a>(params: impl IntoIterator<Item = &'a str>, thunk: NativeThunk) -> Self {
        let mut member = Self::new(".ctor", MemberKind::Constructor, "void");
        member.parameter_types = params.into_iter().map(Symbol::new).collect();
        member.thunk = Some(thunk);
        member
    }

    /// A property with a getter taking the receiver.
    pub fn property(name: &str, value_type: &str, getter: NativeThunk) -> Self {
        let mut member = Self::new(name, MemberKind::Property, value_type);
        member.thunk = Some(getter);
        member
    }

    /// A field read through `getter`.
    pub fn field(name: &str, value_type: &str, getter: NativeThunk) -> Self {
        let mut member = Self::new(name, MemberKind::Field, value_type);
        member.thunk = Some(getter);
        member
    }

    /// An indexer. Installed as `__getitem__`, plus `__setitem__` when a
    /// setter is attached.
    pub fn indexer<'a>(
        index_types: impl IntoIterator<Item = &'a str>,
        item_type: &str,
        getter: NativeThunk,
    ) -> Self {
        let mut member = Self::new("Item", MemberKind::Indexer, item_type);
        member.parameter_types = index_types.into_iter().map(Symbol::new).collect();
        member.thunk = Some(getter);
        member
    }

    /// An event. The setter adds a handler, the deleter removes one.
    pub fn event(name: &str, handler_type: &str, getter: NativeThunk) -> Self {
        let mut member = Self::new(name, MemberKind::Event, handler_type);
        member.thunk = Some(getter);
        member
    }

    pub fn with_setter(mut self, setter: NativeThunk) -> Self {
        self.setter = Some(setter);
        self
    }

    pub fn with_deleter(mut self, deleter: NativeThunk) -> Self {
        self.deleter = Some(deleter);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_tags(mut self, tags: MemberTags) -> Self {
        self.tags |= tags;
        self
    }

    /// Mark the first parameter as the implicit context parameter.
    pub fn with_context_param(mut self) -> Self {
        self.has_context_param = true;
        self
    }

    pub fn declared_by(mut self, name: &str, exposed: bool) -> Self {
        self.declaring_type = Some(DeclaringType {
            name: Symbol::new(name),
            exposed,
        });
        self
    }

    pub fn with_doc(mut self, doc: &str) -> Self {
        self.doc = Some(Arc::from(doc));
        self
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.tags.contains(MemberTags::STATIC)
    }
}

impl fmt::Debug for NativeMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeMember")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parameter_types", &self.parameter_types)
            .field("return_type", &self.return_type)
            .field("visibility", &self.visibility)
            .field("tags", &self.tags)
            .field("declaring_type", &self.declaring_type)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Providers
// =============================================================================

/// Enumerates the native members of host types.
pub trait MemberProvider: Send + Sync {
    /// Members of the host type `type_name`, in declaration order.
    fn members(&self, type_name: &str) -> Vec<NativeMember>;
}

/// In-memory provider.
#[derive(Default)]
pub struct StaticMemberProvider {
    types: FxHashMap<Symbol, Vec<NativeMember>>,
}

impl StaticMemberProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member of `type_name`.
    pub fn add(&mut self, type_name: &str, member: NativeMember) -> &mut Self {
        self.types
            .entry(Symbol::new(type_name))
            .or_default()
            .push(member);
        self
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, type_name: &str, member: NativeMember) -> Self {
        self.add(type_name, member);
        self
    }
}

impl MemberProvider for StaticMemberProvider {
    fn members(&self, type_name: &str) -> Vec<NativeMember> {
        self.types.get(type_name).cloned().unwrap_or_default()
    }
}
