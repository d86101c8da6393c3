//! Class definition.
//!
//! [`ClassSpec`] collects everything a class statement would declare. The
//! runtime turns it into a [`ClassObject`]:
//!
//! 1. Bases default to `object`; the order is computed by [`linearize`].
//! 2. The fixed slot layout is inherited from the one base that has slots
//!    and extended with the class's own `__slots__`.
//! 3. The member mapping is filled with `__dict__` / `__weakref__` (when the
//!    class introduces them), `__doc__`, one indexed slot per own
//!    `__slots__` entry, namespace values, and native members grouped by
//!    their resolved name.
//!
//! Nothing is registered until every step has succeeded.

use super::mro::{ClassLookup, linearize};
use super::{Bases, ClassFlags, ClassId, ClassObject, ClassParts};
use crate::error::{DispatchError, DispatchResult};
use crate::native::{MemberCategory, MemberKind, MemberProvider, NameResolver, NativeMember};
use crate::overload::{CallTarget, ConstructorTarget, NativeSignature, TypeSig};
use crate::runtime::Runtime;
use crate::slot::{
    AttributeSlot, DictSlot, IndexedSlot, NativeCallableSlot, NativeSlotFlags, NativeSlotKind,
    UserDescriptorSlot, WeakRefSlot,
};
use crate::symbol::{Symbol, dunder};
use crate::value::Value;
use rustc_hash::FxHashMap;
use smallvec::smallvec;
use std::sync::Arc;

// =============================================================================
// Class Spec
// =============================================================================

/// Declaration of a class to be defined.
#[derive(Debug, Clone)]
pub struct ClassSpec {
    name: Symbol,
    native_name: Option<Symbol>,
    bases: Bases,
    flags: ClassFlags,
    slots: Option<Vec<Symbol>>,
    init_attrs: Vec<Symbol>,
    namespace: Vec<(Symbol, Value)>,
    members: Vec<NativeMember>,
    doc: Option<Arc<str>>,
}

impl ClassSpec {
    /// A class with an attribute mapping and weak-reference support.
    pub fn new(name: &str) -> Self {
        Self {
            name: Symbol::new(name),
            native_name: None,
            bases: Bases::new(),
            flags: ClassFlags::HAS_DICT | ClassFlags::WEAKREFABLE,
            slots: None,
            init_attrs: Vec::new(),
            namespace: Vec::new(),
            members: Vec::new(),
            doc: None,
        }
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Append a declared base.
    pub fn base(mut self, base: ClassId) -> Self {
        self.bases.push(base);
        self
    }

    /// Replace the declared bases.
    pub fn bases(mut self, bases: impl IntoIterator<Item = ClassId>) -> Self {
        self.bases = bases.into_iter().collect();
        self
    }

    /// Declare `__slots__`.
    ///
    /// Instances lose their attribute mapping and weak-reference support
    /// unless `__dict__` / `__weakref__` are listed or inherited.
    pub fn slots<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.flags
            .remove(ClassFlags::HAS_DICT | ClassFlags::WEAKREFABLE);
        self.flags.insert(ClassFlags::HAS_SLOTS);
        let mut slots = Vec::new();
        for name in names {
            match name {
                dunder::DICT => self.flags.insert(ClassFlags::HAS_DICT),
                dunder::WEAKREF => self.flags.insert(ClassFlags::WEAKREFABLE),
                other => slots.push(Symbol::new(other)),
            }
        }
        self.slots = Some(slots);
        self
    }

    /// Attribute names the class's initializer assigns on `self`.
    pub fn init_attrs<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.init_attrs.extend(names.into_iter().map(Symbol::new));
        self
    }

    /// A class-body value. A [`Value::Slot`] is installed as-is; any other
    /// value is wrapped in a user descriptor slot.
    pub fn attr(mut self, name: &str, value: Value) -> Self {
        self.namespace.push((Symbol::new(name), value));
        self
    }

    /// A native member.
    pub fn member(mut self, member: NativeMember) -> Self {
        self.members.push(member);
        self
    }

    pub fn members(mut self, members: impl IntoIterator<Item = NativeMember>) -> Self {
        self.members.extend(members);
        self
    }

    /// Members of this class are always externally visible.
    pub fn exposed(mut self) -> Self {
        self.flags.insert(ClassFlags::EXPOSED);
        self
    }

    /// Host type name used in native signatures.
    pub fn native(mut self, host_name: &str) -> Self {
        self.native_name = Some(Symbol::new(host_name));
        self.flags.insert(ClassFlags::NATIVE);
        self
    }

    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = Some(Arc::from(doc));
        self
    }
}

// =============================================================================
// Definition
// =============================================================================

/// Lookup that also knows the class being defined.
struct Pending<'a> {
    runtime: &'a Runtime,
    id: ClassId,
    name: &'a Symbol,
}

impl ClassLookup for Pending<'_> {
    fn mro_of(&self, class: ClassId) -> Option<Arc<[ClassId]>> {
        if class == self.id {
            return None;
        }
        self.runtime.mro_of(class)
    }

    fn name_of(&self, class: ClassId) -> Option<Symbol> {
        if class == self.id {
            return Some(self.name.clone());
        }
        self.runtime.name_of(class)
    }
}

impl Runtime {
    /// Define a class from `spec`.
    ///
    /// Fails without registering anything when the order cannot be
    /// linearized, a base is unknown, bases disagree on `__slots__`, or
    /// overloads of one native name bind differently.
    pub fn define_class(&self, spec: ClassSpec) -> DispatchResult<Arc<ClassObject>> {
        if spec.name.as_str().is_empty() {
            return Err(DispatchError::incompatible("class name must not be empty"));
        }

        // Held until registration so a concurrent base reassignment either
        // sees this class as a dependent or finishes before its order is read.
        let _guard = self.hierarchy_lock().lock();

        let bases: Bases = if spec.bases.is_empty() {
            smallvec![ClassId::OBJECT]
        } else {
            spec.bases.clone()
        };
        let base_classes = bases
            .iter()
            .map(|&id| self.class(id).ok_or(DispatchError::UnknownClass(id.raw())))
            .collect::<DispatchResult<Vec<_>>>()?;

        let id = self.allocate_class_id();
        let mro = linearize(
            id,
            &bases,
            &Pending {
                runtime: self,
                id,
                name: &spec.name,
            },
        )?;
        let mut slot_names = inherited_slots(&spec.name, &base_classes)?;

        let mut flags = spec.flags;
        let base_has_dict = base_classes.iter().any(|b| b.has_dict());
        let base_weakrefable = base_classes.iter().any(|b| b.is_weakrefable());
        if base_has_dict {
            flags.insert(ClassFlags::HAS_DICT);
        }
        if base_weakrefable {
            flags.insert(ClassFlags::WEAKREFABLE);
        }

        let mut members: FxHashMap<Symbol, Arc<AttributeSlot>> = FxHashMap::default();
        if flags.contains(ClassFlags::HAS_DICT) && !base_has_dict {
            members.insert(Symbol::new(dunder::DICT), Arc::new(AttributeSlot::Dict(DictSlot)));
        }
        if flags.contains(ClassFlags::WEAKREFABLE) && !base_weakrefable {
            members.insert(
                Symbol::new(dunder::WEAKREF),
                Arc::new(AttributeSlot::WeakRef(WeakRefSlot)),
            );
        }
        let doc = spec
            .doc
            .as_ref()
            .map(|d| Value::Str(d.clone()))
            .unwrap_or(Value::None);
        members.insert(
            Symbol::new(dunder::DOC),
            Arc::new(AttributeSlot::User(UserDescriptorSlot::new(dunder::DOC, doc))),
        );

        for name in spec.slots.iter().flatten() {
            if slot_names.contains(name) {
                continue;
            }
            members.insert(
                name.clone(),
                Arc::new(AttributeSlot::Indexed(IndexedSlot::new(
                    name.clone(),
                    id,
                    slot_names.len(),
                ))),
            );
            slot_names.push(name.clone());
        }

        for (name, value) in &spec.namespace {
            members.insert(name.clone(), namespace_slot(name, value.clone()));
        }

        for (name, slot) in self.native_slots(&spec.name, flags.contains(ClassFlags::EXPOSED), &spec.members)? {
            members.insert(name, slot);
        }

        let class = Arc::new(ClassObject::from_parts(ClassParts {
            id,
            name: spec.name.clone(),
            native_name: spec.native_name.clone(),
            bases,
            mro: mro.iter().copied().collect(),
            flags,
            members,
            slot_names,
            init_attrs: spec.init_attrs.clone(),
            doc: spec.doc.clone(),
        }));
        self.register_class(class.clone());

        tracing::debug!(
            class = %class.name(),
            id = id.raw(),
            mro_len = mro.len(),
            slots = class.slot_count(),
            native_members = spec.members.len(),
            "defined class"
        );
        Ok(class)
    }

    /// Define a class whose members come from `provider`.
    ///
    /// The provider is queried with the spec's host name, or its name when
    /// it has none.
    pub fn define_native_class(
        &self,
        spec: ClassSpec,
        provider: &dyn MemberProvider,
    ) -> DispatchResult<Arc<ClassObject>> {
        let type_name = spec.native_name.clone().unwrap_or_else(|| spec.name.clone());
        let members = provider.members(type_name.as_str());
        self.define_class(spec.members(members))
    }

    /// Group native members into slots keyed by their resolved names.
    pub(crate) fn native_slots(
        &self,
        owner: &Symbol,
        owner_exposed: bool,
        members: &[NativeMember],
    ) -> DispatchResult<Vec<(Symbol, Arc<AttributeSlot>)>> {
        let resolver = NameResolver::new(self.operators(), self.config().mangle_private_members);
        let mut groups: Vec<Group> = Vec::new();
        let mut index: FxHashMap<Symbol, usize> = FxHashMap::default();
        let mut accessors: Vec<(Symbol, Arc<AttributeSlot>)> = Vec::new();

        for member in members {
            let resolved = resolver.resolve(member, owner.as_str(), owner_exposed);
            let mut flags = NativeSlotFlags::empty();
            if !resolved.visible {
                flags |= NativeSlotFlags::HIDDEN;
            }

            match resolved.category {
                MemberCategory::Property | MemberCategory::Field | MemberCategory::Event => {
                    if member.is_static() {
                        flags |= NativeSlotFlags::STATIC | NativeSlotFlags::ALWAYS_DATA;
                    }
                    accessors.push((resolved.name.clone(), accessor_slot(&resolved.name, member, flags)));
                    continue;
                }
                MemberCategory::Constructor => {
                    if let Some(sig) = NativeSignature::from_member(member) {
                        group(&mut groups, &mut index, &resolved.name, GroupKind::Constructor, flags, member)?
                            .push(sig);
                    }
                    continue;
                }
                MemberCategory::Indexer => {
                    if let Some(sig) = NativeSignature::from_member(member) {
                        group(&mut groups, &mut index, &resolved.name, GroupKind::Indexer, flags, member)?
                            .push(sig);
                    }
                    if let (Some(setter), Some(alias)) = (&member.setter, resolved.aliases.first()) {
                        let mut params = member.parameter_types.clone();
                        params.push(member.return_type.clone());
                        let sig = NativeSignature::from_parts(
                            params,
                            Symbol::new("void"),
                            member.has_context_param,
                            setter.clone(),
                        );
                        group(&mut groups, &mut index, alias, GroupKind::Indexer, flags, member)?.push(sig);
                    }
                    continue;
                }
                MemberCategory::ClassMethod => flags |= NativeSlotFlags::CLASS_METHOD,
                MemberCategory::StaticMethod => flags |= NativeSlotFlags::STATIC,
                MemberCategory::Method | MemberCategory::Operator(_) => {}
            }

            let Some(mut sig) = NativeSignature::from_member(member) else {
                tracing::warn!(member = %member.name, owner = %owner, "native method without thunk skipped");
                continue;
            };
            // Static operators take their left operand as the receiver.
            if matches!(resolved.category, MemberCategory::Operator(_)) && member.is_static() {
                let params: TypeSig = sig.explicit_params().iter().skip(1).cloned().collect();
                sig = NativeSignature::from_parts(
                    params,
                    sig.return_type().clone(),
                    false,
                    sig.thunk().clone(),
                );
            }
            let entry = group(&mut groups, &mut index, &resolved.name, GroupKind::Method, flags, member)?;
            entry.push(sig);
            for alias in &resolved.aliases {
                if !entry.aliases.contains(alias) {
                    entry.aliases.push(alias.clone());
                }
            }
        }

        let mut slots = accessors;
        for group in groups {
            let slot = Arc::new(group.build());
            for alias in &group.aliases {
                slots.push((alias.clone(), slot.clone()));
            }
            slots.push((group.name, slot));
        }
        Ok(slots)
    }
}

// =============================================================================
// Native Member Grouping
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKind {
    Method,
    Indexer,
    Constructor,
}

struct Group {
    name: Symbol,
    kind: GroupKind,
    flags: NativeSlotFlags,
    signatures: Vec<NativeSignature>,
    aliases: Vec<Symbol>,
    doc: Option<Arc<str>>,
}

impl Group {
    fn push(&mut self, sig: NativeSignature) {
        self.signatures.push(sig);
    }

    fn build(&self) -> AttributeSlot {
        let target = Arc::new(CallTarget::new(
            self.name.clone(),
            self.signatures.iter().cloned(),
        ));
        let slot = match self.kind {
            GroupKind::Constructor => {
                NativeCallableSlot::constructor(self.name.clone(), Arc::new(ConstructorTarget::new(target)))
            }
            GroupKind::Indexer => {
                NativeCallableSlot::callable(self.name.clone(), NativeSlotKind::Indexer, target, self.flags)
            }
            GroupKind::Method => {
                NativeCallableSlot::callable(self.name.clone(), NativeSlotKind::Method, target, self.flags)
            }
        };
        AttributeSlot::Native(slot.with_doc(self.doc.clone()))
    }
}

/// Flags every member of a group must agree on.
const BINDING_FLAGS: NativeSlotFlags = NativeSlotFlags::STATIC.union(NativeSlotFlags::CLASS_METHOD);

/// The group for `name`, created on first use.
///
/// Members joining an existing group must bind the same way. The group is
/// hidden only while all of its members are, and takes the first doc given.
fn group<'g>(
    groups: &'g mut Vec<Group>,
    index: &mut FxHashMap<Symbol, usize>,
    name: &Symbol,
    kind: GroupKind,
    flags: NativeSlotFlags,
    member: &NativeMember,
) -> DispatchResult<&'g mut Group> {
    if let Some(&position) = index.get(name) {
        let entry = &mut groups[position];
        if (entry.flags ^ flags).intersects(BINDING_FLAGS) {
            return Err(DispatchError::incompatible(format!(
                "overloads of '{name}' mix static, class and instance members"
            )));
        }
        if !flags.contains(NativeSlotFlags::HIDDEN) {
            entry.flags.remove(NativeSlotFlags::HIDDEN);
        }
        if entry.doc.is_none() {
            entry.doc = member.doc.clone();
        }
        return Ok(entry);
    }

    index.insert(name.clone(), groups.len());
    groups.push(Group {
        name: name.clone(),
        kind,
        flags,
        signatures: Vec::new(),
        aliases: Vec::new(),
        doc: member.doc.clone(),
    });
    let last = groups.len() - 1;
    Ok(&mut groups[last])
}

fn accessor_slot(name: &Symbol, member: &NativeMember, flags: NativeSlotFlags) -> Arc<AttributeSlot> {
    let kind = match member.kind {
        MemberKind::Field => NativeSlotKind::Field,
        MemberKind::Event => NativeSlotKind::Event,
        _ => NativeSlotKind::Property,
    };
    let target = |params: TypeSig, thunk: &crate::overload::NativeThunk| {
        Arc::new(CallTarget::new(
            name.clone(),
            [NativeSignature::from_parts(
                params,
                member.return_type.clone(),
                false,
                thunk.clone(),
            )],
        ))
    };
    let getter = member.thunk.as_ref().map(|t| target(TypeSig::new(), t));
    let setter = member
        .setter
        .as_ref()
        .map(|t| target(smallvec![member.return_type.clone()], t));
    let deleter = member.deleter.as_ref().map(|t| target(TypeSig::new(), t));

    Arc::new(AttributeSlot::Native(
        NativeCallableSlot::accessor(name.clone(), kind, getter, setter, deleter, flags)
            .with_doc(member.doc.clone()),
    ))
}

pub(crate) fn namespace_slot(name: &Symbol, value: Value) -> Arc<AttributeSlot> {
    match value {
        Value::Slot(slot) => slot,
        other => Arc::new(AttributeSlot::User(UserDescriptorSlot::new(name.clone(), other))),
    }
}

/// The fixed slot names instances inherit.
///
/// At most one layout may be extended: every base with slots must share a
/// prefix with the longest one.
pub(crate) fn inherited_slots(name: &Symbol, bases: &[Arc<ClassObject>]) -> DispatchResult<Vec<Symbol>> {
    let Some(solid) = bases.iter().max_by_key(|b| b.slot_count()) else {
        return Ok(Vec::new());
    };
    for base in bases {
        if !solid.slot_names().starts_with(base.slot_names()) {
            tracing::debug!(class = %name, left = %solid.name(), right = %base.name(), "slot layout conflict");
            return Err(DispatchError::LayoutConflict(format!(
                "'{}' and '{}' both define __slots__",
                solid.name(),
                base.name()
            )));
        }
    }
    Ok(solid.slot_names().to_vec())
}

// =============================================================================
// Tests
// =============================================================================
