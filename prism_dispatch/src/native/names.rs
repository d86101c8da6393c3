//! Visible names for native members.
//!
//! Rules, applied in order:
//! 1. Explicit interface implementations (`IShape.Area`) drop the
//!    interface prefix and are visible.
//! 2. Non-public members are mangled to `_Owner__name` and hidden.
//! 3. Members declared on an exposed type are visible regardless of their
//!    host visibility, and keep their plain name.
//! 4. Constructors become `__new__`, indexers `__getitem__` and operator
//!    methods their special method name.

use super::operators::{OperatorKind, OperatorTable};
use super::{MemberKind, MemberTags, NativeMember, Visibility};
use crate::symbol::{Symbol, dunder};
use smallvec::SmallVec;

/// How a member is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberCategory {
    Method,
    ClassMethod,
    StaticMethod,
    Operator(OperatorKind),
    Constructor,
    Property,
    Field,
    Indexer,
    Event,
}

/// Naming decision for one native member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMember {
    /// Name the member is installed under.
    pub name: Symbol,
    /// Additional names sharing the same slot.
    pub aliases: SmallVec<[Symbol; 1]>,
    /// Externally visible (listed by `member_names`).
    pub visible: bool,
    pub category: MemberCategory,
}

/// Classifies native members into visible names and categories.
#[derive(Debug, Clone, Copy)]
pub struct NameResolver<'a> {
    operators: &'a OperatorTable,
    mangle_private: bool,
}

impl<'a> NameResolver<'a> {
    pub fn new(operators: &'a OperatorTable, mangle_private: bool) -> Self {
        Self {
            operators,
            mangle_private,
        }
    }

    /// Resolve `member` installed on the class `owner`.
    ///
    /// `owner_exposed` applies when the member carries no declaring type.
    pub fn resolve(&self, member: &NativeMember, owner: &str, owner_exposed: bool) -> ResolvedMember {
        let (declaring, exposed) = match &member.declaring_type {
            Some(declaring) => (declaring.name.as_str(), declaring.exposed),
            None => (owner, owner_exposed),
        };

        let mut visible = exposed || member.visibility == Visibility::Public;
        let mut name = member.name.clone();

        if member.tags.contains(MemberTags::EXPLICIT_INTERFACE) {
            if let Some((_, simple)) = member.name.as_str().rsplit_once('.') {
                name = Symbol::new(simple);
            }
            visible = true;
        } else if !visible && self.mangle_private {
            name = mangle(declaring, member.name.as_str());
        }

        let mut aliases = SmallVec::new();
        let category = match member.kind {
            MemberKind::Constructor => {
                name = Symbol::new(dunder::NEW);
                MemberCategory::Constructor
            }
            MemberKind::Indexer => {
                name = Symbol::new(dunder::GETITEM);
                if member.setter.is_some() {
                    aliases.push(Symbol::new(dunder::SETITEM));
                }
                MemberCategory::Indexer
            }
            MemberKind::Property => MemberCategory::Property,
            MemberKind::Field => MemberCategory::Field,
            MemberKind::Event => MemberCategory::Event,
            MemberKind::Method => {
                match self
                    .operators
                    .classify(member.name.as_str(), member.return_type.as_str())
                {
                    Some(info) => {
                        aliases.push(name.clone());
                        name = Symbol::new(info.dunder);
                        MemberCategory::Operator(info.kind)
                    }
                    None if member.tags.contains(MemberTags::CLASS_METHOD) => {
                        MemberCategory::ClassMethod
                    }
                    None if member.tags.contains(MemberTags::STATIC) => {
                        MemberCategory::StaticMethod
                    }
                    None => {
                        if member.tags.contains(MemberTags::SPECIAL_NAME) {
                            visible = false;
                        }
                        MemberCategory::Method
                    }
                }
            }
        };

        ResolvedMember {
            name,
            aliases,
            visible,
            category,
        }
    }
}

/// `_Owner__name`, with leading underscores of the owner stripped.
pub fn mangle(owner: &str, name: &str) -> Symbol {
    let owner = owner.trim_start_matches('_');
    if owner.is_empty() || (name.starts_with("__") && name.ends_with("__")) {
        return Symbol::new(name);
    }
    Symbol::from(format!("_{}__{}", owner, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overload::NativeThunk;
    use crate::value::Value;
    use std::sync::Arc;

    fn nop() -> NativeThunk {
        Arc::new(|_, _| Ok(Value::None))
    }

    fn resolve(member: &NativeMember) -> ResolvedMember {
        let table = OperatorTable::new();
        NameResolver::new(&table, true).resolve(member, "Widget", false)
    }

    #[test]
    fn test_public_member_keeps_name() {
        let r = resolve(&NativeMember::method("Draw", [], "void", nop()));
        assert_eq!(r.name, "Draw");
        assert!(r.visible);
        assert_eq!(r.category, MemberCategory::Method);
    }

    #[test]
    fn test_private_member_is_mangled() {
        let member =
            NativeMember::method("secret", [], "void", nop()).with_visibility(Visibility::Private);
        let r = resolve(&member);
        assert_eq!(r.name, "_Widget__secret");
        assert!(!r.visible);
    }

    #[test]
    fn test_mangling_uses_declaring_type() {
        let member = NativeMember::field("count", "int", nop())
            .with_visibility(Visibility::Protected)
            .declared_by("_Base", false);
        assert_eq!(resolve(&member).name, "_Base__count");
    }

    #[test]
    fn test_mangling_disabled_keeps_name_hidden() {
        let table = OperatorTable::new();
        let member =
            NativeMember::method("secret", [], "void", nop()).with_visibility(Visibility::Internal);
        let r = NameResolver::new(&table, false).resolve(&member, "Widget", false);
        assert_eq!(r.name, "secret");
        assert!(!r.visible);
    }

    #[test]
    fn test_explicit_interface_prefix_is_stripped() {
        let member = NativeMember::method("IShape.Area", [], "double", nop())
            .with_visibility(Visibility::Private)
            .with_tags(MemberTags::EXPLICIT_INTERFACE);
        let r = resolve(&member);
        assert_eq!(r.name, "Area");
        assert!(r.visible);
    }

    #[test]
    fn test_exposed_type_overrides_visibility() {
        let member = NativeMember::method("Helper", [], "void", nop())
            .with_visibility(Visibility::Private)
            .declared_by("Widget", true);
        let r = resolve(&member);
        assert_eq!(r.name, "Helper");
        assert!(r.visible);
    }

    #[test]
    fn test_operator_becomes_dunder_with_alias() {
        let member = NativeMember::method("op_Addition", ["Widget", "Widget"], "Widget", nop())
            .with_tags(MemberTags::STATIC);
        let r = resolve(&member);
        assert_eq!(r.name, "__add__");
        assert_eq!(r.aliases.as_slice(), &[Symbol::new("op_Addition")]);
        assert_eq!(r.category, MemberCategory::Operator(OperatorKind::Add));
    }

    #[test]
    fn test_class_method_and_static_tags() {
        let cm = NativeMember::method("Create", [], "Widget", nop())
            .with_tags(MemberTags::STATIC | MemberTags::CLASS_METHOD);
        assert_eq!(resolve(&cm).category, MemberCategory::ClassMethod);

        let sm = NativeMember::method("Parse", ["string"], "Widget", nop())
            .with_tags(MemberTags::STATIC);
        assert_eq!(resolve(&sm).category, MemberCategory::StaticMethod);
    }

    #[test]
    fn test_special_name_method_is_hidden() {
        let member = NativeMember::method("get_Width", [], "double", nop())
            .with_tags(MemberTags::SPECIAL_NAME);
        assert!(!resolve(&member).visible);
    }

    #[test]
    fn test_constructor_and_indexer_names() {
        let ctor = NativeMember::constructor(["int"], nop());
        assert_eq!(resolve(&ctor).name, dunder::NEW);

        let indexer = NativeMember::indexer(["int"], "double", nop()).with_setter(nop());
        let r = resolve(&indexer);
        assert_eq!(r.name, dunder::GETITEM);
        assert_eq!(r.aliases.as_slice(), &[Symbol::new(dunder::SETITEM)]);
    }

    #[test]
    fn test_mangle_leaves_dunders_alone() {
        assert_eq!(mangle("Widget", "__init__"), "__init__");
        assert_eq!(mangle("__", "x"), "x");
    }
}
