//! Operator naming table.
//!
//! Host types spell operators with a primary name (`op_Addition`) and often
//! a convenience alternate (`Add`). The object model exposes both as a
//! single special method (`__add__`). An alternate only counts as the
//! operator when its return type matches the one the table requires, so an
//! unrelated `Equals` returning `int` stays an ordinary method.

use rustc_hash::FxHashMap;

/// Abstract operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperatorKind {
    Add,
    Subtract,
    Multiply,
    TrueDivide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    BitwiseAnd,
    BitwiseOr,
    ExclusiveOr,
    LeftShift,
    RightShift,
    Negate,
    Positive,
    OnesComplement,
    GetItem,
    SetItem,
}

impl OperatorKind {
    /// Every kind, in table order.
    pub const ALL: [OperatorKind; 21] = [
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::TrueDivide,
        Self::Modulo,
        Self::Equal,
        Self::NotEqual,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::BitwiseAnd,
        Self::BitwiseOr,
        Self::ExclusiveOr,
        Self::LeftShift,
        Self::RightShift,
        Self::Negate,
        Self::Positive,
        Self::OnesComplement,
        Self::GetItem,
        Self::SetItem,
    ];

    /// Whether the operator takes a single operand.
    #[inline]
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::Negate | Self::Positive | Self::OnesComplement)
    }
}

/// Naming information for one operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorInfo {
    pub kind: OperatorKind,
    /// Host primary name, e.g. `op_Addition`.
    pub primary: &'static str,
    /// Host convenience name, e.g. `Add`.
    pub alternate: Option<&'static str>,
    /// Return type the alternate must have to qualify.
    pub alternate_return: Option<&'static str>,
    /// Special method exposed on the class.
    pub dunder: &'static str,
}

impl OperatorInfo {
    const fn new(
        kind: OperatorKind,
        primary: &'static str,
        alternate: Option<&'static str>,
        alternate_return: Option<&'static str>,
        dunder: &'static str,
    ) -> Self {
        Self {
            kind,
            primary,
            alternate,
            alternate_return,
            dunder,
        }
    }

    /// Whether a host member called `name` returning `return_type` is this
    /// operator.
    pub fn qualifies(&self, name: &str, return_type: &str) -> bool {
        if name == self.primary {
            return true;
        }
        match self.alternate {
            Some(alternate) if alternate == name => self
                .alternate_return
                .is_none_or(|required| required == return_type),
            _ => false,
        }
    }
}

use OperatorKind as K;

const TABLE: [OperatorInfo; 21] = [
    OperatorInfo::new(K::Add, "op_Addition", Some("Add"), None, "__add__"),
    OperatorInfo::new(K::Subtract, "op_Subtraction", Some("Subtract"), None, "__sub__"),
    OperatorInfo::new(K::Multiply, "op_Multiply", Some("Multiply"), None, "__mul__"),
    OperatorInfo::new(K::TrueDivide, "op_Division", Some("Divide"), None, "__truediv__"),
    OperatorInfo::new(K::Modulo, "op_Modulus", Some("Mod"), None, "__mod__"),
    OperatorInfo::new(K::Equal, "op_Equality", Some("Equals"), Some("bool"), "__eq__"),
    OperatorInfo::new(K::NotEqual, "op_Inequality", None, None, "__ne__"),
    OperatorInfo::new(K::LessThan, "op_LessThan", None, None, "__lt__"),
    OperatorInfo::new(K::LessThanOrEqual, "op_LessThanOrEqual", None, None, "__le__"),
    OperatorInfo::new(K::GreaterThan, "op_GreaterThan", None, None, "__gt__"),
    OperatorInfo::new(K::GreaterThanOrEqual, "op_GreaterThanOrEqual", None, None, "__ge__"),
    OperatorInfo::new(K::BitwiseAnd, "op_BitwiseAnd", Some("BitwiseAnd"), None, "__and__"),
    OperatorInfo::new(K::BitwiseOr, "op_BitwiseOr", Some("BitwiseOr"), None, "__or__"),
    OperatorInfo::new(K::ExclusiveOr, "op_ExclusiveOr", Some("Xor"), None, "__xor__"),
    OperatorInfo::new(K::LeftShift, "op_LeftShift", Some("LeftShift"), None, "__lshift__"),
    OperatorInfo::new(K::RightShift, "op_RightShift", Some("RightShift"), None, "__rshift__"),
    OperatorInfo::new(K::Negate, "op_UnaryNegation", Some("Negate"), None, "__neg__"),
    OperatorInfo::new(K::Positive, "op_UnaryPlus", Some("Plus"), None, "__pos__"),
    OperatorInfo::new(K::OnesComplement, "op_OnesComplement", Some("OnesComplement"), None, "__invert__"),
    OperatorInfo::new(K::GetItem, "get_Item", Some("GetItem"), None, "__getitem__"),
    OperatorInfo::new(K::SetItem, "set_Item", Some("SetItem"), Some("void"), "__setitem__"),
];

/// Bidirectional operator table, built once per runtime.
#[derive(Debug)]
pub struct OperatorTable {
    by_name: FxHashMap<&'static str, OperatorKind>,
    by_dunder: FxHashMap<&'static str, OperatorKind>,
}

impl OperatorTable {
    pub fn new() -> Self {
        let mut by_name = FxHashMap::default();
        let mut by_dunder = FxHashMap::default();
        for info in TABLE.iter() {
            by_name.insert(info.primary, info.kind);
            if let Some(alternate) = info.alternate {
                by_name.insert(alternate, info.kind);
            }
            by_dunder.insert(info.dunder, info.kind);
        }
        Self { by_name, by_dunder }
    }

    /// Naming information for `kind`.
    #[inline]
    pub fn info(&self, kind: OperatorKind) -> &'static OperatorInfo {
        &TABLE[kind as usize]
    }

    /// Look up by primary or alternate host name.
    #[inline]
    pub fn lookup(&self, name: &str) -> Option<&'static OperatorInfo> {
        self.by_name.get(name).map(|&kind| self.info(kind))
    }

    /// Look up by special method name.
    #[inline]
    pub fn lookup_dunder(&self, dunder: &str) -> Option<&'static OperatorInfo> {
        self.by_dunder.get(dunder).map(|&kind| self.info(kind))
    }

    /// The operator a host member implements, if any.
    ///
    /// Alternates qualify only with the required return type.
    pub fn classify(&self, name: &str, return_type: &str) -> Option<&'static OperatorInfo> {
        self.lookup(name)
            .filter(|info| info.qualifies(name, return_type))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static OperatorInfo> {
        TABLE.iter()
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_kinds() {
        for (index, kind) in OperatorKind::ALL.iter().enumerate() {
            assert_eq!(TABLE[index].kind, *kind);
        }
    }

    #[test]
    fn test_lookup_both_names() {
        let table = OperatorTable::new();
        assert_eq!(table.lookup("op_Addition").map(|i| i.kind), Some(OperatorKind::Add));
        assert_eq!(table.lookup("Add").map(|i| i.kind), Some(OperatorKind::Add));
        assert_eq!(table.info(OperatorKind::Add).dunder, "__add__");
        assert_eq!(
            table.lookup_dunder("__eq__").map(|i| i.primary),
            Some("op_Equality")
        );
        assert!(table.lookup("Frobnicate").is_none());
    }

    #[test]
    fn test_alternate_requires_return_type() {
        let table = OperatorTable::new();
        assert!(table.classify("Equals", "bool").is_some());
        assert!(table.classify("Equals", "int").is_none());
        // The primary name never checks the return type.
        assert!(table.classify("op_Equality", "int").is_some());
        // Alternates without a requirement always qualify.
        assert!(table.classify("Add", "Vector").is_some());
    }

    #[test]
    fn test_unary_kinds() {
        assert!(OperatorKind::Negate.is_unary());
        assert!(!OperatorKind::Add.is_unary());
    }
}
