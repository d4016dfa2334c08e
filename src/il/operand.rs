//! Identifiers and operand values of the instruction IR.

use std::fmt;

/// Index of an expression inside the arena of one function.
///
/// Ids are only meaningful for the function that handed them out; they are never reused
/// and stay valid for the function's lifetime, including across
/// [`replace_expression`](crate::il::IlRewrite::replace_expression).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(pub(crate) usize);

impl ExprId {
    /// Creates an id from a raw arena index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        ExprId(index)
    }

    /// Returns the raw arena index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExprId({})", self.0)
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identifier of a variable or register of one function.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) u32);

impl VarId {
    /// Creates a variable id from a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: u32) -> Self {
        VarId(index)
    }

    /// Returns the raw index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarId({})", self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// One operand slot of an IR expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A nested expression.
    Expr(ExprId),
    /// An integer constant.
    Integer(i64),
    /// A variable or register reference.
    Var(VarId),
    /// A raw index, e.g. a branch target block.
    Index(usize),
    /// A list of raw indices.
    IndexList(Vec<usize>),
}

/// Coarse classification of an [`Operand`].
///
/// The matcher only recurses into [`OperandKind::Expression`] slots; everything that falls
/// into [`OperandKind::Other`] ends a match branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// A nested expression.
    Expression,
    /// An integer constant.
    Constant,
    /// A variable or register reference.
    Variable,
    /// Indices, lists and anything else that is not a value.
    Other,
}

impl Operand {
    /// Returns the classification of this operand.
    #[must_use]
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Expr(_) => OperandKind::Expression,
            Operand::Integer(_) => OperandKind::Constant,
            Operand::Var(_) => OperandKind::Variable,
            Operand::Index(_) | Operand::IndexList(_) => OperandKind::Other,
        }
    }

    /// Returns the nested expression, if this operand is one.
    #[must_use]
    pub fn as_expr(&self) -> Option<ExprId> {
        match self {
            Operand::Expr(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the integer value, if this operand is a constant.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Operand::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the variable, if this operand references one.
    #[must_use]
    pub fn as_var(&self) -> Option<VarId> {
        match self {
            Operand::Var(var) => Some(*var),
            _ => None,
        }
    }

    /// Returns the raw index, if this operand is one.
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Operand::Index(index) => Some(*index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_kinds() {
        assert_eq!(Operand::Expr(ExprId::new(3)).kind(), OperandKind::Expression);
        assert_eq!(Operand::Integer(-1).kind(), OperandKind::Constant);
        assert_eq!(Operand::Var(VarId::new(0)).kind(), OperandKind::Variable);
        assert_eq!(Operand::Index(2).kind(), OperandKind::Other);
        assert_eq!(Operand::IndexList(vec![1, 2]).kind(), OperandKind::Other);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Operand::Expr(ExprId::new(7)).as_expr(), Some(ExprId::new(7)));
        assert_eq!(Operand::Integer(5).as_expr(), None);
        assert_eq!(Operand::Integer(5).as_integer(), Some(5));
        assert_eq!(Operand::Var(VarId::new(2)).as_var(), Some(VarId::new(2)));
        assert_eq!(Operand::Index(4).as_index(), Some(4));
    }

    #[test]
    fn test_display() {
        assert_eq!(ExprId::new(12).to_string(), "e12");
        assert_eq!(VarId::new(3).to_string(), "v3");
    }
}
