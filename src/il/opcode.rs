//! Opcode tags of the instruction IR.
//!
//! The set mirrors the high-level IL the simplifier is fed with: arithmetic and bitwise
//! operators that patterns can name, leaf nodes for variables and constants, and the
//! statement forms (`VarInit`, `SetVar`, `If`, ...) the scan driver and the predicate
//! solver walk over.

#![allow(missing_docs)]

use strum::{Display, EnumIter, IntoStaticStr};

/// Operation performed by an IR expression node.
///
/// Statement opcodes carry their operands in a fixed layout:
///
/// | Opcode    | Operands                                   |
/// |-----------|--------------------------------------------|
/// | `VarInit` | `Var(dest)`, `Expr(src)`                   |
/// | `SetVar`  | `Var(dest)`, `Expr(src)`                   |
/// | `If`      | `Expr(cond)`, `Index(true)`, `Index(false)`|
/// | `Goto`    | `Index(target)`                            |
/// | `Ret`     | `Expr(value)` (optional)                   |
/// | `Call`    | `Expr(target)`, `IndexList(args)`          |
/// | `Var`     | `Var(id)`                                  |
/// | `Const`   | `Integer(value)`                           |
///
/// Binary operators take two `Expr` operands, unary operators one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Opcode {
    Nop,
    Block,
    If,
    Goto,
    Ret,
    Call,
    VarInit,
    SetVar,
    Var,
    Const,
    Add,
    Sub,
    Mul,
    DivU,
    ModU,
    And,
    Or,
    Xor,
    Lsl,
    Lsr,
    Asr,
    Not,
    Neg,
    CmpE,
    CmpNe,
    CmpUlt,
    CmpUle,
    CmpUgt,
    CmpUge,
}

impl Opcode {
    /// Returns true for operators with exactly two expression operands.
    #[must_use]
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::DivU
                | Opcode::ModU
                | Opcode::And
                | Opcode::Or
                | Opcode::Xor
                | Opcode::Lsl
                | Opcode::Lsr
                | Opcode::Asr
        ) || self.is_comparison()
    }

    /// Returns true for operators with a single expression operand.
    #[must_use]
    pub fn is_unary(self) -> bool {
        matches!(self, Opcode::Not | Opcode::Neg)
    }

    /// Returns true for the unsigned and equality comparisons.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Opcode::CmpE
                | Opcode::CmpNe
                | Opcode::CmpUlt
                | Opcode::CmpUle
                | Opcode::CmpUgt
                | Opcode::CmpUge
        )
    }

    /// Returns true for statements that define a variable.
    #[must_use]
    pub fn is_assignment(self) -> bool {
        matches!(self, Opcode::VarInit | Opcode::SetVar)
    }

    /// Number of expression operands an operator consumes, `None` for non-operators.
    #[must_use]
    pub fn arity(self) -> Option<usize> {
        if self.is_binary() {
            Some(2)
        } else if self.is_unary() {
            Some(1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_operator_classes_are_disjoint() {
        for op in Opcode::iter() {
            assert!(!(op.is_binary() && op.is_unary()), "{op} is both");
            if op.is_assignment() {
                assert_eq!(op.arity(), None);
            }
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Opcode::CmpUle.to_string(), "CMP_ULE");
        assert_eq!(Opcode::VarInit.to_string(), "VAR_INIT");
        assert_eq!(Opcode::Mul.to_string(), "MUL");
    }

    #[test]
    fn test_arity() {
        assert_eq!(Opcode::Xor.arity(), Some(2));
        assert_eq!(Opcode::CmpE.arity(), Some(2));
        assert_eq!(Opcode::Not.arity(), Some(1));
        assert_eq!(Opcode::Var.arity(), None);
    }
}
