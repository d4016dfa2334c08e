//! Query and rewrite surfaces of the instruction IR.
//!
//! The pattern engine never depends on a concrete IR. Everything it needs to inspect a
//! candidate expression goes through [`IlView`], and the single mutation it performs goes
//! through [`IlRewrite`]. [`IlFunction`](crate::il::IlFunction) is the in-crate
//! implementation; a host integration implements the same traits over its own IL.

use crate::{
    il::{ExprId, Opcode, Operand, VarId},
    Result,
};

/// Read-only access to the expressions of one function.
///
/// Lookups with an unknown id answer `None` (or zero operands) instead of panicking, so a
/// matcher walking a stale id simply fails the match.
pub trait IlView {
    /// Returns the opcode of an expression.
    fn opcode(&self, expr: ExprId) -> Option<Opcode>;

    /// Returns the operand width of an expression in bytes.
    fn width(&self, expr: ExprId) -> Option<usize>;

    /// Returns the number of operands of an expression.
    fn operand_count(&self, expr: ExprId) -> usize;

    /// Returns one operand of an expression.
    fn operand_at(&self, expr: ExprId, index: usize) -> Option<&Operand>;

    /// Returns the display name of a variable, if the IR knows one.
    fn variable_name(&self, _var: VarId) -> Option<&str> {
        None
    }

    /// Returns the integer value of a `Const` expression.
    fn constant_value(&self, expr: ExprId) -> Option<i64> {
        if self.opcode(expr)? != Opcode::Const {
            return None;
        }
        self.operand_at(expr, 0)?.as_integer()
    }

    /// Returns the nested expression operands of an expression, in order.
    fn expression_operands(&self, expr: ExprId) -> Vec<ExprId> {
        (0..self.operand_count(expr))
            .filter_map(|i| self.operand_at(expr, i).and_then(Operand::as_expr))
            .collect()
    }
}

/// Mutation surface used by the rewriter.
///
/// Both operations mutate the owning function only. Callers are expected to hold the
/// function exclusively (`&mut`) for the duration of a rewrite.
pub trait IlRewrite: IlView {
    /// Appends a new expression and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidExpression`] if an `Expr` operand refers to an
    /// expression that does not exist.
    fn add_expression(
        &mut self,
        opcode: Opcode,
        width: usize,
        operands: Vec<Operand>,
    ) -> Result<ExprId>;

    /// Replaces the expression at `old` with the expression at `new`.
    ///
    /// After the call every parent that referenced `old` observes the new expression.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidExpression`] if either id is unknown.
    fn replace_expression(&mut self, old: ExprId, new: ExprId) -> Result<()>;

    /// Marks derived forms (SSA, cached analyses) of the function as stale.
    fn invalidate_derived(&mut self) {}
}
