//! Constant evaluation of IR expressions.
//!
//! Used by the opaque predicate solver to decide whether a branch condition is fixed.
//! Values are unsigned and masked to the width of the node that produced them; anything
//! the evaluator cannot prove constant yields `None`.
//!
//! Besides plain folding, three sources of constants are recognised:
//!
//! - self-cancelling operations over structurally identical operands (`x ^ x`, `x - x`,
//!   `x == x`, `x != x`, `x < x`, ...)
//! - absorbing operands (`x & 0`, `x * 0`)
//! - variables with exactly one definition in the function whose source folds to a constant

use crate::il::{ExprId, IlFunction, IlView, Opcode, Operand};

/// Maximum nesting followed through expressions and single-definition variables.
const MAX_DEPTH: usize = 32;

/// Bit mask for a width in bytes. Widths of zero or above eight bytes use all 64 bits.
#[must_use]
pub fn width_mask(width: usize) -> u64 {
    match width {
        1..=7 => (1u64 << (width * 8)) - 1,
        _ => u64::MAX,
    }
}

/// Sign-extends a value of the given width to 64 bits.
#[must_use]
pub fn sign_extend(value: u64, width: usize) -> i64 {
    match width {
        1..=7 => {
            let shift = 64 - (width as u32) * 8;
            ((value << shift) as i64) >> shift
        }
        _ => value as i64,
    }
}

/// Folds an expression to a constant, if possible.
///
/// # Examples
///
/// ```rust
/// use deobscope::il::{eval, IlFunction, Opcode};
///
/// let mut il = IlFunction::new();
/// let x = il.add_variable("x");
/// let a = il.var(x, 4);
/// let b = il.var(x, 4);
/// let always_zero = il.binary(Opcode::Xor, 4, a, b);
///
/// assert_eq!(eval::evaluate(&il, always_zero), Some(0));
/// assert_eq!(eval::evaluate(&il, a), None);
/// ```
#[must_use]
pub fn evaluate(il: &IlFunction, expr: ExprId) -> Option<u64> {
    Evaluator { il }.eval(expr, 0)
}

/// Returns true if two expressions compute the same value by construction.
///
/// Comparison is purely structural: same opcode, same width and pairwise equal operands.
#[must_use]
pub fn structurally_equal<V: IlView + ?Sized>(il: &V, a: ExprId, b: ExprId) -> bool {
    structurally_equal_at(il, a, b, 0)
}

fn structurally_equal_at<V: IlView + ?Sized>(il: &V, a: ExprId, b: ExprId, depth: usize) -> bool {
    if a == b {
        return true;
    }
    if depth > MAX_DEPTH {
        return false;
    }
    let (Some(op_a), Some(op_b)) = (il.opcode(a), il.opcode(b)) else {
        return false;
    };
    if op_a != op_b || op_a == Opcode::Call || il.width(a) != il.width(b) {
        return false;
    }
    let count = il.operand_count(a);
    if count != il.operand_count(b) {
        return false;
    }
    (0..count).all(|i| match (il.operand_at(a, i), il.operand_at(b, i)) {
        (Some(Operand::Expr(x)), Some(Operand::Expr(y))) => {
            structurally_equal_at(il, *x, *y, depth + 1)
        }
        (Some(x), Some(y)) => x == y,
        _ => false,
    })
}

struct Evaluator<'a> {
    il: &'a IlFunction,
}

impl Evaluator<'_> {
    fn operand(&self, expr: ExprId, index: usize) -> Option<ExprId> {
        self.il.operand_at(expr, index)?.as_expr()
    }

    fn eval(&self, expr: ExprId, depth: usize) -> Option<u64> {
        if depth > MAX_DEPTH {
            return None;
        }
        let opcode = self.il.opcode(expr)?;
        let width = self.il.width(expr)?;
        let mask = width_mask(width);

        let value = match opcode {
            Opcode::Const => self.il.constant_value(expr)? as u64,
            Opcode::Var => {
                let var = self.il.operand_at(expr, 0)?.as_var()?;
                let definitions = self.il.variable_definitions(var);
                let [definition] = definitions.as_slice() else {
                    return None;
                };
                let (_, src) = self.il.assignment(*definition)?;
                self.eval(src, depth + 1)?
            }
            Opcode::Not => !self.eval(self.operand(expr, 0)?, depth + 1)?,
            Opcode::Neg => self.eval(self.operand(expr, 0)?, depth + 1)?.wrapping_neg(),
            op if op.is_binary() => {
                let lhs_id = self.operand(expr, 0)?;
                let rhs_id = self.operand(expr, 1)?;
                if let Some(value) = self.identity(op, lhs_id, rhs_id) {
                    return Some(value & mask);
                }
                let lhs = self.eval(lhs_id, depth + 1);
                let rhs = self.eval(rhs_id, depth + 1);
                if let Some(value) = absorb(op, lhs, rhs, mask) {
                    return Some(value);
                }
                // Comparisons yield a flag but compare at the width of their operands.
                let operand_width = if op.is_comparison() {
                    self.il.width(lhs_id)?
                } else {
                    width
                };
                let operand_mask = width_mask(operand_width);
                fold(op, lhs? & operand_mask, rhs? & operand_mask, operand_width)?
            }
            _ => return None,
        };
        Some(value & mask)
    }

    fn identity(&self, op: Opcode, lhs: ExprId, rhs: ExprId) -> Option<u64> {
        if !structurally_equal(self.il, lhs, rhs) {
            return None;
        }
        match op {
            Opcode::Xor | Opcode::Sub | Opcode::CmpNe | Opcode::CmpUlt | Opcode::CmpUgt => Some(0),
            Opcode::CmpE | Opcode::CmpUle | Opcode::CmpUge => Some(1),
            _ => None,
        }
    }
}

fn absorb(op: Opcode, lhs: Option<u64>, rhs: Option<u64>, mask: u64) -> Option<u64> {
    let either = |v: u64| lhs.map(|x| x & mask) == Some(v) || rhs.map(|x| x & mask) == Some(v);
    match op {
        Opcode::And | Opcode::Mul if either(0) => Some(0),
        Opcode::Or if either(mask) => Some(mask),
        _ => None,
    }
}

fn fold(op: Opcode, lhs: u64, rhs: u64, width: usize) -> Option<u64> {
    let bits = match width {
        1..=8 => (width as u32) * 8,
        _ => 64,
    };
    let value = match op {
        Opcode::Add => lhs.wrapping_add(rhs),
        Opcode::Sub => lhs.wrapping_sub(rhs),
        Opcode::Mul => lhs.wrapping_mul(rhs),
        Opcode::DivU => lhs.checked_div(rhs)?,
        Opcode::ModU => lhs.checked_rem(rhs)?,
        Opcode::And => lhs & rhs,
        Opcode::Or => lhs | rhs,
        Opcode::Xor => lhs ^ rhs,
        Opcode::Lsl => {
            if rhs >= u64::from(bits) {
                0
            } else {
                lhs << rhs
            }
        }
        Opcode::Lsr => {
            if rhs >= u64::from(bits) {
                0
            } else {
                lhs >> rhs
            }
        }
        Opcode::Asr => {
            let shift = rhs.min(u64::from(bits) - 1) as u32;
            (sign_extend(lhs, width) >> shift) as u64
        }
        Opcode::CmpE => u64::from(lhs == rhs),
        Opcode::CmpNe => u64::from(lhs != rhs),
        Opcode::CmpUlt => u64::from(lhs < rhs),
        Opcode::CmpUle => u64::from(lhs <= rhs),
        Opcode::CmpUgt => u64::from(lhs > rhs),
        Opcode::CmpUge => u64::from(lhs >= rhs),
        _ => return None,
    };
    Some(value)
}
