//! Substitution of matched expressions by their simplified form.
//!
//! A rewrite builds one new expression and replaces the matched one with it, through
//! [`IlRewrite::add_expression`] and [`IlRewrite::replace_expression`]. Every check runs
//! before the first mutation, so a declined rewrite leaves the IR untouched.
//!
//! Two strategies exist:
//!
//! - [`RewriteStrategy::PrincipalOperands`] takes the root operator of the simplified
//!   form and applies it to the leading operands of the matched expression, keeping the
//!   matched width. `a+b` over a matched `(x|y)+(x&y)` yields `(x|y) + (x&y)` with the
//!   root opcode swapped; over a matched `x*y` it yields `x + y`.
//! - [`RewriteStrategy::Template`] instantiates the whole simplified tree, substituting
//!   each variable with the IR expression it captured during matching and each
//!   constant with a fresh constant of the matched width.

use std::fmt;

use crate::{
    il::{ExprId, IlRewrite, Opcode, Operand},
    pattern::{Bindings, ExprNode},
};

/// How the replacement expression is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RewriteStrategy {
    /// Simplified root operator over the matched expression's leading operands.
    #[default]
    PrincipalOperands,
    /// Full simplified tree over the captured sub-expressions.
    Template,
}

/// Why a rewrite was not performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineReason {
    /// The matched id does not name an expression.
    UnknownExpression(ExprId),
    /// The simplified root is an operand, not an operator.
    NotAnOperator,
    /// The matched expression has fewer nested operands than the simplified root needs.
    ArityMismatch {
        /// Operands the simplified root consumes
        needed: usize,
        /// Nested expression operands of the matched node
        available: usize,
    },
    /// The simplified root would reproduce the matched opcode.
    SameOpcode(Opcode),
    /// A simplified variable did not appear on the matched side.
    UnboundVariable(String),
    /// A simplified constant does not fit a 64-bit value.
    InvalidConstant(String),
    /// The IR refused the mutation.
    Ir(String),
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownExpression(id) => write!(f, "unknown expression {id}"),
            Self::NotAnOperator => f.write_str("simplified form has no root operator"),
            Self::ArityMismatch { needed, available } => write!(
                f,
                "simplified root needs {needed} operand(s), matched node has {available}"
            ),
            Self::SameOpcode(op) => write!(f, "simplified root is already {op}"),
            Self::UnboundVariable(name) => write!(f, "variable '{name}' is not bound"),
            Self::InvalidConstant(text) => write!(f, "constant '{text}' does not fit"),
            Self::Ir(message) => write!(f, "IR rejected rewrite: {message}"),
        }
    }
}

/// Result of one rewrite attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// The matched expression now holds the contents of `replacement`.
    Replaced {
        /// The freshly built expression that was copied into the matched slot
        replacement: ExprId,
    },
    /// Nothing was changed.
    Declined(DeclineReason),
}

impl RewriteOutcome {
    /// Returns true if the IR was changed.
    #[must_use]
    pub fn is_replaced(&self) -> bool {
        matches!(self, Self::Replaced { .. })
    }
}

/// Performs substitutions with a fixed strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rewriter {
    strategy: RewriteStrategy,
}

impl Rewriter {
    /// Creates a rewriter.
    #[must_use]
    pub fn new(strategy: RewriteStrategy) -> Self {
        Self { strategy }
    }

    /// The strategy in effect.
    #[must_use]
    pub fn strategy(&self) -> RewriteStrategy {
        self.strategy
    }

    /// Replaces `matched` by the simplified form and returns the number of
    /// substitutions made (0 or 1).
    ///
    /// # Arguments
    ///
    /// * `il` - IR of the function containing `matched`
    /// * `matched` - The expression the obfuscated form matched
    /// * `replacement` - Tree of the simplified form
    /// * `bindings` - Captures of the match (only read by the template strategy)
    pub fn substitute<I: IlRewrite + ?Sized>(
        &self,
        il: &mut I,
        matched: ExprId,
        replacement: &ExprNode,
        bindings: &Bindings,
    ) -> usize {
        match self.rewrite(il, matched, replacement, bindings) {
            RewriteOutcome::Replaced { .. } => 1,
            RewriteOutcome::Declined(reason) => {
                log::warn!("Declined rewrite of {matched} to '{replacement}': {reason}");
                0
            }
        }
    }

    /// Attempts a substitution and reports the outcome.
    pub fn rewrite<I: IlRewrite + ?Sized>(
        &self,
        il: &mut I,
        matched: ExprId,
        replacement: &ExprNode,
        bindings: &Bindings,
    ) -> RewriteOutcome {
        let result = match self.strategy {
            RewriteStrategy::PrincipalOperands => principal(il, matched, replacement),
            RewriteStrategy::Template => template(il, matched, replacement, bindings),
        };
        match result {
            Ok(new) => {
                if let Err(error) = il.replace_expression(matched, new) {
                    return RewriteOutcome::Declined(DeclineReason::Ir(error.to_string()));
                }
                il.invalidate_derived();
                log::debug!("Rewrote {matched} as '{replacement}'");
                RewriteOutcome::Replaced { replacement: new }
            }
            Err(reason) => RewriteOutcome::Declined(reason),
        }
    }
}

fn principal<I: IlRewrite + ?Sized>(
    il: &mut I,
    matched: ExprId,
    replacement: &ExprNode,
) -> Result<ExprId, DeclineReason> {
    let matched_opcode = il
        .opcode(matched)
        .ok_or(DeclineReason::UnknownExpression(matched))?;
    let width = il.width(matched).unwrap_or(0);

    let Some(opcode) = replacement.opcode() else {
        return Err(DeclineReason::NotAnOperator);
    };
    let needed = replacement.children().len();
    let operands = il.expression_operands(matched);
    if operands.len() < needed {
        return Err(DeclineReason::ArityMismatch {
            needed,
            available: operands.len(),
        });
    }
    if opcode == matched_opcode {
        return Err(DeclineReason::SameOpcode(opcode));
    }

    let operands = operands[..needed].iter().map(|&e| Operand::Expr(e)).collect();
    il.add_expression(opcode, width, operands)
        .map_err(|e| DeclineReason::Ir(e.to_string()))
}

fn template<I: IlRewrite + ?Sized>(
    il: &mut I,
    matched: ExprId,
    replacement: &ExprNode,
    bindings: &Bindings,
) -> Result<ExprId, DeclineReason> {
    if il.opcode(matched).is_none() {
        return Err(DeclineReason::UnknownExpression(matched));
    }
    let width = il.width(matched).unwrap_or(0);

    validate(replacement, bindings)?;
    if replacement.is_leaf() && replacement.is_variable() {
        // A bare variable is copied from its capture; no node needs building.
        return bindings
            .get(replacement.token().text())
            .map(|b| b.expr)
            .ok_or_else(|| DeclineReason::UnboundVariable(replacement.token().text().to_string()));
    }
    instantiate(il, replacement, bindings, width)
}

fn validate(node: &ExprNode, bindings: &Bindings) -> Result<(), DeclineReason> {
    if node.is_variable() && bindings.get(node.token().text()).is_none() {
        return Err(DeclineReason::UnboundVariable(node.token().text().to_string()));
    }
    if node.is_constant() && node.token().constant_value().is_none() {
        return Err(DeclineReason::InvalidConstant(node.token().text().to_string()));
    }
    node.children()
        .iter()
        .try_for_each(|child| validate(child, bindings))
}

fn instantiate<I: IlRewrite + ?Sized>(
    il: &mut I,
    node: &ExprNode,
    bindings: &Bindings,
    width: usize,
) -> Result<ExprId, DeclineReason> {
    let ir = |e: crate::Error| DeclineReason::Ir(e.to_string());

    if node.is_variable() {
        return bindings
            .get(node.token().text())
            .map(|b| b.expr)
            .ok_or_else(|| DeclineReason::UnboundVariable(node.token().text().to_string()));
    }
    if node.is_constant() {
        let value = node
            .token()
            .constant_value()
            .ok_or_else(|| DeclineReason::InvalidConstant(node.token().text().to_string()))?;
        return il
            .add_expression(Opcode::Const, width, vec![Operand::Integer(value)])
            .map_err(ir);
    }

    let opcode = node.opcode().ok_or(DeclineReason::NotAnOperator)?;
    let mut operands = Vec::with_capacity(node.children().len());
    for child in node.children() {
        operands.push(Operand::Expr(instantiate(il, child, bindings, width)?));
    }
    il.add_expression(opcode, width, operands).map_err(ir)
}
