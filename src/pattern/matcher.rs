//! Structural matching of pattern trees against IR expressions.
//!
//! A pattern node matches an IR expression when:
//!
//! - an operator node faces an expression with the same opcode, and every pattern child
//!   matches the corresponding operand; operands that are not nested expressions
//!   (indices, raw integers, variable slots) fail the branch, as does an expression with
//!   fewer operands than the pattern has children
//! - a constant leaf faces a `Const` expression holding the same value
//! - a variable leaf faces a `Var` expression
//!
//! In [`BindingMode::Independent`] every variable leaf is its own wildcard, so `a ^ a`
//! matches `x ^ y`. [`BindingMode::Consistent`] additionally requires every occurrence
//! of one name to see the same IR variable.
//!
//! Matching never mutates the IR.

use std::collections::HashMap;

use crate::{
    il::{ExprId, IlView, Opcode, OperandKind, VarId},
    pattern::ExprNode,
};

/// How repeated pattern variables are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BindingMode {
    /// Each variable leaf matches any IR variable on its own.
    #[default]
    Independent,
    /// All leaves with the same name must match the same IR variable.
    Consistent,
}

/// What a pattern variable was matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// The IR expression the leaf matched (its first occurrence).
    pub expr: ExprId,
    /// The IR variable read by that expression.
    pub var: VarId,
}

/// Pattern variable captures of one successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    captures: HashMap<String, Binding>,
}

impl Bindings {
    /// Returns the capture of a pattern variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.captures.get(name)
    }

    /// Number of distinct pattern variables captured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.captures.len()
    }

    /// Returns true if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    /// Iterates over captures, sorted by pattern variable name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        let mut entries: Vec<_> = self.captures.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    /// Records a capture; returns false if `mode` forbids it.
    fn bind(&mut self, name: &str, binding: Binding, mode: BindingMode) -> bool {
        match self.captures.get(name) {
            Some(existing) => mode == BindingMode::Independent || existing.var == binding.var,
            None => {
                self.captures.insert(name.to_string(), binding);
                true
            }
        }
    }
}

/// Matches pattern trees against IR expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternMatcher {
    mode: BindingMode,
}

impl PatternMatcher {
    /// Creates a matcher with the given binding mode.
    #[must_use]
    pub fn new(mode: BindingMode) -> Self {
        Self { mode }
    }

    /// The binding mode in effect.
    #[must_use]
    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    /// Returns true if `pattern` matches the expression `expr`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use deobscope::il::{IlFunction, Opcode};
    /// use deobscope::pattern::{parse_expression, BindingMode, PatternMatcher};
    ///
    /// let mut il = IlFunction::new();
    /// let (r0, r1) = (il.add_variable("r0"), il.add_variable("r1"));
    /// let (a, b) = (il.var(r0, 4), il.var(r1, 4));
    /// let sum = il.binary(Opcode::Add, 4, a, b);
    ///
    /// let pattern = parse_expression("x+x").unwrap();
    /// assert!(PatternMatcher::new(BindingMode::Independent).matches(&pattern, &il, sum));
    /// assert!(!PatternMatcher::new(BindingMode::Consistent).matches(&pattern, &il, sum));
    /// ```
    #[must_use]
    pub fn matches<V: IlView + ?Sized>(&self, pattern: &ExprNode, il: &V, expr: ExprId) -> bool {
        self.match_with_bindings(pattern, il, expr).is_some()
    }

    /// Matches and returns the variable captures on success.
    #[must_use]
    pub fn match_with_bindings<V: IlView + ?Sized>(
        &self,
        pattern: &ExprNode,
        il: &V,
        expr: ExprId,
    ) -> Option<Bindings> {
        let mut bindings = Bindings::default();
        if self.match_node(pattern, il, expr, &mut bindings) {
            Some(bindings)
        } else {
            None
        }
    }

    fn match_node<V: IlView + ?Sized>(
        &self,
        pattern: &ExprNode,
        il: &V,
        expr: ExprId,
        bindings: &mut Bindings,
    ) -> bool {
        let Some(opcode) = il.opcode(expr) else {
            return false;
        };

        if pattern.is_operator() {
            if pattern.opcode() != Some(opcode) {
                return false;
            }
            let children = pattern.children();
            if children.len() > il.operand_count(expr) {
                return false;
            }
            return children.iter().enumerate().all(|(i, child)| {
                match il.operand_at(expr, i) {
                    Some(operand) if operand.kind() == OperandKind::Expression => operand
                        .as_expr()
                        .is_some_and(|sub| self.match_node(child, il, sub, bindings)),
                    _ => false,
                }
            });
        }

        if pattern.is_constant() {
            return opcode == Opcode::Const
                && pattern
                    .token()
                    .constant_value()
                    .is_some_and(|value| il.constant_value(expr) == Some(value));
        }

        if pattern.is_variable() && opcode == Opcode::Var {
            let Some(var) = il.operand_at(expr, 0).and_then(|o| o.as_var()) else {
                return false;
            };
            return bindings.bind(pattern.token().text(), Binding { expr, var }, self.mode);
        }

        false
    }
}

/// Matches with independent wildcards.
#[must_use]
pub fn matches<V: IlView + ?Sized>(pattern: &ExprNode, il: &V, expr: ExprId) -> bool {
    PatternMatcher::default().matches(pattern, il, expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        il::{IlFunction, IlRewrite, Operand},
        pattern::parse_expression,
    };

    fn pattern(text: &str) -> ExprNode {
        parse_expression(text).unwrap()
    }

    #[test]
    fn test_operator_mismatch_fails() {
        let mut il = IlFunction::new();
        let (x, y) = (il.add_variable("x"), il.add_variable("y"));
        let (a, b) = (il.var(x, 4), il.var(y, 4));
        let sum = il.binary(Opcode::Add, 4, a, b);

        assert!(matches(&pattern("a+b"), &il, sum));
        assert!(!matches(&pattern("a*b"), &il, sum));
        assert!(!matches(&pattern("a"), &il, sum));
        assert!(!matches(&pattern("1"), &il, sum));
    }

    #[test]
    fn test_nested_structure() {
        let mut il = IlFunction::new();
        let (x, y) = (il.add_variable("x"), il.add_variable("y"));
        let (a, b) = (il.var(x, 4), il.var(y, 4));
        let or = il.binary(Opcode::Or, 4, a, b);
        let (a, b) = (il.var(x, 4), il.var(y, 4));
        let and = il.binary(Opcode::And, 4, a, b);
        let sum = il.binary(Opcode::Add, 4, or, and);

        assert!(matches(&pattern("(a|b)+(a&b)"), &il, sum));
        assert!(!matches(&pattern("(a&b)+(a|b)"), &il, sum));
        assert!(!matches(&pattern("a+b"), &il, sum));
    }

    #[test]
    fn test_constant_exactness() {
        let mut il = IlFunction::new();
        let x = il.add_variable("x");
        let five = pattern("5");
        for value in [-1, 0, 4, 5, 6, 500] {
            let c = il.constant(value, 4);
            assert_eq!(matches(&five, &il, c), value == 5);
        }
        let v = il.var(x, 4);
        assert!(!matches(&five, &il, v));
    }

    #[test]
    fn test_variable_leaf_requires_var_node() {
        let mut il = IlFunction::new();
        let x = il.add_variable("x");
        let c = il.constant(3, 4);
        let v = il.var(x, 4);
        let not = il.unary(Opcode::Not, 4, v);

        assert!(matches(&pattern("a"), &il, v));
        assert!(!matches(&pattern("a"), &il, c));
        assert!(!matches(&pattern("a"), &il, not));
        assert!(matches(&pattern("~a"), &il, not));
    }

    #[test]
    fn test_non_expression_operands_fail() {
        let mut il = IlFunction::new();
        let x = il.add_variable("x");
        let v = il.var(x, 4);
        let odd = il
            .add_expression(Opcode::Add, 4, vec![Operand::Expr(v), Operand::Index(3)])
            .unwrap();
        let short = il
            .add_expression(Opcode::Add, 4, vec![Operand::Expr(v)])
            .unwrap();

        assert!(!matches(&pattern("a+b"), &il, odd));
        assert!(!matches(&pattern("a+b"), &il, short));
        assert!(!matches(&pattern("a+b"), &il, ExprId::new(999)));
    }

    #[test]
    fn test_binding_modes() {
        let mut il = IlFunction::new();
        let (x, y) = (il.add_variable("x"), il.add_variable("y"));
        let (a, b) = (il.var(x, 4), il.var(y, 4));
        let mixed = il.binary(Opcode::Xor, 4, a, b);
        let (c, d) = (il.var(x, 4), il.var(x, 4));
        let same = il.binary(Opcode::Xor, 4, c, d);

        let twice = pattern("a^a");
        let independent = PatternMatcher::new(BindingMode::Independent);
        let consistent = PatternMatcher::new(BindingMode::Consistent);

        assert!(independent.matches(&twice, &il, mixed));
        assert!(!consistent.matches(&twice, &il, mixed));
        assert!(consistent.matches(&twice, &il, same));

        let bindings = consistent.match_with_bindings(&twice, &il, same).unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.get("a"), Some(&Binding { expr: c, var: x }));
    }

    #[test]
    fn test_bindings_record_first_occurrence() {
        let mut il = IlFunction::new();
        let (x, y) = (il.add_variable("x"), il.add_variable("y"));
        let (a, b) = (il.var(x, 4), il.var(y, 4));
        let sum = il.binary(Opcode::Add, 4, a, b);

        let bindings = PatternMatcher::default()
            .match_with_bindings(&pattern("p+q"), &il, sum)
            .unwrap();
        let names: Vec<&str> = bindings.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["p", "q"]);
        assert_eq!(bindings.get("q").map(|b| b.expr), Some(b));
    }
}
