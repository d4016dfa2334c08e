//! Text rendering of IR expressions.
//!
//! Two forms are produced: [`to_infix`] prints an expression the way a pattern would be
//! written (`eax = (r0 | r1) + (r0 & r1)`), and [`dump`] prints one node per line with
//! its opcode, width and operands, indented by depth.

use std::fmt::Write;

use crate::{
    il::{ExprId, IlView, Opcode, Operand},
    pattern::symbols,
};

/// Guards against malformed, self-referencing IR.
const MAX_DEPTH: usize = 256;

/// Renders an expression as infix text.
///
/// Nested binary operations are always parenthesised, so the output never depends on
/// precedence rules. Unknown ids render as `<eN>`.
#[must_use]
pub fn to_infix<V: IlView + ?Sized>(il: &V, expr: ExprId) -> String {
    let mut out = String::new();
    infix(il, expr, &mut out, 0);
    out
}

fn operand_text<V: IlView + ?Sized>(il: &V, operand: &Operand, out: &mut String, depth: usize) {
    match operand {
        Operand::Expr(id) => infix(il, *id, out, depth + 1),
        Operand::Integer(value) => {
            let _ = write!(out, "{value:#x}");
        }
        Operand::Var(var) => match il.variable_name(*var) {
            Some(name) => out.push_str(name),
            None => {
                let _ = write!(out, "{var}");
            }
        },
        Operand::Index(index) => {
            let _ = write!(out, "{index}");
        }
        Operand::IndexList(list) => {
            let items: Vec<String> = list.iter().map(ToString::to_string).collect();
            let _ = write!(out, "[{}]", items.join(", "));
        }
    }
}

fn nested<V: IlView + ?Sized>(il: &V, operand: Option<&Operand>, out: &mut String, depth: usize) {
    let Some(operand) = operand else {
        out.push('?');
        return;
    };
    let wrap = operand
        .as_expr()
        .and_then(|id| il.opcode(id))
        .is_some_and(Opcode::is_binary);
    if wrap {
        out.push('(');
    }
    operand_text(il, operand, out, depth);
    if wrap {
        out.push(')');
    }
}

fn infix<V: IlView + ?Sized>(il: &V, expr: ExprId, out: &mut String, depth: usize) {
    let Some(opcode) = il.opcode(expr) else {
        let _ = write!(out, "<{expr}>");
        return;
    };
    if depth > MAX_DEPTH {
        out.push_str("...");
        return;
    }

    let arg = |i: usize| il.operand_at(expr, i);
    match opcode {
        Opcode::Var | Opcode::Const => match arg(0) {
            Some(operand) => operand_text(il, operand, out, depth),
            None => out.push('?'),
        },
        Opcode::VarInit | Opcode::SetVar => {
            match arg(0) {
                Some(dest) => operand_text(il, dest, out, depth),
                None => out.push('?'),
            }
            out.push_str(" = ");
            match arg(1) {
                Some(src) => operand_text(il, src, out, depth),
                None => out.push('?'),
            }
        }
        Opcode::If => {
            out.push_str("if (");
            match arg(0) {
                Some(cond) => operand_text(il, cond, out, depth),
                None => out.push('?'),
            }
            out.push_str(") then ");
            match arg(1) {
                Some(t) => operand_text(il, t, out, depth),
                None => out.push('?'),
            }
            out.push_str(" else ");
            match arg(2) {
                Some(f) => operand_text(il, f, out, depth),
                None => out.push('?'),
            }
        }
        Opcode::Goto => {
            out.push_str("goto ");
            match arg(0) {
                Some(target) => operand_text(il, target, out, depth),
                None => out.push('?'),
            }
        }
        Opcode::Ret => {
            out.push_str("return");
            if let Some(value) = arg(0) {
                out.push(' ');
                operand_text(il, value, out, depth);
            }
        }
        Opcode::Nop => out.push_str("nop"),
        Opcode::Neg => {
            out.push('-');
            nested(il, arg(0), out, depth);
        }
        op if op.is_binary() => {
            nested(il, arg(0), out, depth);
            match symbols::symbol_for(op) {
                Some(symbol) => {
                    let _ = write!(out, " {symbol} ");
                }
                None => {
                    let _ = write!(out, " {op} ");
                }
            }
            nested(il, arg(1), out, depth);
        }
        op if op.is_unary() => {
            out.push_str(symbols::symbol_for(op).unwrap_or("?"));
            nested(il, arg(0), out, depth);
        }
        op => {
            let _ = write!(out, "{op}(");
            for i in 0..il.operand_count(expr) {
                if i > 0 {
                    out.push_str(", ");
                }
                if let Some(operand) = arg(i) {
                    operand_text(il, operand, out, depth);
                }
            }
            out.push(')');
        }
    }
}

/// Renders an expression tree one node per line.
///
/// ```rust
/// use deobscope::il::{printer, IlFunction, Opcode};
///
/// let mut il = IlFunction::new();
/// let x = il.add_variable("x");
/// let lhs = il.var(x, 4);
/// let rhs = il.constant(3, 4);
/// let sum = il.binary(Opcode::Add, 4, lhs, rhs);
///
/// assert_eq!(
///     printer::dump(&il, sum),
///     "ADD.4 e2\n  VAR.4 e0 x\n  CONST.4 e1 0x3\n"
/// );
/// ```
#[must_use]
pub fn dump<V: IlView + ?Sized>(il: &V, expr: ExprId) -> String {
    let mut out = String::new();
    dump_node(il, expr, 0, &mut out);
    out
}

fn dump_node<V: IlView + ?Sized>(il: &V, expr: ExprId, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let Some(opcode) = il.opcode(expr) else {
        let _ = writeln!(out, "{indent}<invalid {expr}>");
        return;
    };
    if depth > MAX_DEPTH {
        let _ = writeln!(out, "{indent}...");
        return;
    }

    let width = il.width(expr).unwrap_or(0);
    let _ = write!(out, "{indent}{opcode}.{width} {expr}");
    let mut children = Vec::new();
    for i in 0..il.operand_count(expr) {
        match il.operand_at(expr, i) {
            Some(Operand::Expr(child)) => children.push(*child),
            Some(other) => {
                out.push(' ');
                operand_text(il, other, out, depth);
            }
            None => {}
        }
    }
    out.push('\n');
    for child in children {
        dump_node(il, child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{il::IlFunction, utils::graph::NodeId};

    #[test]
    fn test_infix_parenthesises_nested_binaries() {
        let mut il = IlFunction::new();
        let t = il.add_variable("t");
        let a = il.add_variable("a");
        let b = il.add_variable("b");
        let (va, vb) = (il.var(a, 4), il.var(b, 4));
        let or = il.binary(Opcode::Or, 4, va, vb);
        let (va, vb) = (il.var(a, 4), il.var(b, 4));
        let and = il.binary(Opcode::And, 4, va, vb);
        let sum = il.binary(Opcode::Add, 4, or, and);
        let not = il.unary(Opcode::Not, 4, sum);
        let index = il.var_init(t, not);

        assert_eq!(
            il.render_instruction(index).unwrap(),
            "t = ~((a | b) + (a & b))"
        );
    }

    #[test]
    fn test_statements() {
        let mut il = IlFunction::new();
        let one = il.constant(1, 1);
        let two = il.constant(2, 1);
        let cmp = il.binary(Opcode::CmpUlt, 1, one, two);
        let branch = il.branch(cmp, NodeId::new(1), NodeId::new(2));
        let jump = il.goto(NodeId::new(3));
        let ret = il.ret(Some(one));

        assert_eq!(
            il.render_instruction(branch).unwrap(),
            "if (0x1 < 0x2) then 1 else 2"
        );
        assert_eq!(il.render_instruction(jump).unwrap(), "goto 3");
        assert_eq!(il.render_instruction(ret).unwrap(), "return 0x1");
    }

    #[test]
    fn test_unknown_ids() {
        let il = IlFunction::new();
        assert_eq!(to_infix(&il, ExprId::new(4)), "<e4>");
        assert_eq!(dump(&il, ExprId::new(4)), "<invalid e4>\n");
    }
}
