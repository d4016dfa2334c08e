//! Lowering of parsed pattern trees into IR.
//!
//! Variables are looked up by name in the target function and declared on first use;
//! constants become `Const` nodes holding their parsed value. Every node gets the same
//! width.

use crate::{
    il::{ExprId, IlFunction, VarId},
    pattern::ExprNode,
    Error, Result,
};

/// Builds the IR expression for a pattern tree.
///
/// # Errors
///
/// Returns [`Error::Parse`] if a constant does not fit 64 bits or a node carries no
/// opcode where one is required.
///
/// # Examples
///
/// ```rust
/// use deobscope::{il::IlFunction, pattern::{lower, parse_expression}};
///
/// let mut il = IlFunction::new();
/// let tree = parse_expression("(x|y)+(x&y)").unwrap();
/// let expr = lower::lower_expression(&mut il, &tree, 4)?;
///
/// assert_eq!(il.render(expr), "(x | y) + (x & y)");
/// assert_eq!(il.variables().len(), 2);
/// # Ok::<(), deobscope::Error>(())
/// ```
pub fn lower_expression(il: &mut IlFunction, tree: &ExprNode, width: usize) -> Result<ExprId> {
    if tree.is_variable() {
        let var = variable(il, tree.token().text());
        return Ok(il.var(var, width));
    }
    if tree.is_constant() {
        let value = tree.token().constant_value().ok_or_else(|| Error::Parse {
            expression: tree.to_string(),
            message: format!("constant '{}' does not fit 64 bits", tree.token().text()),
        })?;
        return Ok(il.constant(value, width));
    }

    let opcode = tree.opcode().ok_or_else(|| Error::Parse {
        expression: tree.to_string(),
        message: format!("'{}' is not an operator", tree.token().text()),
    })?;
    match tree.children() {
        [operand] => {
            let operand = lower_expression(il, operand, width)?;
            Ok(il.unary(opcode, width, operand))
        }
        [lhs, rhs] => {
            let lhs = lower_expression(il, lhs, width)?;
            let rhs = lower_expression(il, rhs, width)?;
            Ok(il.binary(opcode, width, lhs, rhs))
        }
        children => Err(Error::Parse {
            expression: tree.to_string(),
            message: format!("operator with {} operands", children.len()),
        }),
    }
}

/// Appends `dest = tree` to the function and returns the instruction index.
///
/// # Errors
///
/// Same as [`lower_expression`].
pub fn lower_assignment(
    il: &mut IlFunction,
    dest: &str,
    tree: &ExprNode,
    width: usize,
) -> Result<usize> {
    let dest = variable(il, dest);
    let src = lower_expression(il, tree, width)?;
    Ok(il.var_init(dest, src))
}

fn variable(il: &mut IlFunction, name: &str) -> VarId {
    match il.variable_by_name(name) {
        Some(var) => var,
        None => il.add_variable(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        il::{IlView, Opcode},
        pattern::parse_expression,
    };

    #[test]
    fn test_lower_reuses_variables() {
        let mut il = IlFunction::new();
        let tree = parse_expression("~a + a * 3").unwrap();
        let index = lower_assignment(&mut il, "t0", &tree, 8).unwrap();

        assert_eq!(il.variables().len(), 2);
        assert_eq!(il.render_instruction(index).unwrap(), "t0 = ~a + (a * 0x3)");
        let (_, rhs) = il.assignment(index).unwrap();
        assert_eq!(il.opcode(rhs), Some(Opcode::Add));
        assert_eq!(il.width(rhs), Some(8));
    }

    #[test]
    fn test_oversized_constant_is_rejected() {
        let mut il = IlFunction::new();
        let tree = parse_expression("a + 99999999999999999999").unwrap();
        assert!(matches!(
            lower_expression(&mut il, &tree, 4),
            Err(Error::Parse { .. })
        ));
    }
}
