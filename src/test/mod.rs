//! Shared IR fixtures for unit tests.

use crate::{
    il::{ExprId, IlFunction, Opcode},
    utils::graph::NodeId,
};

/// Builds `eax = r0 OP r1` at width 4.
///
/// Variables are declared as `eax`, `r0`, `r1`. Returns the function, the index of the
/// assignment and the id of its source expression.
pub fn single_assignment(opcode: Opcode) -> (IlFunction, usize, ExprId) {
    let mut il = IlFunction::new();
    let eax = il.add_variable("eax");
    let r0 = il.add_variable("r0");
    let r1 = il.add_variable("r1");
    let lhs = il.var(r0, 4);
    let rhs = il.var(r1, 4);
    let expr = il.binary(opcode, 4, lhs, rhs);
    let index = il.var_init(eax, expr);
    (il, index, expr)
}

/// Builds a state-machine loop over six blocks.
///
/// ```text
/// 0: state = 0; x = 7; goto 1
/// 1: if (state == 0) then 2 else 3      <- dispatcher
/// 2: state = 1; goto 1
/// 3: if (state == 1) then 4 else 5
/// 4: state = 2; goto 1
/// 5: return x
/// ```
pub fn flattened_dispatcher() -> IlFunction {
    let mut il = IlFunction::new();
    let state = il.add_variable("state");
    let x = il.add_variable("x");

    il.add_block();
    let zero = il.constant(0, 4);
    il.var_init(state, zero);
    let seed = il.constant(7, 4);
    il.var_init(x, seed);
    il.goto(NodeId::new(1));

    il.add_block();
    let s = il.var(state, 4);
    let c = il.constant(0, 4);
    let cond = il.binary(Opcode::CmpE, 1, s, c);
    il.branch(cond, NodeId::new(2), NodeId::new(3));

    il.add_block();
    let one = il.constant(1, 4);
    il.set_var(state, one);
    il.goto(NodeId::new(1));

    il.add_block();
    let s = il.var(state, 4);
    let c = il.constant(1, 4);
    let cond = il.binary(Opcode::CmpE, 1, s, c);
    il.branch(cond, NodeId::new(4), NodeId::new(5));

    il.add_block();
    let two = il.constant(2, 4);
    il.set_var(state, two);
    il.goto(NodeId::new(1));

    il.add_block();
    let value = il.var(x, 4);
    il.ret(Some(value));
    il
}

/// Builds a diamond whose condition is `y ^ y`, which is always zero.
///
/// ```text
/// 0: if ((y ^ y) != 0) then 1 else 2
/// 1: y = 1; goto 3
/// 2: y = 2; goto 3
/// 3: return y
/// ```
pub fn opaque_diamond() -> IlFunction {
    let mut il = IlFunction::new();
    let y = il.add_variable("y");

    il.add_block();
    let a = il.var(y, 4);
    let b = il.var(y, 4);
    let xor = il.binary(Opcode::Xor, 4, a, b);
    let zero = il.constant(0, 4);
    let cond = il.binary(Opcode::CmpNe, 1, xor, zero);
    il.branch(cond, NodeId::new(1), NodeId::new(2));

    for value in [1, 2] {
        il.add_block();
        let c = il.constant(value, 4);
        il.set_var(y, c);
        il.goto(NodeId::new(3));
    }

    il.add_block();
    let result = il.var(y, 4);
    il.ret(Some(result));
    il
}
