//! Arena-backed instruction IR of a single function.
//!
//! [`IlFunction`] stores every expression of a function in one vector and refers to
//! them by [`ExprId`]. Instructions are the root expressions of statements, listed in
//! program order; basic blocks are contiguous instruction ranges with explicit successor
//! edges. Blocks are appended in order, and every appended instruction extends the most
//! recently added block.
//!
//! # Building a function
//!
//! ```rust
//! use deobscope::il::{IlFunction, IlView, Opcode};
//!
//! let mut il = IlFunction::new();
//! let eax = il.add_variable("eax");
//! let r0 = il.add_variable("r0");
//! let r1 = il.add_variable("r1");
//!
//! let lhs = il.var(r0, 4);
//! let rhs = il.var(r1, 4);
//! let sum = il.binary(Opcode::Add, 4, lhs, rhs);
//! let index = il.var_init(eax, sum);
//!
//! assert_eq!(index, 0);
//! assert_eq!(il.opcode(sum), Some(Opcode::Add));
//! assert_eq!(il.render_instruction(index).as_deref(), Some("eax = r0 + r1"));
//! ```

use std::ops::Range;

use crate::{
    il::{printer, ExprId, IlRewrite, IlView, Opcode, Operand, VarId},
    utils::graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors},
    Error, Result,
};

/// One node of the expression arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IlExpr {
    /// Operation performed by this node.
    pub opcode: Opcode,
    /// Operand width in bytes.
    pub width: usize,
    /// Operands in the layout documented on [`Opcode`].
    pub operands: Vec<Operand>,
}

/// A basic block: a contiguous range of instructions plus its outgoing edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IlBlock {
    start: usize,
    end: usize,
    successors: Vec<usize>,
}

impl IlBlock {
    /// Index of the first instruction of the block.
    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the index of the last instruction of the block.
    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Instruction indices covered by the block.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Number of instructions in the block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if the block holds no instruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Indices of the successor blocks, in insertion order.
    #[must_use]
    pub fn successors(&self) -> &[usize] {
        &self.successors
    }
}

/// A named variable or register of the function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IlVariable {
    /// Identifier used by `Var` operands.
    pub id: VarId,
    /// Display name.
    pub name: String,
}

/// The instruction IR of one function.
///
/// Expression ids handed out by this type are never reused. Replacing an expression
/// overwrites the arena slot in place, so every parent that referenced the old id sees
/// the new contents without being touched.
#[derive(Debug, Clone, Default)]
pub struct IlFunction {
    exprs: Vec<IlExpr>,
    instructions: Vec<ExprId>,
    blocks: Vec<IlBlock>,
    variables: Vec<IlVariable>,
    ssa_stale: bool,
}

impl IlFunction {
    /// Creates an empty function body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new variable and returns its id.
    pub fn add_variable(&mut self, name: impl Into<String>) -> VarId {
        let id = VarId(u32::try_from(self.variables.len()).unwrap_or(u32::MAX));
        self.variables.push(IlVariable {
            id,
            name: name.into(),
        });
        id
    }

    /// Returns all declared variables, ordered by id.
    #[must_use]
    pub fn variables(&self) -> &[IlVariable] {
        &self.variables
    }

    /// Looks up a declared variable.
    #[must_use]
    pub fn variable(&self, id: VarId) -> Option<&IlVariable> {
        self.variables.get(id.0 as usize)
    }

    /// Finds a variable by name.
    #[must_use]
    pub fn variable_by_name(&self, name: &str) -> Option<VarId> {
        self.variables.iter().find(|v| v.name == name).map(|v| v.id)
    }

    fn push(&mut self, opcode: Opcode, width: usize, operands: Vec<Operand>) -> ExprId {
        let id = ExprId(self.exprs.len());
        self.exprs.push(IlExpr {
            opcode,
            width,
            operands,
        });
        id
    }

    /// Creates a variable read.
    pub fn var(&mut self, var: VarId, width: usize) -> ExprId {
        self.push(Opcode::Var, width, vec![Operand::Var(var)])
    }

    /// Creates an integer constant.
    pub fn constant(&mut self, value: i64, width: usize) -> ExprId {
        self.push(Opcode::Const, width, vec![Operand::Integer(value)])
    }

    /// Creates a binary operation over two existing expressions.
    pub fn binary(&mut self, opcode: Opcode, width: usize, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.push(opcode, width, vec![Operand::Expr(lhs), Operand::Expr(rhs)])
    }

    /// Creates a unary operation over an existing expression.
    pub fn unary(&mut self, opcode: Opcode, width: usize, operand: ExprId) -> ExprId {
        self.push(opcode, width, vec![Operand::Expr(operand)])
    }

    /// Appends a new, empty basic block and returns its node id.
    pub fn add_block(&mut self) -> NodeId {
        let at = self.instructions.len();
        self.blocks.push(IlBlock {
            start: at,
            end: at,
            successors: Vec::new(),
        });
        NodeId::new(self.blocks.len() - 1)
    }

    /// Adds a control flow edge between two blocks.
    ///
    /// Duplicate edges are ignored. Targets may be blocks that do not exist yet.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        if let Some(block) = self.blocks.get_mut(from.index()) {
            if !block.successors.contains(&to.index()) {
                block.successors.push(to.index());
            }
        }
    }

    /// Removes a control flow edge. Returns true if the edge existed.
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        let Some(block) = self.blocks.get_mut(from.index()) else {
            return false;
        };
        let before = block.successors.len();
        block.successors.retain(|&s| s != to.index());
        before != block.successors.len()
    }

    /// Appends a statement to the current (last) block and returns its instruction index.
    ///
    /// A first block is created on demand.
    pub fn append(&mut self, statement: ExprId) -> usize {
        if self.blocks.is_empty() {
            self.add_block();
        }
        self.instructions.push(statement);
        let index = self.instructions.len() - 1;
        if let Some(block) = self.blocks.last_mut() {
            block.end = self.instructions.len();
        }
        index
    }

    fn current_block(&mut self) -> NodeId {
        if self.blocks.is_empty() {
            self.add_block()
        } else {
            NodeId::new(self.blocks.len() - 1)
        }
    }

    /// Appends `dest = src` as a variable initialisation.
    pub fn var_init(&mut self, dest: VarId, src: ExprId) -> usize {
        let width = self.width(src).unwrap_or(0);
        let stmt = self.push(
            Opcode::VarInit,
            width,
            vec![Operand::Var(dest), Operand::Expr(src)],
        );
        self.append(stmt)
    }

    /// Appends `dest = src` as an assignment to an existing variable.
    pub fn set_var(&mut self, dest: VarId, src: ExprId) -> usize {
        let width = self.width(src).unwrap_or(0);
        let stmt = self.push(
            Opcode::SetVar,
            width,
            vec![Operand::Var(dest), Operand::Expr(src)],
        );
        self.append(stmt)
    }

    /// Appends a conditional branch and the two edges it implies.
    pub fn branch(&mut self, condition: ExprId, on_true: NodeId, on_false: NodeId) -> usize {
        let from = self.current_block();
        let stmt = self.push(
            Opcode::If,
            0,
            vec![
                Operand::Expr(condition),
                Operand::Index(on_true.index()),
                Operand::Index(on_false.index()),
            ],
        );
        self.add_edge(from, on_true);
        self.add_edge(from, on_false);
        self.append(stmt)
    }

    /// Appends an unconditional jump and its edge.
    pub fn goto(&mut self, target: NodeId) -> usize {
        let from = self.current_block();
        let stmt = self.push(Opcode::Goto, 0, vec![Operand::Index(target.index())]);
        self.add_edge(from, target);
        self.append(stmt)
    }

    /// Appends a return, optionally with a value.
    pub fn ret(&mut self, value: Option<ExprId>) -> usize {
        let width = value.and_then(|v| self.width(v)).unwrap_or(0);
        let operands = value.map(Operand::Expr).into_iter().collect();
        let stmt = self.push(Opcode::Ret, width, operands);
        self.append(stmt)
    }

    /// Appends a no-op.
    pub fn nop(&mut self) -> usize {
        let stmt = self.push(Opcode::Nop, 0, Vec::new());
        self.append(stmt)
    }

    /// Returns an arena node.
    #[must_use]
    pub fn expression(&self, id: ExprId) -> Option<&IlExpr> {
        self.exprs.get(id.0)
    }

    /// Number of nodes in the arena, including orphaned ones.
    #[must_use]
    pub fn expression_count(&self) -> usize {
        self.exprs.len()
    }

    /// Statement roots in program order.
    #[must_use]
    pub fn instructions(&self) -> &[ExprId] {
        &self.instructions
    }

    /// Returns the root expression of an instruction.
    #[must_use]
    pub fn instruction(&self, index: usize) -> Option<ExprId> {
        self.instructions.get(index).copied()
    }

    /// Number of instructions.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Basic blocks in block order.
    #[must_use]
    pub fn blocks(&self) -> &[IlBlock] {
        &self.blocks
    }

    /// Returns one basic block.
    #[must_use]
    pub fn block(&self, id: NodeId) -> Option<&IlBlock> {
        self.blocks.get(id.index())
    }

    /// Returns the block containing an instruction.
    #[must_use]
    pub fn block_of(&self, instruction: usize) -> Option<NodeId> {
        self.blocks
            .iter()
            .position(|b| b.range().contains(&instruction))
            .map(NodeId::new)
    }

    /// Total number of control flow edges whose target exists.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| {
                b.successors
                    .iter()
                    .filter(|&&s| s < self.blocks.len())
                    .count()
            })
            .sum()
    }

    /// Splits an assignment instruction into its destination and source expression.
    #[must_use]
    pub fn assignment(&self, instruction: usize) -> Option<(VarId, ExprId)> {
        let root = self.expression(self.instruction(instruction)?)?;
        if !root.opcode.is_assignment() {
            return None;
        }
        let dest = root.operands.first()?.as_var()?;
        let src = root.operands.get(1)?.as_expr()?;
        Some((dest, src))
    }

    /// Instruction indices that assign to `var`, in program order.
    #[must_use]
    pub fn variable_definitions(&self, var: VarId) -> Vec<usize> {
        (0..self.instructions.len())
            .filter(|&i| self.assignment(i).is_some_and(|(dest, _)| dest == var))
            .collect()
    }

    /// Variables read anywhere inside an expression tree, in first-seen order.
    #[must_use]
    pub fn variables_read(&self, root: ExprId) -> Vec<VarId> {
        let mut found = Vec::new();
        let mut stack = vec![root];
        let mut steps = 0usize;
        while let Some(id) = stack.pop() {
            steps += 1;
            if steps > self.exprs.len() * 4 + 16 {
                break;
            }
            let Some(expr) = self.expression(id) else {
                continue;
            };
            for operand in expr.operands.iter().rev() {
                match operand {
                    Operand::Expr(child) => stack.push(*child),
                    Operand::Var(var) if expr.opcode == Opcode::Var => {
                        if !found.contains(var) {
                            found.push(*var);
                        }
                    }
                    _ => {}
                }
            }
        }
        found
    }

    /// Returns true if `needle` is reachable from `root` through expression operands.
    fn reaches(&self, root: ExprId, needle: ExprId) -> bool {
        let mut visited = vec![false; self.exprs.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if id == needle {
                return true;
            }
            let Some(seen) = visited.get_mut(id.0) else {
                continue;
            };
            if *seen {
                continue;
            }
            *seen = true;
            if let Some(expr) = self.exprs.get(id.0) {
                stack.extend(expr.operands.iter().filter_map(Operand::as_expr));
            }
        }
        false
    }

    /// Returns true if a rewrite happened since the last [`generate_ssa_form`](Self::generate_ssa_form).
    #[must_use]
    pub fn is_ssa_stale(&self) -> bool {
        self.ssa_stale
    }

    /// Regenerates derived forms after a rewrite.
    ///
    /// The arena carries no separate SSA numbering, so regeneration only clears the
    /// staleness flag. Hosts that mirror the IR elsewhere hook their own rebuild here.
    pub fn generate_ssa_form(&mut self) {
        self.ssa_stale = false;
    }

    /// Renders an expression as infix text.
    #[must_use]
    pub fn render(&self, expr: ExprId) -> String {
        printer::to_infix(self, expr)
    }

    /// Renders an instruction as infix text.
    #[must_use]
    pub fn render_instruction(&self, index: usize) -> Option<String> {
        self.instruction(index).map(|root| self.render(root))
    }
}

impl IlView for IlFunction {
    fn opcode(&self, expr: ExprId) -> Option<Opcode> {
        self.expression(expr).map(|e| e.opcode)
    }

    fn width(&self, expr: ExprId) -> Option<usize> {
        self.expression(expr).map(|e| e.width)
    }

    fn operand_count(&self, expr: ExprId) -> usize {
        self.expression(expr).map_or(0, |e| e.operands.len())
    }

    fn operand_at(&self, expr: ExprId, index: usize) -> Option<&Operand> {
        self.expression(expr)?.operands.get(index)
    }

    fn variable_name(&self, var: VarId) -> Option<&str> {
        self.variable(var).map(|v| v.name.as_str())
    }
}

impl IlRewrite for IlFunction {
    fn add_expression(
        &mut self,
        opcode: Opcode,
        width: usize,
        operands: Vec<Operand>,
    ) -> Result<ExprId> {
        if let Some(missing) = operands
            .iter()
            .filter_map(Operand::as_expr)
            .find(|id| id.0 >= self.exprs.len())
        {
            return Err(Error::InvalidExpression(missing));
        }
        Ok(self.push(opcode, width, operands))
    }

    fn replace_expression(&mut self, old: ExprId, new: ExprId) -> Result<()> {
        if old.0 >= self.exprs.len() {
            return Err(Error::InvalidExpression(old));
        }
        if new.0 >= self.exprs.len() {
            return Err(Error::InvalidExpression(new));
        }
        if old == new {
            return Ok(());
        }
        if self.reaches(new, old) {
            return Err(malformed_error!(
                "replacing {} with {} would make the expression contain itself",
                old,
                new
            ));
        }
        self.exprs[old.0] = self.exprs[new.0].clone();
        self.invalidate_derived();
        Ok(())
    }

    fn invalidate_derived(&mut self) {
        self.ssa_stale = true;
    }
}

impl GraphBase for IlFunction {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.blocks.len()).map(NodeId::new)
    }
}

impl Successors for IlFunction {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        let count = self.blocks.len();
        self.blocks
            .get(node.index())
            .map(|b| b.successors.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(move |&&s| s < count)
            .map(|&s| NodeId::new(s))
    }
}

impl Predecessors for IlFunction {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.blocks
            .iter()
            .enumerate()
            .filter(move |(_, b)| b.successors.contains(&node.index()))
            .map(|(i, _)| NodeId::new(i))
    }
}

impl RootedGraph for IlFunction {
    fn entry(&self) -> NodeId {
        NodeId::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::single_assignment;

    #[test]
    fn test_blocks_cover_appended_instructions() {
        let mut il = IlFunction::new();
        let x = il.add_variable("x");
        let one = il.constant(1, 4);
        il.var_init(x, one);
        let second = il.add_block();
        let two = il.constant(2, 4);
        il.set_var(x, two);
        il.ret(None);

        assert_eq!(il.blocks().len(), 2);
        assert_eq!(il.blocks()[0].range(), 0..1);
        assert_eq!(il.blocks()[1].range(), 1..3);
        assert_eq!(il.block_of(2), Some(second));
        assert_eq!(il.variable_definitions(x), vec![0, 1]);
    }

    #[test]
    fn test_branch_adds_edges() {
        let mut il = IlFunction::new();
        let entry = il.add_block();
        let cond = il.constant(1, 1);
        il.branch(cond, NodeId::new(1), NodeId::new(2));
        il.add_block();
        il.nop();
        il.add_block();
        il.nop();

        let succs: Vec<_> = il.successors(entry).collect();
        assert_eq!(succs, vec![NodeId::new(1), NodeId::new(2)]);
        assert_eq!(il.edge_count(), 2);
        assert_eq!(il.predecessors(NodeId::new(2)).collect::<Vec<_>>(), vec![entry]);
        assert!(il.remove_edge(entry, NodeId::new(2)));
        assert!(!il.remove_edge(entry, NodeId::new(2)));
        assert_eq!(il.edge_count(), 1);
    }

    #[test]
    fn test_dangling_edges_are_not_successors() {
        let mut il = IlFunction::new();
        il.goto(NodeId::new(7));
        assert_eq!(il.successors(NodeId::new(0)).count(), 0);
        assert_eq!(il.edge_count(), 0);
    }

    #[test]
    fn test_replace_expression_overwrites_slot() {
        let (mut il, _, rhs) = single_assignment(Opcode::Add);
        let operands = il.expression_operands(rhs);
        let new = il
            .add_expression(
                Opcode::Mul,
                4,
                operands.iter().map(|&e| Operand::Expr(e)).collect(),
            )
            .unwrap();

        il.replace_expression(rhs, new).unwrap();
        assert_eq!(il.opcode(rhs), Some(Opcode::Mul));
        assert_eq!(il.expression_operands(rhs), operands);
        assert!(il.is_ssa_stale());
        il.generate_ssa_form();
        assert!(!il.is_ssa_stale());
    }

    #[test]
    fn test_replace_rejects_cycles_and_unknown_ids() {
        let (mut il, _, rhs) = single_assignment(Opcode::Add);
        let wrapper = il.unary(Opcode::Not, 4, rhs);

        assert!(matches!(
            il.replace_expression(rhs, wrapper),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            il.replace_expression(ExprId::new(999), rhs),
            Err(Error::InvalidExpression(_))
        ));
        assert!(matches!(
            il.add_expression(Opcode::Not, 4, vec![Operand::Expr(ExprId::new(999))]),
            Err(Error::InvalidExpression(_))
        ));
        assert!(!il.is_ssa_stale());
    }

    #[test]
    fn test_variables_read() {
        let (il, instruction, rhs) = single_assignment(Opcode::Xor);
        let read = il.variables_read(rhs);
        assert_eq!(read.len(), 2);
        assert_eq!(il.variable(read[0]).unwrap().name, "r0");
        assert_eq!(il.assignment(instruction).map(|(_, src)| src), Some(rhs));
    }
}
