//! Opaque predicate solver.
//!
//! A conditional branch whose condition folds to a constant (see [`eval`]) always
//! goes the same way. The solver replaces such a branch by a jump to the taken target
//! and drops the edge to the other one. Patching can make further conditions
//! decidable, so passes repeat until one patches nothing or the pass limit is hit.

use crate::{
    events::EventKind,
    il::{eval, Function, IlFunction, IlRewrite, IlView, Opcode, Operand},
    methods::{AnalysisContext, MethodOutcome},
    utils::graph::NodeId,
    Result,
};

/// Instructions between two cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 100;

/// Counters of one solver run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PredicateReport {
    /// Branches turned into jumps.
    pub patched: usize,
    /// Passes run, including the last one that found nothing.
    pub passes: usize,
}

/// The opaque predicate solver method.
#[derive(Debug, Clone)]
pub struct PredicateSolver {
    max_passes: usize,
}

impl PredicateSolver {
    /// Creates a solver running at most `max_passes` passes.
    #[must_use]
    pub fn new(max_passes: usize) -> Self {
        Self { max_passes }
    }

    /// Patches every decidable branch of a function body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] if the context's cancellation flag is set;
    /// branches patched before that stay patched. IR errors from the rewrite surface are
    /// propagated.
    pub fn solve(
        &self,
        il: &mut IlFunction,
        ctx: &AnalysisContext,
        address: u64,
    ) -> Result<PredicateReport> {
        let mut report = PredicateReport::default();

        while report.passes < self.max_passes {
            report.passes += 1;
            let mut patched = 0;

            for index in 0..il.instruction_count() {
                if index % CANCEL_CHECK_INTERVAL == 0 {
                    ctx.check_cancelled()?;
                }
                if self.patch(il, index)? {
                    patched += 1;
                    ctx.events
                        .record(EventKind::PredicatePatched)
                        .at(address, index)
                        .message(il.render_instruction(index).unwrap_or_default());
                }
            }

            log::debug!("Pass {}: {patched} predicate(s) patched", report.passes);
            report.patched += patched;
            if patched == 0 {
                break;
            }
        }
        Ok(report)
    }

    fn patch(&self, il: &mut IlFunction, index: usize) -> Result<bool> {
        let Some(root) = il.instruction(index) else {
            return Ok(false);
        };
        if il.opcode(root) != Some(Opcode::If) {
            return Ok(false);
        }
        let Some(condition) = il.operand_at(root, 0).and_then(Operand::as_expr) else {
            return Ok(false);
        };
        let targets = (
            il.operand_at(root, 1).and_then(Operand::as_index),
            il.operand_at(root, 2).and_then(Operand::as_index),
        );
        let (Some(on_true), Some(on_false)) = targets else {
            return Ok(false);
        };
        let Some(value) = eval::evaluate(il, condition) else {
            return Ok(false);
        };

        let (taken, dead) = if value == 0 {
            (on_false, on_true)
        } else {
            (on_true, on_false)
        };
        let jump = il.add_expression(Opcode::Goto, 0, vec![Operand::Index(taken)])?;
        il.replace_expression(root, jump)?;
        if taken != dead {
            if let Some(block) = il.block_of(index) {
                il.remove_edge(block, NodeId::new(dead));
            }
        }
        Ok(true)
    }

    pub(crate) fn execute(
        &self,
        function: &mut Function,
        ctx: &AnalysisContext,
    ) -> Result<MethodOutcome> {
        let address = function.address();
        let name = function.name().to_string();
        let Some(il) = function.il_mut() else {
            log::warn!("No IL available for function at {address:#x}");
            return Ok(MethodOutcome::Skipped);
        };

        let report = self.solve(il, ctx, address)?;
        if report.patched > 0 {
            il.generate_ssa_form();
        }
        log::info!("{} patches applied to {name}", report.patched);
        Ok(MethodOutcome::Predicates(report))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::AtomicBool, Arc};

    use super::*;
    use crate::{
        config::EngineConfig,
        events::EventLog,
        test::{flattened_dispatcher, opaque_diamond},
        utils::graph::Successors,
        Error,
    };

    #[test]
    fn test_patches_constant_branch() {
        let events = EventLog::new();
        let config = EngineConfig::default();
        let ctx = AnalysisContext::new(&events, &config);
        let mut il = opaque_diamond();

        let report = PredicateSolver::new(20).solve(&mut il, &ctx, 0x100).unwrap();
        assert_eq!(report, PredicateReport { patched: 1, passes: 2 });
        assert_eq!(il.render_instruction(0).unwrap(), "goto 2");
        let succs: Vec<_> = il.successors(NodeId::new(0)).collect();
        assert_eq!(succs, [NodeId::new(2)]);
        assert_eq!(events.count_kind(EventKind::PredicatePatched), 1);
    }

    #[test]
    fn test_undecidable_branches_stay() {
        let events = EventLog::new();
        let config = EngineConfig::default();
        let ctx = AnalysisContext::new(&events, &config);
        let mut il = flattened_dispatcher();

        let report = PredicateSolver::new(20).solve(&mut il, &ctx, 0).unwrap();
        assert_eq!(report, PredicateReport { patched: 0, passes: 1 });
        assert_eq!(il.edge_count(), 7);
    }

    #[test]
    fn test_pass_limit() {
        let events = EventLog::new();
        let config = EngineConfig::default();
        let ctx = AnalysisContext::new(&events, &config);
        let mut il = opaque_diamond();

        let report = PredicateSolver::new(1).solve(&mut il, &ctx, 0).unwrap();
        assert_eq!(report, PredicateReport { patched: 1, passes: 1 });
        let report = PredicateSolver::new(0).solve(&mut il, &ctx, 0).unwrap();
        assert_eq!(report, PredicateReport::default());
    }

    #[test]
    fn test_cancellation() {
        let events = EventLog::new();
        let config = EngineConfig::default();
        let ctx = AnalysisContext::new(&events, &config)
            .with_cancel_flag(Arc::new(AtomicBool::new(true)));
        let mut il = opaque_diamond();

        let result = PredicateSolver::new(20).solve(&mut il, &ctx, 0);
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(il.render_instruction(0).unwrap(), "if ((y ^ y) != 0x0) then 1 else 2");
    }

    #[test]
    fn test_execute_regenerates_ssa() {
        let events = EventLog::new();
        let config = EngineConfig::default();
        let ctx = AnalysisContext::new(&events, &config);
        let mut function = Function::new("f", 0x100, opaque_diamond());

        let outcome = PredicateSolver::new(20).execute(&mut function, &ctx).unwrap();
        assert!(outcome.changed());
        assert!(!function.il().unwrap().is_ssa_stale());
    }
}
