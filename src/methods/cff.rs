//! Control-flow flattening detection.
//!
//! Flattening rewrites a function into a loop around a dispatcher block that selects
//! the next original block from a state variable. Two signals are measured here:
//!
//! - the **flattening score**: for every block that is re-entered from a block it
//!   dominates (the loop head shape of a dispatcher), the share of the function's blocks
//!   it dominates; the score is the maximum over all such blocks
//! - the **dispatcher variable**: the variable with the most definitions, which in a
//!   flattened function is the state variable assigned at the end of every case
//!
//! The cyclomatic complexity (`edges - blocks + 2`) is reported alongside.

use std::collections::BTreeSet;

use crate::{
    events::EventKind,
    il::{Function, IlFunction, VarId},
    methods::{AnalysisContext, MethodOutcome},
    utils::graph::{
        algorithms::{compute_dominators_rooted, DominatorTree},
        GraphBase, NodeId, Predecessors,
    },
    Error, Result,
};

/// Measurements of one function.
#[derive(Debug, Clone, PartialEq)]
pub struct CffReport {
    /// `edges - blocks + 2`.
    pub cyclomatic_complexity: i64,
    /// Largest dominated share of a block re-entered from its own dominance region.
    pub flattening_score: f64,
    /// Whether the score met the configured threshold.
    pub flattened: bool,
    /// The most assigned variable, looked up for flattened functions only.
    pub dispatcher: Option<VarId>,
}

/// Computes the cyclomatic complexity of a function body.
///
/// Edges to blocks that do not exist are not counted.
#[must_use]
pub fn cyclomatic_complexity(il: &IlFunction) -> i64 {
    let edges = i64::try_from(il.edge_count()).unwrap_or(i64::MAX);
    let blocks = i64::try_from(il.blocks().len()).unwrap_or(i64::MAX);
    edges - blocks + 2
}

/// Returns `block` and every block it dominates.
///
/// # Arguments
///
/// * `tree` - Dominator tree of the function
/// * `block` - The dominating block
#[must_use]
pub fn dominated_by(tree: &DominatorTree, block: NodeId) -> BTreeSet<NodeId> {
    let mut result = BTreeSet::new();
    let mut worklist = vec![block];
    while let Some(node) = worklist.pop() {
        if !result.insert(node) {
            continue;
        }
        worklist.extend(
            tree.children(node)
                .into_iter()
                .filter(|child| !result.contains(child)),
        );
    }
    result
}

/// Estimates how flattened a function is, between 0.0 and 1.0.
///
/// # Examples
///
/// ```rust
/// use deobscope::{il::IlFunction, methods::cff};
///
/// assert_eq!(cff::flattening_score(&IlFunction::new()), 0.0);
/// ```
#[must_use]
pub fn flattening_score(il: &IlFunction) -> f64 {
    let total = il.node_count();
    if total == 0 {
        return 0.0;
    }
    let tree = compute_dominators_rooted(il);

    let mut score = 0.0_f64;
    for block in il.node_ids().filter(|&b| tree.is_reachable(b)) {
        let dominated = dominated_by(&tree, block);
        let reentered = il
            .predecessors(block)
            .any(|pred| dominated.contains(&pred));
        if reentered {
            score = score.max(dominated.len() as f64 / total as f64);
        }
    }
    score
}

/// Finds the variable with the most definitions.
///
/// Ties go to the variable declared first.
///
/// # Errors
///
/// Returns [`Error::NoIl`] if the function has not been lifted and
/// [`Error::NoVariables`] if it declares no variable.
pub fn most_assigned_variable(function: &Function) -> Result<VarId> {
    let il = function
        .il()
        .ok_or_else(|| Error::NoIl(function.name().to_string()))?;

    let mut best: Option<(VarId, usize)> = None;
    for variable in il.variables() {
        let count = il.variable_definitions(variable.id).len();
        if best.map_or(true, |(_, most)| count > most) {
            best = Some((variable.id, count));
        }
    }
    best.map(|(var, _)| var)
        .ok_or_else(|| Error::NoVariables(function.name().to_string()))
}

/// Variables read by the definitions of `var`, in first-seen order.
///
/// For a dispatcher variable this lists what the next state is computed from.
#[must_use]
pub fn variable_dependencies(il: &IlFunction, var: VarId) -> Vec<VarId> {
    let mut deps = Vec::new();
    for definition in il.variable_definitions(var) {
        let Some((_, src)) = il.assignment(definition) else {
            continue;
        };
        for read in il.variables_read(src) {
            if !deps.contains(&read) {
                deps.push(read);
            }
        }
    }
    deps
}

/// The flattening detector method.
#[derive(Debug, Clone)]
pub struct CffDetection {
    threshold: f64,
}

impl CffDetection {
    /// Creates a detector reporting functions whose score reaches `threshold`.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Measures one function.
    ///
    /// Returns `None` for functions without IR.
    #[must_use]
    pub fn analyze(&self, function: &Function) -> Option<CffReport> {
        let il = function.il()?;
        let cyclomatic_complexity = cyclomatic_complexity(il);
        let flattening_score = flattening_score(il);
        let flattened = flattening_score > 0.0 && flattening_score >= self.threshold;
        let dispatcher = if flattened {
            most_assigned_variable(function).ok()
        } else {
            None
        };
        Some(CffReport {
            cyclomatic_complexity,
            flattening_score,
            flattened,
            dispatcher,
        })
    }

    pub(crate) fn execute(
        &self,
        function: &mut Function,
        ctx: &AnalysisContext,
    ) -> Result<MethodOutcome> {
        let Some(report) = self.analyze(function) else {
            return Ok(MethodOutcome::Skipped);
        };
        let address = function.address();
        log::info!(
            "{}: cyclomatic complexity {}, flattening score {:.2}",
            function.name(),
            report.cyclomatic_complexity,
            report.flattening_score
        );

        if report.flattened {
            ctx.events
                .record(EventKind::FlatteningDetected)
                .function(address)
                .message(format!(
                    "{} flattening score {:.2}",
                    function.name(),
                    report.flattening_score
                ));

            match (report.dispatcher, function.il()) {
                (Some(var), Some(il)) => {
                    let name = il
                        .variable(var)
                        .map_or_else(|| var.to_string(), |v| v.name.clone());
                    ctx.events
                        .record(EventKind::DispatcherIdentified)
                        .function(address)
                        .message(format!("dispatcher variable {name}"));
                }
                _ => {
                    log::warn!("Dispatcher detection failed for {}", function.name());
                    ctx.events
                        .record(EventKind::Warning)
                        .function(address)
                        .message("dispatcher detection failed");
                }
            }
        }
        Ok(MethodOutcome::Flattening(report))
    }
}
