//! Graph algorithms for control flow analysis.
//!
//! - [`compute_dominators`] - Dominator tree from an explicit root (Lengauer-Tarjan)
//! - [`compute_dominators_rooted`] - Same, rooted at the graph's entry
//! - [`DominatorTree`] - Immediate dominators and the tree built from them

mod dominators;

pub use dominators::{compute_dominators, compute_dominators_rooted, DominatorTree};
