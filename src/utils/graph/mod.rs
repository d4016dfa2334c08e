//! Directed graph infrastructure for control flow analysis.
//!
//! - [`NodeId`] - Strongly-typed node identifier
//! - [`GraphBase`], [`Successors`], [`Predecessors`], [`RootedGraph`] - Abstraction
//!   traits the algorithms are written against
//! - [`algorithms`] - Dominator trees
//!
//! # Usage Examples
//!
//! ```rust
//! use deobscope::il::IlFunction;
//! use deobscope::utils::graph::{algorithms::compute_dominators_rooted, NodeId};
//!
//! // entry -> a, entry -> b, a -> exit, b -> exit
//! let mut il = IlFunction::new();
//! let blocks: Vec<_> = (0..4).map(|_| il.add_block()).collect();
//! il.add_edge(blocks[0], blocks[1]);
//! il.add_edge(blocks[0], blocks[2]);
//! il.add_edge(blocks[1], blocks[3]);
//! il.add_edge(blocks[2], blocks[3]);
//!
//! let tree = compute_dominators_rooted(&il);
//! assert_eq!(tree.immediate_dominator(NodeId::new(3)), Some(NodeId::new(0)));
//! ```

pub mod algorithms;
mod node;
mod traits;

pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};
