//! Block identifiers.
//!
//! Control flow graphs index their nodes densely from zero; for an
//! [`IlFunction`](crate::il::IlFunction) the node index is the basic block index.

use std::fmt;

/// Index of a node in a directed graph.
///
/// A distinct type keeps block indices apart from instruction indices and
/// expression ids, which are plain integers too.
///
/// # Examples
///
/// ```rust
/// use deobscope::utils::graph::NodeId;
///
/// let dispatcher = NodeId::new(1);
/// assert_eq!(dispatcher.index(), 1);
/// assert_eq!(dispatcher.to_string(), "bb1");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Wraps a block index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// The block index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn test_node_id_orders_by_block_index() {
        let blocks: BTreeSet<NodeId> = [5, 1, 3, 1].into_iter().map(NodeId::new).collect();
        let indices: Vec<usize> = blocks.iter().map(|n| n.index()).collect();
        assert_eq!(indices, [1, 3, 5]);
    }

    #[test]
    fn test_node_id_formatting() {
        assert_eq!(format!("{:?}", NodeId::new(42)), "NodeId(42)");
        assert_eq!(NodeId::new(42).to_string(), "bb42");
    }
}
