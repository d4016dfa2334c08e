//! Dominator tree computation using the Lengauer-Tarjan algorithm.
//!
//! A node `d` **dominates** a node `n` if every path from the entry node to `n`
//! must pass through `d`. The **immediate dominator** of `n` (idom(n)) is the
//! unique node that strictly dominates `n` but does not strictly dominate any
//! other dominator of `n`. Making each node's immediate dominator its parent
//! yields the dominator tree, rooted at the entry.
//!
//! Flattened functions funnel every case block back through one dispatcher block,
//! which then dominates the whole body; the flattening detector is built on this.
//!
//! # Algorithm
//!
//! Lengauer-Tarjan with path compression, O(V α(V)). Nodes unreachable from the
//! entry have no immediate dominator and are dominated by nothing but themselves.

use crate::utils::graph::{NodeId, RootedGraph, Successors};

const UNDEFINED: usize = usize::MAX;

/// Result of dominator tree computation.
///
/// # Examples
///
/// ```rust
/// use deobscope::il::IlFunction;
/// use deobscope::utils::graph::{algorithms::compute_dominators, NodeId};
///
/// // entry -> a -> b
/// let mut il = IlFunction::new();
/// let entry = il.add_block();
/// let a = il.add_block();
/// let b = il.add_block();
/// il.add_edge(entry, a);
/// il.add_edge(a, b);
///
/// let dom_tree = compute_dominators(&il, entry);
/// assert!(dom_tree.dominates(entry, b));
/// assert_eq!(dom_tree.immediate_dominator(b), Some(a));
/// ```
#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// The entry (root) node of the dominator tree
    entry: NodeId,
    /// Immediate dominator index per node; the entry maps to itself, unreachable nodes to `UNDEFINED`
    idom: Vec<usize>,
}

impl DominatorTree {
    /// Returns the entry (root) node of the dominator tree.
    #[must_use]
    #[inline]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the number of nodes covered by the tree.
    #[must_use]
    #[inline]
    pub fn node_count(&self) -> usize {
        self.idom.len()
    }

    /// Returns true if the node is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.idom.get(node.index()).is_some_and(|&d| d != UNDEFINED)
    }

    /// Returns the immediate dominator of a node, or `None` for the entry node and
    /// for nodes that are not reachable.
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        if node == self.entry {
            return None;
        }
        match self.idom.get(node.index()) {
            Some(&d) if d != UNDEFINED => Some(NodeId::new(d)),
            _ => None,
        }
    }

    /// Checks if node `a` dominates node `b`.
    ///
    /// A node dominates itself. The entry node dominates all reachable nodes.
    ///
    /// # Complexity
    ///
    /// O(depth) where depth is the depth of `b` in the dominator tree.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        let mut current = b;
        while let Some(idom) = self.immediate_dominator(current) {
            if idom == a {
                return true;
            }
            current = idom;
        }
        false
    }

    /// Checks if node `a` strictly dominates node `b`.
    #[must_use]
    #[inline]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns the depth of a node in the dominator tree. The entry node has depth 0.
    #[must_use]
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = node;
        while let Some(idom) = self.immediate_dominator(current) {
            current = idom;
            depth += 1;
        }
        depth
    }

    /// Returns all children of a node in the dominator tree, by ascending index.
    ///
    /// # Complexity
    ///
    /// O(V) where V is the number of nodes.
    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        (0..self.idom.len())
            .map(NodeId::new)
            .filter(|&n| n != self.entry && self.immediate_dominator(n) == Some(node))
            .collect()
    }
}

/// Computes the dominator tree of the nodes reachable from `entry`.
///
/// # Arguments
///
/// * `graph` - The graph to analyze
/// * `entry` - The root of the analysis
///
/// # Returns
///
/// A `DominatorTree` covering every node of the graph; an empty graph or an entry
/// outside the graph yields a tree without reachable nodes.
pub fn compute_dominators<G>(graph: &G, entry: NodeId) -> DominatorTree
where
    G: Successors,
{
    let node_count = graph.node_count();

    if entry.index() >= node_count {
        return DominatorTree {
            entry,
            idom: vec![UNDEFINED; node_count],
        };
    }

    let mut lt = LengauerTarjan::new(graph, entry);
    lt.compute();

    DominatorTree {
        entry,
        idom: lt.idom,
    }
}

/// Convenience function to compute dominators for a [`RootedGraph`].
pub fn compute_dominators_rooted<G>(graph: &G) -> DominatorTree
where
    G: RootedGraph,
{
    compute_dominators(graph, graph.entry())
}

/// Internal state for the Lengauer-Tarjan algorithm. All vectors are indexed by node.
struct LengauerTarjan {
    entry: usize,
    /// Successor lists, copied once from the graph
    succ: Vec<Vec<usize>>,
    /// Predecessor lists, derived from `succ`
    pred: Vec<Vec<usize>>,
    /// DFS number for each node (0 = not visited)
    dfnum: Vec<usize>,
    /// Node with each DFS number minus one
    vertex: Vec<usize>,
    /// Parent in DFS tree
    parent: Vec<usize>,
    /// Semidominator
    semi: Vec<usize>,
    /// Immediate dominator (final result)
    idom: Vec<usize>,
    /// Ancestor in the forest for link-eval
    ancestor: Vec<usize>,
    /// Best node on path to ancestor (for path compression)
    best: Vec<usize>,
    /// Nodes whose semidominator is this node
    bucket: Vec<Vec<usize>>,
}

impl LengauerTarjan {
    fn new<G: Successors>(graph: &G, entry: NodeId) -> Self {
        let n = graph.node_count();
        let succ: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                graph
                    .successors(NodeId::new(i))
                    .map(NodeId::index)
                    .filter(|&s| s < n)
                    .collect()
            })
            .collect();
        let mut pred = vec![Vec::new(); n];
        for (from, targets) in succ.iter().enumerate() {
            for &to in targets {
                pred[to].push(from);
            }
        }
        Self {
            entry: entry.index(),
            succ,
            pred,
            dfnum: vec![0; n],
            vertex: Vec::with_capacity(n),
            parent: vec![UNDEFINED; n],
            semi: (0..n).collect(),
            idom: vec![UNDEFINED; n],
            ancestor: vec![UNDEFINED; n],
            best: (0..n).collect(),
            bucket: vec![Vec::new(); n],
        }
    }

    fn compute(&mut self) {
        self.dfs();

        for i in (1..self.vertex.len()).rev() {
            let w = self.vertex[i];
            let parent_w = self.parent[w];

            for p in 0..self.pred[w].len() {
                let v = self.pred[w][p];
                if self.dfnum[v] == 0 {
                    continue;
                }
                let u = self.eval(v);
                if self.dfnum[self.semi[u]] < self.dfnum[self.semi[w]] {
                    self.semi[w] = self.semi[u];
                }
            }

            let semi_w = self.semi[w];
            self.bucket[semi_w].push(w);
            self.ancestor[w] = parent_w;

            for v in std::mem::take(&mut self.bucket[parent_w]) {
                let u = self.eval(v);
                self.idom[v] = if self.semi[u] == self.semi[v] {
                    parent_w
                } else {
                    u
                };
            }
        }

        for i in 1..self.vertex.len() {
            let w = self.vertex[i];
            if self.idom[w] != self.semi[w] {
                self.idom[w] = self.idom[self.idom[w]];
            }
        }

        self.idom[self.entry] = self.entry;
    }

    /// Iterative DFS assigning preorder numbers and tree parents.
    fn dfs(&mut self) {
        let mut stack = vec![(self.entry, UNDEFINED)];
        while let Some((node, parent)) = stack.pop() {
            if self.dfnum[node] != 0 {
                continue;
            }
            self.vertex.push(node);
            self.dfnum[node] = self.vertex.len();
            self.parent[node] = parent;
            for &succ in self.succ[node].iter().rev() {
                if self.dfnum[succ] == 0 {
                    stack.push((succ, node));
                }
            }
        }
    }

    fn eval(&mut self, v: usize) -> usize {
        if self.ancestor[v] == UNDEFINED {
            return v;
        }
        self.compress(v);
        self.best[v]
    }

    /// Iterative path compression towards the forest root.
    fn compress(&mut self, v: usize) {
        let mut path = Vec::new();
        let mut current = v;
        while self.ancestor[current] != UNDEFINED && self.ancestor[self.ancestor[current]] != UNDEFINED
        {
            path.push(current);
            current = self.ancestor[current];
        }
        while let Some(node) = path.pop() {
            let anc = self.ancestor[node];
            if self.dfnum[self.semi[self.best[anc]]] < self.dfnum[self.semi[self.best[node]]] {
                self.best[node] = self.best[anc];
            }
            self.ancestor[node] = self.ancestor[anc];
        }
    }
}
