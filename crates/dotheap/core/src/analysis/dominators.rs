// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Dominator analysis over reference graphs

use crate::heapdump::{HeapGraph, InstanceRef};
use tracing::{debug, instrument};

const UNDEFINED: u32 = u32::MAX;

/// A directed graph with dense node indices.
pub trait DominatorGraph {
    fn node_count(&self) -> usize;

    /// Calls `f` with every successor of `node`.
    fn successors<F: FnMut(usize)>(&self, node: usize, f: F);
}

/// The strong references of a heap graph. Instances reachable only
/// through `java.lang.ref` referents are not part of it.
pub struct StrongReferences<'a> {
    graph: &'a HeapGraph,
}

impl<'a> StrongReferences<'a> {
    pub fn new(graph: &'a HeapGraph) -> Self {
        Self { graph }
    }
}

impl DominatorGraph for StrongReferences<'_> {
    fn node_count(&self) -> usize {
        self.graph.len()
    }

    fn successors<F: FnMut(usize)>(&self, node: usize, mut f: F) {
        self.graph.for_each_reference(InstanceRef::new(node), |r| {
            if r.is_strong() {
                f(r.target.index())
            }
        });
    }
}

/// Dominator tree representation
#[derive(Debug, Clone)]
pub struct DominatorTree {
    root: usize,
    /// Immediate dominator for each node, `UNDEFINED` for the root and
    /// for nodes not reachable from it
    idom: Vec<u32>,
    /// Children in the dominator tree, `children[child_offsets[n]..child_offsets[n + 1]]`
    child_offsets: Vec<usize>,
    children: Vec<u32>,
    reachable: usize,
}

impl DominatorTree {
    /// Compute immediate dominators of every node reachable from `root`.
    ///
    /// Iterative dataflow fixpoint over reverse postorder (Cooper, Harvey
    /// and Kennedy, "A Simple, Fast Dominance Algorithm"). Both the depth
    /// first search and the fixpoint use explicit stacks.
    #[instrument(skip_all, fields(nodes = graph.node_count()))]
    pub fn compute<G: DominatorGraph>(graph: &G, root: usize) -> Self {
        let n = graph.node_count();
        let (order, post, succ_ranges, succs) = postorder(graph, root);
        let m = order.len();

        // Predecessors by postorder number.
        let mut pred_offsets = vec![0usize; m + 1];
        for &node in &order {
            let (start, end) = succ_ranges[node as usize];
            for &s in &succs[start..end] {
                pred_offsets[post[s as usize] as usize + 1] += 1;
            }
        }
        for i in 0..m {
            pred_offsets[i + 1] += pred_offsets[i];
        }
        let mut preds = vec![0u32; pred_offsets[m]];
        let mut fill = pred_offsets.clone();
        for (p, &node) in order.iter().enumerate() {
            let (start, end) = succ_ranges[node as usize];
            for &s in &succs[start..end] {
                let slot = &mut fill[post[s as usize] as usize];
                preds[*slot] = p as u32;
                *slot += 1;
            }
        }
        drop(succs);

        let mut doms = vec![UNDEFINED; m];
        let root_post = m - 1;
        doms[root_post] = root_post as u32;

        let mut iterations = 0;
        let mut changed = true;
        while changed {
            changed = false;
            iterations += 1;
            for b in (0..root_post).rev() {
                let mut new_idom = UNDEFINED;
                for &p in &preds[pred_offsets[b]..pred_offsets[b + 1]] {
                    if doms[p as usize] == UNDEFINED {
                        continue;
                    }
                    new_idom = if new_idom == UNDEFINED { p } else { intersect(&doms, p, new_idom) };
                }
                if doms[b] != new_idom {
                    doms[b] = new_idom;
                    changed = true;
                }
            }
        }

        let mut idom = vec![UNDEFINED; n];
        for (p, &node) in order.iter().enumerate().take(root_post) {
            idom[node as usize] = order[doms[p] as usize];
        }

        let mut child_offsets = vec![0usize; n + 1];
        for &d in &idom {
            if d != UNDEFINED {
                child_offsets[d as usize + 1] += 1;
            }
        }
        for i in 0..n {
            child_offsets[i + 1] += child_offsets[i];
        }
        let mut children = vec![0u32; child_offsets[n]];
        let mut fill = child_offsets.clone();
        for (node, &d) in idom.iter().enumerate() {
            if d != UNDEFINED {
                children[fill[d as usize]] = node as u32;
                fill[d as usize] += 1;
            }
        }

        debug!(reachable = m, iterations, "Dominators computed");
        Self {
            root,
            idom,
            child_offsets,
            children,
            reachable: m,
        }
    }

    pub fn root(&self) -> usize {
        self.root
    }

    /// Immediate dominator of `node`, `None` for the root and unreachable
    /// nodes.
    pub fn immediate_dominator(&self, node: usize) -> Option<usize> {
        match self.idom[node] {
            UNDEFINED => None,
            d => Some(d as usize),
        }
    }

    pub fn is_reachable(&self, node: usize) -> bool {
        node == self.root || self.idom[node] != UNDEFINED
    }

    /// Nodes immediately dominated by `node`, in index order.
    pub fn dominated(&self, node: usize) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.children[self.child_offsets[node]..self.child_offsets[node + 1]].iter().map(|&c| c as usize)
    }

    /// Check if `a` dominates `b`. Every reachable node dominates itself.
    pub fn dominates(&self, a: usize, b: usize) -> bool {
        if !self.is_reachable(b) {
            return false;
        }
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.immediate_dominator(current) {
                Some(d) => current = d,
                None => return false,
            }
        }
    }

    /// Number of nodes reachable from the root, the root included.
    pub fn reachable_count(&self) -> usize {
        self.reachable
    }

    pub fn node_count(&self) -> usize {
        self.idom.len()
    }
}

/// Depth first search state: successor lists are gathered once per node
/// as it is discovered.
struct Search {
    discovered: Vec<bool>,
    succ_ranges: Vec<(usize, usize)>,
    succs: Vec<u32>,
}

impl Search {
    fn discover<G: DominatorGraph>(&mut self, graph: &G, node: usize) {
        self.discovered[node] = true;
        let start = self.succs.len();
        graph.successors(node, |s| self.succs.push(s as u32));
        self.succ_ranges[node] = (start, self.succs.len());
    }
}

/// Nodes reachable from `root` in postorder (root last), the postorder
/// number of each node, and the successor lists of reachable nodes.
fn postorder<G: DominatorGraph>(graph: &G, root: usize) -> (Vec<u32>, Vec<u32>, Vec<(usize, usize)>, Vec<u32>) {
    let n = graph.node_count();
    let mut search = Search {
        discovered: vec![false; n],
        succ_ranges: vec![(0, 0); n],
        succs: Vec::new(),
    };
    let mut post = vec![UNDEFINED; n];
    let mut order = Vec::new();

    search.discover(graph, root);
    let mut stack = vec![(root, search.succ_ranges[root].0)];
    while let Some(top) = stack.last_mut() {
        let (node, cursor) = *top;
        if cursor < search.succ_ranges[node].1 {
            top.1 += 1;
            let s = search.succs[cursor] as usize;
            if !search.discovered[s] {
                search.discover(graph, s);
                stack.push((s, search.succ_ranges[s].0));
            }
        } else {
            stack.pop();
            post[node] = order.len() as u32;
            order.push(node as u32);
        }
    }
    (order, post, search.succ_ranges, search.succs)
}

fn intersect(doms: &[u32], mut a: u32, mut b: u32) -> u32 {
    while a != b {
        while a < b {
            a = doms[a as usize];
        }
        while b < a {
            b = doms[b as usize];
        }
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Graph {
        edges: Vec<Vec<usize>>,
    }

    impl Graph {
        fn new(nodes: usize) -> Self {
            Self { edges: vec![Vec::new(); nodes] }
        }

        fn edge(mut self, from: usize, to: usize) -> Self {
            self.edges[from].push(to);
            self
        }

        fn dominators(&self) -> DominatorTree {
            DominatorTree::compute(self, 0)
        }
    }

    impl DominatorGraph for Graph {
        fn node_count(&self) -> usize {
            self.edges.len()
        }

        fn successors<F: FnMut(usize)>(&self, node: usize, mut f: F) {
            self.edges[node].iter().for_each(|&s| f(s));
        }
    }

    #[test]
    fn test_single_node() {
        let tree = Graph::new(1).dominators();
        assert_eq!(tree.immediate_dominator(0), None);
        assert!(tree.is_reachable(0));
        assert_eq!(tree.dominated(0).len(), 0);
        assert_eq!(tree.reachable_count(), 1);
    }

    #[test]
    fn test_parent_with_child() {
        let tree = Graph::new(2).edge(0, 1).dominators();
        assert_eq!(tree.immediate_dominator(1), Some(0));
        assert_eq!(tree.dominated(0).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_reachable_two_ways() {
        let tree = Graph::new(4).edge(0, 1).edge(0, 2).edge(1, 3).edge(2, 3).dominators();
        assert_eq!(tree.immediate_dominator(1), Some(0));
        assert_eq!(tree.immediate_dominator(2), Some(0));
        assert_eq!(tree.immediate_dominator(3), Some(0));
    }

    #[test]
    fn test_reachable_direct_and_indirect() {
        let tree = Graph::new(3).edge(0, 1).edge(0, 2).edge(1, 2).dominators();
        assert_eq!(tree.immediate_dominator(1), Some(0));
        assert_eq!(tree.immediate_dominator(2), Some(0));
    }

    #[test]
    fn test_sub_dominator() {
        let tree = Graph::new(5).edge(0, 1).edge(1, 2).edge(1, 3).edge(2, 4).edge(3, 4).dominators();
        assert_eq!(tree.immediate_dominator(1), Some(0));
        assert_eq!(tree.immediate_dominator(2), Some(1));
        assert_eq!(tree.immediate_dominator(3), Some(1));
        assert_eq!(tree.immediate_dominator(4), Some(1));

        assert!(tree.dominates(1, 4));
        assert!(tree.dominates(0, 4));
        assert!(tree.dominates(4, 4));
        assert!(!tree.dominates(2, 4));
    }

    #[test]
    fn test_child_self_loop() {
        let tree = Graph::new(2).edge(0, 1).edge(1, 1).dominators();
        assert_eq!(tree.immediate_dominator(1), Some(0));
    }

    #[test]
    fn test_single_entry_loop() {
        let tree = Graph::new(4).edge(0, 1).edge(1, 2).edge(2, 3).edge(3, 1).dominators();
        assert_eq!(tree.immediate_dominator(1), Some(0));
        assert_eq!(tree.immediate_dominator(2), Some(1));
        assert_eq!(tree.immediate_dominator(3), Some(2));
    }

    #[test]
    fn test_multi_entry_loop() {
        let tree = Graph::new(5).edge(0, 1).edge(0, 2).edge(1, 3).edge(2, 4).edge(3, 4).edge(4, 3).dominators();
        assert_eq!(tree.immediate_dominator(3), Some(0));
        assert_eq!(tree.immediate_dominator(4), Some(0));
    }

    #[test]
    fn test_dominator_overwrite() {
        // Depth first order reaches 3 through 1 before the path through 2
        // and 4 is known.
        let tree = Graph::new(5).edge(0, 1).edge(0, 2).edge(1, 3).edge(2, 4).edge(4, 3).dominators();
        assert_eq!(tree.immediate_dominator(3), Some(0));
        assert_eq!(tree.immediate_dominator(4), Some(2));
    }

    #[test]
    fn test_hidden_revisit() {
        let tree = Graph::new(6).edge(0, 1).edge(0, 2).edge(1, 3).edge(3, 4).edge(2, 4).edge(4, 5).edge(5, 3).dominators();
        assert_eq!(tree.immediate_dominator(3), Some(0));
        assert_eq!(tree.immediate_dominator(4), Some(0));
        assert_eq!(tree.immediate_dominator(5), Some(4));
    }

    #[test]
    fn test_pre_undominated_update() {
        let tree = Graph::new(4).edge(0, 1).edge(1, 2).edge(2, 3).edge(0, 3).dominators();
        assert_eq!(tree.immediate_dominator(2), Some(1));
        assert_eq!(tree.immediate_dominator(3), Some(0));
    }

    #[test]
    fn test_twice_revisit() {
        let tree = Graph::new(5).edge(0, 1).edge(0, 2).edge(1, 3).edge(2, 3).edge(3, 4).edge(1, 4).dominators();
        assert_eq!(tree.immediate_dominator(3), Some(0));
        assert_eq!(tree.immediate_dominator(4), Some(0));
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let n = 100_000;
        let mut graph = Graph::new(n);
        for i in 1..n {
            graph = graph.edge(i - 1, i);
        }
        let tree = graph.dominators();
        assert_eq!(tree.immediate_dominator(n - 1), Some(n - 2));
        assert!(tree.dominates(0, n - 1));
        assert_eq!(tree.reachable_count(), n);
    }

    #[test]
    fn test_unreachable_nodes_have_no_dominator() {
        let tree = Graph::new(3).edge(0, 1).edge(2, 1).dominators();
        assert_eq!(tree.immediate_dominator(1), Some(0));
        assert_eq!(tree.immediate_dominator(2), None);
        assert!(!tree.is_reachable(2));
        assert!(!tree.dominates(0, 2));
        assert_eq!(tree.reachable_count(), 2);
    }

    #[test]
    fn test_dominated_in_index_order() {
        let tree = Graph::new(4).edge(0, 3).edge(0, 1).edge(0, 2).dominators();
        assert_eq!(tree.dominated(0).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
