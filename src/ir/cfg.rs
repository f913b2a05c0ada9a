//! Control flow graph view of a function.
//!
//! [`FunctionCfg`] maps the blocks of a [`Function`] onto dense node indices (their
//! layout positions) and caches successor and predecessor lists. The view is a snapshot:
//! it borrows the function, so the function cannot change while the view exists.
//!
//! # Algorithms
//!
//! - [`FunctionCfg::reverse_postorder`] - depth-first order from the entry
//! - [`FunctionCfg::reachable`] - which nodes the entry can reach
//! - [`FunctionCfg::back_edges`] - edges whose target dominates their source
//! - [`FunctionCfg::dominators`] - the dominator tree, computed with the iterative
//!   algorithm of Cooper, Harvey and Kennedy over reverse post-order

use crate::ir::{BlockId, Function};

/// A dense CFG snapshot of a function.
#[derive(Debug)]
pub struct FunctionCfg<'a> {
    func: &'a Function,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl<'a> FunctionCfg<'a> {
    /// Builds the view from the function's terminators.
    ///
    /// Edges to blocks that are not part of the layout are dropped.
    #[must_use]
    pub fn new(func: &'a Function) -> Self {
        let count = func.block_count();
        let mut successors = vec![Vec::new(); count];
        let mut predecessors = vec![Vec::new(); count];

        for (from, (_, block)) in func.iter_blocks().enumerate() {
            for succ in block.successors() {
                let Some(to) = func.block_position(succ) else {
                    continue;
                };
                if !successors[from].contains(&to) {
                    successors[from].push(to);
                    predecessors[to].push(from);
                }
            }
        }

        Self {
            func,
            successors,
            predecessors,
        }
    }

    /// Returns the underlying function.
    #[must_use]
    pub const fn function(&self) -> &'a Function {
        self.func
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.successors.len()
    }

    /// Returns the block handle of a node.
    #[must_use]
    pub fn block(&self, node: usize) -> Option<BlockId> {
        self.func.layout().get(node).copied()
    }

    /// Returns the node of a block handle.
    #[must_use]
    pub fn node(&self, block: BlockId) -> Option<usize> {
        self.func.block_position(block)
    }

    /// Returns the distinct successors of a node.
    #[must_use]
    pub fn successors(&self, node: usize) -> &[usize] {
        self.successors.get(node).map_or(&[], Vec::as_slice)
    }

    /// Returns the distinct predecessors of a node.
    #[must_use]
    pub fn predecessors(&self, node: usize) -> &[usize] {
        self.predecessors.get(node).map_or(&[], Vec::as_slice)
    }

    /// Returns the nodes reachable from the entry in reverse post-order.
    #[must_use]
    pub fn reverse_postorder(&self) -> Vec<usize> {
        let count = self.node_count();
        if count == 0 {
            return Vec::new();
        }

        let mut visited = vec![false; count];
        let mut postorder = Vec::with_capacity(count);
        // (node, next successor index)
        let mut stack = vec![(0usize, 0usize)];
        visited[0] = true;

        while let Some(&mut (node, ref mut next)) = stack.last_mut() {
            if let Some(&succ) = self.successors[node].get(*next) {
                *next += 1;
                if !visited[succ] {
                    visited[succ] = true;
                    stack.push((succ, 0));
                }
            } else {
                postorder.push(node);
                stack.pop();
            }
        }

        postorder.reverse();
        postorder
    }

    /// Returns, per node, whether the entry reaches it.
    #[must_use]
    pub fn reachable(&self) -> Vec<bool> {
        let mut reachable = vec![false; self.node_count()];
        for node in self.reverse_postorder() {
            reachable[node] = true;
        }
        reachable
    }

    /// Computes the dominator tree of the reachable part of the graph.
    #[must_use]
    pub fn dominators(&self) -> DominatorTree {
        let count = self.node_count();
        let rpo = self.reverse_postorder();
        let mut order = vec![usize::MAX; count];
        for (index, &node) in rpo.iter().enumerate() {
            order[node] = index;
        }

        let mut idom: Vec<Option<usize>> = vec![None; count];
        if count == 0 {
            return DominatorTree { idom, order };
        }
        idom[0] = Some(0);

        let intersect = |idom: &[Option<usize>], mut a: usize, mut b: usize| -> usize {
            while a != b {
                while order[a] > order[b] {
                    a = idom[a].unwrap_or(0);
                }
                while order[b] > order[a] {
                    b = idom[b].unwrap_or(0);
                }
            }
            a
        };

        let mut changed = true;
        while changed {
            changed = false;
            for &node in rpo.iter().skip(1) {
                let mut new_idom: Option<usize> = None;
                for &pred in self.predecessors(node) {
                    if idom[pred].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idom, pred, current),
                    });
                }
                if new_idom.is_some() && idom[node] != new_idom {
                    idom[node] = new_idom;
                    changed = true;
                }
            }
        }

        DominatorTree { idom, order }
    }

    /// Returns the back edges `(latch, header)` of the graph.
    ///
    /// An edge is a back edge when its target dominates its source.
    #[must_use]
    pub fn back_edges(&self) -> Vec<(usize, usize)> {
        let dom = self.dominators();
        let mut edges = Vec::new();
        for from in 0..self.node_count() {
            for &to in self.successors(from) {
                if dom.dominates(to, from) {
                    edges.push((from, to));
                }
            }
        }
        edges
    }
}

/// Immediate dominators of the nodes of a [`FunctionCfg`].
///
/// Node 0 (the entry) is the root. Unreachable nodes have no dominator and are
/// dominated by nothing.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    idom: Vec<Option<usize>>,
    order: Vec<usize>,
}

impl DominatorTree {
    /// Returns the immediate dominator of a node, `None` for the entry and for
    /// unreachable nodes.
    #[must_use]
    pub fn immediate_dominator(&self, node: usize) -> Option<usize> {
        if node == 0 {
            return None;
        }
        self.idom.get(node).copied().flatten()
    }

    /// Returns true if the node is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, node: usize) -> bool {
        self.idom.get(node).is_some_and(Option::is_some)
    }

    /// Checks if node `a` dominates node `b`.
    ///
    /// A node dominates itself. Nothing dominates an unreachable node.
    #[must_use]
    pub fn dominates(&self, a: usize, b: usize) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.immediate_dominator(current) {
                Some(parent) if self.order[parent] < self.order[current] => current = parent,
                _ => return false,
            }
        }
    }

    /// Checks if `a` dominates `b` and differs from it.
    #[must_use]
    pub fn strictly_dominates(&self, a: usize, b: usize) -> bool {
        a != b && self.dominates(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Constant, FunctionBuilder, Type};

    fn diamond_with_loop() -> Function {
        // B0 -> B1 | B2, B1 -> B3, B2 -> B3, B3 -> B1 | B4
        FunctionBuilder::new("f", Type::Void)
            .param("c", Type::Bool)
            .build_with(|f| {
                let c = f.arg(0);
                f.block(0, "entry", |b| b.branch(c, 1, 2));
                f.block(1, "left", |b| b.jump(3));
                f.block(2, "right", |b| b.jump(3));
                f.block(3, "join", |b| b.branch(c, 1, 4));
                f.block(4, "exit", |b| b.ret_void());
            })
            .unwrap()
    }

    #[test]
    fn test_reverse_postorder_starts_at_entry() {
        let func = diamond_with_loop();
        let cfg = FunctionCfg::new(&func);
        let rpo = cfg.reverse_postorder();
        assert_eq!(rpo.len(), 5);
        assert_eq!(rpo[0], 0);
        assert_eq!(*rpo.last().unwrap(), 4);
    }

    #[test]
    fn test_dominators() {
        let func = diamond_with_loop();
        let dom = FunctionCfg::new(&func).dominators();

        assert_eq!(dom.immediate_dominator(0), None);
        assert_eq!(dom.immediate_dominator(1), Some(0));
        assert_eq!(dom.immediate_dominator(3), Some(0));
        assert_eq!(dom.immediate_dominator(4), Some(3));
        assert!(dom.dominates(0, 4));
        assert!(dom.dominates(3, 4));
        assert!(!dom.dominates(1, 3));
        assert!(dom.strictly_dominates(0, 3));
        assert!(!dom.strictly_dominates(3, 3));
    }

    #[test]
    fn test_unreachable_block_is_not_dominated() {
        let func = FunctionBuilder::new("f", Type::I32)
            .build_with(|f| {
                f.block(0, "entry", |b| b.ret(Constant::I32(0)));
                f.block(1, "orphan", |b| b.jump(0));
            })
            .unwrap();
        let cfg = FunctionCfg::new(&func);
        let dom = cfg.dominators();

        assert_eq!(cfg.reachable(), vec![true, false]);
        assert!(!dom.dominates(0, 1));
        assert!(cfg.back_edges().is_empty());
    }

    #[test]
    fn test_back_edge_detection() {
        let func = FunctionBuilder::new("spin", Type::Void)
            .param("c", Type::Bool)
            .build_with(|f| {
                let c = f.arg(0);
                f.block(0, "entry", |b| b.jump(1));
                f.block(1, "header", |b| b.branch(c, 2, 3));
                f.block(2, "body", |b| b.jump(1));
                f.block(3, "exit", |b| b.ret_void());
            })
            .unwrap();
        assert_eq!(FunctionCfg::new(&func).back_edges(), vec![(2, 1)]);
    }
}
