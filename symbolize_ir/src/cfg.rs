// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Control-flow queries over a [Procedure]: predecessors, reverse post-order and dominance.

use crate::{BlockId, Procedure};
use petgraph::algo::dominators::{self, Dominators};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;

/// Snapshot of a procedure's control-flow graph.
///
/// The snapshot is not updated when the procedure changes, so it must be rebuilt after blocks
/// or terminators are modified.
pub struct ControlFlowGraph {
    successors: Vec<Vec<BlockId>>,
    /// One entry per incoming edge, in the order edges are found walking the blocks in order.
    predecessors: Vec<Vec<BlockId>>,
    reverse_post_order: Vec<BlockId>,
    dominators: Dominators<NodeIndex>,
}

impl ControlFlowGraph {
    pub fn new(procedure: &Procedure) -> Self {
        let num_blocks = procedure.blocks.len();
        let mut graph = DiGraph::<(), ()>::with_capacity(num_blocks, num_blocks * 2);
        for _ in 0..num_blocks {
            graph.add_node(());
        }
        let mut successors = Vec::with_capacity(num_blocks);
        let mut predecessors = vec![vec![]; num_blocks];
        for (bb, block) in procedure.block_ids().zip(&procedure.blocks) {
            let succs = block.terminator.successors();
            for succ in &succs {
                // Out of range targets are reported by the verifier.
                if succ.index() < num_blocks {
                    graph.add_edge(node(bb), node(*succ), ());
                    predecessors[succ.index()].push(bb);
                }
            }
            successors.push(succs);
        }

        let entry = node(BlockId::ENTRY);
        let mut reverse_post_order = vec![];
        if num_blocks > 0 {
            let mut dfs = DfsPostOrder::new(&graph, entry);
            while let Some(nx) = dfs.next(&graph) {
                reverse_post_order.push(BlockId(nx.index() as u32));
            }
            reverse_post_order.reverse();
        } else {
            // The dominator computation needs a root even for an empty body.
            graph.add_node(());
        }
        let dominators = dominators::simple_fast(&graph, entry);
        ControlFlowGraph { successors, predecessors, reverse_post_order, dominators }
    }

    pub fn successors(&self, bb: BlockId) -> &[BlockId] {
        &self.successors[bb.index()]
    }

    pub fn predecessors(&self, bb: BlockId) -> &[BlockId] {
        &self.predecessors[bb.index()]
    }

    /// Blocks reachable from the entry in reverse post-order.
    pub fn reverse_post_order(&self) -> &[BlockId] {
        &self.reverse_post_order
    }

    pub fn is_reachable(&self, bb: BlockId) -> bool {
        self.reverse_post_order.contains(&bb)
    }

    /// Order in which a single forward pass sees definitions before their non-phi uses:
    /// reachable blocks in reverse post-order, followed by unreachable blocks in index order.
    pub fn visit_order(&self) -> Vec<BlockId> {
        let mut order = self.reverse_post_order.clone();
        let unreachable: Vec<_> = (0..self.successors.len())
            .map(|idx| BlockId(idx as u32))
            .filter(|bb| !self.reverse_post_order.contains(bb))
            .collect();
        order.extend(unreachable);
        order
    }

    /// Whether `dominator` dominates `bb`. Dominance is reflexive. Unreachable blocks are
    /// dominated by nothing.
    pub fn dominates(&self, dominator: BlockId, bb: BlockId) -> bool {
        match self.dominators.dominators(node(bb)) {
            Some(mut doms) => doms.any(|nx| nx == node(dominator)),
            None => false,
        }
    }
}

fn node(bb: BlockId) -> NodeIndex {
    NodeIndex::new(bb.index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ProcedureBuilder;
    use crate::{Operand, Type};

    /// bb0 -> bb1 -> bb2 <-> bb1, bb3 unreachable.
    fn looping_procedure() -> Procedure {
        let mut builder = ProcedureBuilder::new(&[Type::bool()], Type::Void);
        let cond = builder.param(0);
        let bb1 = builder.new_block();
        let bb2 = builder.new_block();
        let bb3 = builder.new_block();
        builder.goto(bb1);
        builder.switch_to(bb1);
        builder.branch(Operand::Value(cond), bb2, bb3);
        builder.switch_to(bb2);
        builder.goto(bb1);
        builder.switch_to(bb3);
        builder.ret(None);
        let mut procedure = builder.finish();
        // Detach bb3 from the graph.
        procedure.blocks[1].terminator =
            crate::Terminator::Branch { cond: Operand::Value(cond), then_bb: bb2, else_bb: bb2 };
        procedure
    }

    #[test]
    fn test_predecessors_keep_every_edge() {
        let cfg = ControlFlowGraph::new(&looping_procedure());
        assert_eq!(cfg.predecessors(BlockId(1)), &[BlockId(0), BlockId(2)]);
        assert_eq!(cfg.predecessors(BlockId(2)), &[BlockId(1), BlockId(1)]);
        assert!(cfg.predecessors(BlockId(3)).is_empty());
    }

    #[test]
    fn test_visit_order() {
        let cfg = ControlFlowGraph::new(&looping_procedure());
        assert_eq!(cfg.reverse_post_order(), &[BlockId(0), BlockId(1), BlockId(2)]);
        assert_eq!(cfg.visit_order(), vec![BlockId(0), BlockId(1), BlockId(2), BlockId(3)]);
        assert!(!cfg.is_reachable(BlockId(3)));
    }

    #[test]
    fn test_dominance() {
        let cfg = ControlFlowGraph::new(&looping_procedure());
        assert!(cfg.dominates(BlockId(0), BlockId(2)));
        assert!(cfg.dominates(BlockId(1), BlockId(2)));
        assert!(cfg.dominates(BlockId(2), BlockId(2)));
        assert!(!cfg.dominates(BlockId(2), BlockId(1)));
        assert!(!cfg.dominates(BlockId(0), BlockId(3)));
    }
}
