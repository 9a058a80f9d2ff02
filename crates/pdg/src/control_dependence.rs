//! Classical intra-procedural control dependence.
//!
//! A block B is control-dependent on block C when C's terminator decides
//! whether B executes: B post-dominates a successor of C but not C itself.
//! Computed by walking each branch successor up the post-dominator tree
//! until the branch block's own post-dominator is reached.

use bitset::SparseBitMatrix;
use ir::{Block, Function, Terminator};

use crate::post_dominators::{Pdom, PostDominators};

/// Row = dependent block, columns = the blocks it is control-dependent on.
pub type ControlDependence = SparseBitMatrix<Block, Block>;

pub fn control_dependence(ipdom: &PostDominators, func: &Function) -> ControlDependence {
    let mut cdg = ControlDependence::new(func.blocks.len());

    for (block, data) in func.blocks.iter_enumerated() {
        if let Some(Terminator::CondBr { then_dest, else_dest, .. }) = &data.terminator {
            propagate(&mut cdg, ipdom, *then_dest, block);
            propagate(&mut cdg, ipdom, *else_dest, block);
        }
    }

    cdg
}

fn propagate(cdg: &mut ControlDependence, ipdom: &PostDominators, mut from: Block, to: Block) {
    let stop = ipdom[to];
    loop {
        if stop == Pdom::Block(from) {
            break;
        }
        cdg.insert(from, to);
        match ipdom[from] {
            Pdom::Block(next) if next != from => from = next,
            // Reached the exit (or a diverging region) without meeting
            // `to`'s post-dominator; the chain ends here.
            _ => break,
        }
    }
}
