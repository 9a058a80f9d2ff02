//! The backward marking walk.

use std::collections::VecDeque;

use bitset::BitSet;
use pdg::{NodeId, Pdg};

/// Caps on the marking walk; `None` is unbounded. Intra-procedural steps
/// count against `intra`; steps crossing a procedure boundary additionally
/// count against `inter`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WalkDepth {
    pub intra: Option<u32>,
    pub inter: Option<u32>,
}

/// Breadth-first from the criteria along `rev_data`, `rev_ctrl` and (when
/// `interference` is on) interference edges. The visited set is the slice.
pub fn mark(
    pdg: &Pdg,
    criteria: &[NodeId],
    depth: WalkDepth,
    interference: bool,
) -> BitSet<NodeId> {
    let mut visited: BitSet<NodeId> = BitSet::new_empty(pdg.len());
    let mut queue: VecDeque<(NodeId, u32, u32)> = VecDeque::new();
    for &node in criteria {
        if visited.insert(node) {
            queue.push_back((node, 0, 0));
        }
    }

    while let Some((node, d_intra, d_inter)) = queue.pop_front() {
        let data = pdg.node_data(node);
        let func = pdg.key(node).func;

        let neighbours = data
            .rev_data
            .iter()
            .chain(data.rev_ctrl.iter())
            .chain(interference.then_some(&data.interf).into_iter().flatten());

        for &next in neighbours {
            let crosses = pdg.key(next).func != func;
            let next_intra = d_intra + 1;
            let next_inter = d_inter + u32::from(crosses);
            if depth.intra.map_or(false, |cap| next_intra > cap) {
                continue;
            }
            if depth.inter.map_or(false, |cap| next_inter > cap) {
                continue;
            }
            if visited.insert(next) {
                queue.push_back((next, next_intra, next_inter));
            }
        }
    }

    visited
}
