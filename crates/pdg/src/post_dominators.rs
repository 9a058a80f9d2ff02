//! Post-dominators of a function's CFG.
//!
//! Dominance on the reversed CFG rooted at a virtual exit that every
//! dead-end block (`ret`, `unreachable`) flows into. The iterative
//! "simple fast" scheme over postorder indices; blocks that cannot reach
//! any exit (infinite loops) end up [`Pdom::Undefined`].

use ir::{Block, Function};
use typed_index_collections::TiVec;

pub type PostDominators = TiVec<Block, Pdom>;

/// The immediate post-dominator of a block.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Pdom {
    /// The block exits the function directly.
    Exit,
    Block(Block),
    /// No path from the block reaches an exit.
    Undefined,
}

pub fn post_dominators(func: &Function) -> PostDominators {
    let num_blocks = func.blocks.len();

    // Postorder of the reversed CFG: depth-first from each exit block along
    // predecessor edges. The virtual root is implicit and would come last,
    // i.e. it owns the highest (sentinel) index.
    let mut po: Vec<Block> = Vec::with_capacity(num_blocks);
    let mut po_idx: TiVec<Block, Option<usize>> = vec![None; num_blocks].into();
    {
        let mut visited = vec![false; num_blocks];
        let mut stack: Vec<(Block, usize)> = Vec::new();
        let exits: Vec<Block> = func
            .blocks
            .iter_enumerated()
            .filter(|(_, data)| data.successors().is_empty())
            .map(|(block, _)| block)
            .collect();
        for exit in exits {
            if visited[usize::from(exit)] {
                continue;
            }
            visited[usize::from(exit)] = true;
            stack.push((exit, 0));
            while let Some((block, next)) = stack.last_mut() {
                let preds = func.predecessors(*block);
                if let Some(&pred) = preds.get(*next) {
                    *next += 1;
                    if !visited[usize::from(pred)] {
                        visited[usize::from(pred)] = true;
                        stack.push((pred, 0));
                    }
                } else {
                    po_idx[*block] = Some(po.len());
                    po.push(*block);
                    stack.pop();
                }
            }
        }
    }

    let root = po.len();
    let mut idom: Vec<Option<usize>> = vec![None; root + 1];
    idom[root] = Some(root);

    let mut changed = true;
    while changed {
        changed = false;
        // Reverse postorder of the reversed graph: descending indices.
        for pid in (0..root).rev() {
            let block = po[pid];
            // Predecessors in the reversed graph are the CFG successors,
            // plus the virtual root for exit blocks.
            let data = &func.blocks[block];
            let mut new_idom: Option<usize> = None;
            if data.successors().is_empty() {
                new_idom = Some(root);
            }
            for succ in data.successors() {
                let spid = match po_idx[succ] {
                    Some(spid) => spid,
                    None => continue,
                };
                if idom[spid].is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => spid,
                    Some(cur) => intersect(&idom, cur, spid),
                });
            }
            if new_idom.is_some() && idom[pid] != new_idom {
                idom[pid] = new_idom;
                changed = true;
            }
        }
    }

    let mut res: PostDominators = vec![Pdom::Undefined; num_blocks].into();
    for (pid, &block) in po.iter().enumerate() {
        match idom[pid] {
            Some(dom) if dom == root => res[block] = Pdom::Exit,
            Some(dom) => res[block] = Pdom::Block(po[dom]),
            None => (),
        }
    }
    res
}

fn intersect(idom: &[Option<usize>], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while a < b {
            a = idom[a].expect("walked into an unprocessed post-dominator");
        }
        while b < a {
            b = idom[b].expect("walked into an unprocessed post-dominator");
        }
    }
    a
}
