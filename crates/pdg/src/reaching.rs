//! The bundled data-dependence baseline: which stores reach which loads.
//!
//! A gen/kill worklist fixpoint per function over *exactly resolvable*
//! places — stack slots named by their `alloca` and globals named directly
//! by an operand. A load or store whose address resolves to no single place
//! contributes no dependence (the conservative analyses live outside this
//! crate, behind the [`DataDeps`](crate::DataDeps) trait).

use ahash::AHashMap;
use bitset::BitSet;
use indexmap::IndexSet;
use ir::{FuncId, GlobalId, Inst, Module, Op, Operand};
use workqueue::WorkQueue;

use crate::DataDeps;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) enum Place {
    Alloca(Inst),
    Global(GlobalId),
}

pub(crate) fn resolve_place(func: &ir::Function, addr: &Operand) -> Option<Place> {
    match addr {
        Operand::Value(inst) if matches!(func.insts[*inst].op, Op::Alloca) => {
            Some(Place::Alloca(*inst))
        }
        Operand::Global(global) => Some(Place::Global(*global)),
        _ => None,
    }
}

pub struct ReachingStores {
    deps: AHashMap<(FuncId, Inst), Vec<Inst>>,
    empty: Vec<Inst>,
}

impl DataDeps for ReachingStores {
    fn reaching_defs(&self, func: FuncId, load: Inst) -> &[Inst] {
        self.deps.get(&(func, load)).unwrap_or(&self.empty)
    }
}

impl ReachingStores {
    pub fn compute(module: &Module) -> ReachingStores {
        let mut res = ReachingStores { deps: AHashMap::new(), empty: Vec::new() };
        for (id, func) in module.defined_funcs() {
            res.compute_func(module, id, func);
        }
        res
    }

    fn compute_func(&mut self, _module: &Module, id: FuncId, func: &ir::Function) {
        // Number the resolvable stores in block order; that number is the
        // dataflow domain.
        let mut places: IndexSet<Place, ahash::RandomState> = IndexSet::default();
        let mut stores: Vec<(Inst, usize)> = Vec::new();
        for (_, data) in func.blocks.iter_enumerated() {
            for &inst in &data.insts {
                let inst_data = &func.insts[inst];
                if matches!(inst_data.op, Op::Store) {
                    if let Some(addr) = inst_data.args.get(1) {
                        if let Some(place) = resolve_place(func, addr) {
                            let (place_idx, _) = places.insert_full(place);
                            stores.push((inst, place_idx));
                        }
                    }
                }
            }
        }
        if stores.is_empty() {
            return;
        }

        let mut place_stores: Vec<BitSet<usize>> =
            vec![BitSet::new_empty(stores.len()); places.len()];
        for (store_idx, &(_, place_idx)) in stores.iter().enumerate() {
            place_stores[place_idx].insert(store_idx);
        }
        let store_idx_of: AHashMap<Inst, usize> =
            stores.iter().enumerate().map(|(idx, &(inst, _))| (inst, idx)).collect();

        // Per-block transfer: out = gen ∪ (in − kill).
        let num_blocks = func.blocks.len();
        let mut gen: Vec<BitSet<usize>> = vec![BitSet::new_empty(stores.len()); num_blocks];
        let mut kill: Vec<BitSet<usize>> = vec![BitSet::new_empty(stores.len()); num_blocks];
        for (block, data) in func.blocks.iter_enumerated() {
            let b = usize::from(block);
            for &inst in &data.insts {
                if let Some(&store_idx) = store_idx_of.get(&inst) {
                    let place_idx = stores[store_idx].1;
                    kill[b].union(&place_stores[place_idx]);
                    gen[b].subtract(&place_stores[place_idx]);
                    gen[b].insert(store_idx);
                }
            }
        }

        let mut entry: Vec<BitSet<usize>> = vec![BitSet::new_empty(stores.len()); num_blocks];
        let mut queue: WorkQueue<ir::Block> = WorkQueue::with_none(num_blocks);
        queue.extend(func.reverse_postorder());
        while let Some(block) = queue.pop() {
            let b = usize::from(block);
            let mut incoming = BitSet::new_empty(stores.len());
            for &pred in func.predecessors(block) {
                let p = usize::from(pred);
                let mut out = entry[p].clone();
                out.subtract(&kill[p]);
                out.union(&gen[p]);
                incoming.union(&out);
            }
            if incoming != entry[b] {
                entry[b] = incoming;
                queue.extend(func.blocks[block].successors());
            }
        }

        // Walk each block once more to read off the loads.
        for (block, data) in func.blocks.iter_enumerated() {
            let mut cur = entry[usize::from(block)].clone();
            for &inst in &data.insts {
                let inst_data = &func.insts[inst];
                if matches!(inst_data.op, Op::Load) {
                    if let Some(place) =
                        inst_data.args.first().and_then(|addr| resolve_place(func, addr))
                    {
                        if let Some(place_idx) = places.get_index_of(&place) {
                            let mut reaching = cur.clone();
                            reaching.intersect(&place_stores[place_idx]);
                            let defs: Vec<Inst> =
                                reaching.iter().map(|store_idx| stores[store_idx].0).collect();
                            if !defs.is_empty() {
                                self.deps.insert((id, inst), defs);
                            }
                        }
                    }
                }
                if let Some(&store_idx) = store_idx_of.get(&inst) {
                    let place_idx = stores[store_idx].1;
                    cur.subtract(&place_stores[place_idx]);
                    cur.insert(store_idx);
                }
            }
        }
    }
}
