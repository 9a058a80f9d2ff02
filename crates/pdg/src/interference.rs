//! Interference edges for the multithreaded mode: loose read/write
//! conflicts on globals between different procedures. No happens-before
//! reasoning; every cross-procedure store/load pair of the same global
//! interferes.

use ir::{FuncId, GlobalId, Module, Op};

use crate::reaching::{resolve_place, Place};
use crate::{NodeId, NodeKey, NodeKind, Pdg};

pub fn add_interference_edges(pdg: &mut Pdg, module: &Module) {
    let mut stores: Vec<(GlobalId, FuncId, NodeId)> = Vec::new();
    let mut loads: Vec<(GlobalId, FuncId, NodeId)> = Vec::new();

    for (func, data) in module.defined_funcs() {
        for (_, block_data) in data.blocks.iter_enumerated() {
            for &inst in &block_data.insts {
                let inst_data = &data.insts[inst];
                let (addr, sink) = match inst_data.op {
                    Op::Store => (inst_data.args.get(1), &mut stores),
                    Op::Load => (inst_data.args.first(), &mut loads),
                    _ => continue,
                };
                let place = addr.and_then(|addr| resolve_place(data, addr));
                if let Some(Place::Global(global)) = place {
                    if let Some(node) = pdg.get(NodeKey { func, kind: NodeKind::Inst(inst) }) {
                        sink.push((global, func, node));
                    }
                }
            }
        }
    }

    for &(global, store_func, store_node) in &stores {
        for &(load_global, load_func, load_node) in &loads {
            if global == load_global && store_func != load_func {
                pdg.add_interference(store_node, load_node);
            }
        }
    }
}
