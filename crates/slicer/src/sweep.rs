//! Dropping everything outside the slice.

use bitset::BitSet;
use ir::{FuncId, InstData, Module, Op, Operand};
use pdg::{NodeId, NodeKey, NodeKind, Pdg};

/// Isolates every node outside the slice: all four edge sets are cleared
/// (with their reverse counterparts), the node is detached from the block
/// overlay and flagged dropped.
pub fn sweep(pdg: &mut Pdg, marked: &BitSet<NodeId>) {
    for idx in 0..pdg.len() {
        let node = NodeId::from(idx);
        if !marked.contains(node) && !pdg.node_data(node).dropped {
            pdg.isolate(node);
        }
    }
}

/// Applies the slice to the IR: instructions whose node was swept become
/// `noop`, and any operand still referring to a dropped value is replaced by
/// `undef`. The CFG shape (blocks and terminators) is preserved — diverging
/// branches are handled by the cutoff pass, not here.
pub fn apply_to_module(module: &mut Module, pdg: &Pdg, marked: &BitSet<NodeId>) {
    let func_ids: Vec<FuncId> = module.defined_funcs().map(|(id, _)| id).collect();
    for func in func_ids {
        let data = &mut module.funcs[func];

        let mut dropped: Vec<ir::Inst> = Vec::new();
        for (inst, _) in data.insts.iter_enumerated() {
            if let Some(node) = pdg.get(NodeKey { func, kind: NodeKind::Inst(inst) }) {
                if !marked.contains(node) {
                    dropped.push(inst);
                }
            }
        }
        for &inst in &dropped {
            data.insts[inst] = InstData::noop();
        }

        // Any use of a dropped value degrades to undef.
        for idx in 0..data.insts.len() {
            let inst = ir::Inst::from(idx);
            let mut args = std::mem::take(&mut data.insts[inst].args);
            for arg in &mut args {
                if let Operand::Value(value) = arg {
                    if matches!(data.insts[*value].op, Op::Noop) {
                        *arg = Operand::Const(ir::Const::Undef);
                    }
                }
            }
            data.insts[inst].args = args;
        }
        for idx in 0..data.blocks.len() {
            let block = ir::Block::from(idx);
            let mut term = data.blocks[block].terminator.take();
            if let Some(term) = &mut term {
                term.visit_operands_mut(|op| {
                    if let Operand::Value(inst) = op {
                        if matches!(data.insts[*inst].op, Op::Noop) {
                            *op = Operand::Const(ir::Const::Undef);
                        }
                    }
                });
            }
            data.blocks[block].terminator = term;
        }
    }
}
