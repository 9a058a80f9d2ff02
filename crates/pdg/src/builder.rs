//! Builds the PDG of a whole program.
//!
//! Data-dependence edges go def → use: SSA operands directly, loads to their
//! reaching stores through the data-dependence service. Control-dependence
//! edges go controller → dependent: the classical intra-procedural relation
//! (branch terminators) plus the inter-procedural noret points. Call sites
//! are wired to the callee's formal parameters and return terminators
//! (parameter linkage).

use callgraph::CallGraph;
use icd::InterprocCd;
use ir::{FuncId, Function, Location, LocationKind, Module, Op, Operand};

use crate::{
    control_dependence, interference, post_dominators, CallParams, DataDeps, NodeId, NodeKey,
    NodeKind, Pdg,
};

pub struct PdgParams<'a> {
    pub module: &'a Module,
    pub cg: &'a CallGraph<'a>,
    pub icd: &'a InterprocCd,
    pub data_deps: &'a dyn DataDeps,
    /// Wire interference edges for the multithreaded mode.
    pub interference: bool,
}

pub fn build(params: &PdgParams<'_>) -> Pdg {
    let mut pdg = Pdg::new();
    for (func, data) in params.module.defined_funcs() {
        build_func(&mut pdg, params, func, data);
    }
    if params.interference {
        interference::add_interference_edges(&mut pdg, params.module);
    }
    log::debug!("built PDG with {} nodes", pdg.len());
    pdg
}

fn build_func(pdg: &mut Pdg, params: &PdgParams<'_>, func: FuncId, data: &Function) {
    let module = params.module;

    // Create the nodes in layout order so the overlay mirrors the blocks.
    for i in 0..data.sig.params.len() {
        pdg.node(NodeKey { func, kind: NodeKind::Param(i as u32) });
    }
    for (block, block_data) in data.blocks.iter_enumerated() {
        for &inst in &block_data.insts {
            pdg.inst_node(func, block, inst);
        }
        pdg.node(NodeKey { func, kind: NodeKind::Term(block) });
    }

    // Data dependence.
    for (block, block_data) in data.blocks.iter_enumerated() {
        for &inst in &block_data.insts {
            let to = pdg.inst_node(func, block, inst);
            let inst_data = &data.insts[inst];
            for arg in &inst_data.args {
                add_operand_edge(pdg, func, arg, to);
            }
            if matches!(inst_data.op, Op::Load) {
                for &def in params.data_deps.reaching_defs(func, inst) {
                    if let Some(from) = pdg.get(NodeKey { func, kind: NodeKind::Inst(def) }) {
                        pdg.add_data_edge(from, to);
                    }
                }
            }
        }

        let term_node = pdg.node(NodeKey { func, kind: NodeKind::Term(block) });
        let mut term_edges = Vec::new();
        if let Some(term) = &block_data.terminator {
            term.visit_operands(|op| term_edges.push(op.clone()));
        }
        for op in term_edges {
            add_operand_edge(pdg, func, &op, term_node);
        }
    }

    // Classical intra-procedural control dependence.
    let ipdom = post_dominators(data);
    let cdg = control_dependence(&ipdom, data);
    for (block, _) in data.blocks.iter_enumerated() {
        let controllers = match cdg.row(block) {
            Some(row) => row.iter().collect::<Vec<_>>(),
            None => continue,
        };
        let dependents: Vec<NodeId> = match pdg.block_nodes(func, block) {
            Some(nodes) => nodes.to_vec(),
            None => continue,
        };
        for controller in controllers {
            let from = pdg.node(NodeKey { func, kind: NodeKind::Term(controller) });
            for &to in &dependents {
                pdg.add_ctrl_edge(from, to);
            }
        }
    }

    // Inter-procedural control dependence: everything at or after a noret
    // point depends on it.
    if let Some(info) = params.icd.func_info(func) {
        for (block, block_data) in data.blocks.iter_enumerated() {
            let incoming: Vec<Location> = match info.block_cd.get(&block) {
                Some(set) => set.iter().copied().collect(),
                None => Vec::new(),
            };
            let norets = info.block_norets.get(&block);
            let mut preceding: Vec<Location> = Vec::new();

            for &inst in &block_data.insts {
                let to = pdg.inst_node(func, block, inst);
                for point in incoming.iter().chain(&preceding) {
                    let from = location_node(pdg, func, *point);
                    pdg.add_ctrl_edge(from, to);
                }
                let loc = Location { block, kind: LocationKind::Inst(inst) };
                if norets.map_or(false, |points| points.contains(&loc)) {
                    preceding.push(loc);
                }
            }

            let term_node = pdg.node(NodeKey { func, kind: NodeKind::Term(block) });
            for point in incoming.iter().chain(&preceding) {
                let from = location_node(pdg, func, *point);
                pdg.add_ctrl_edge(from, term_node);
            }
        }
    }

    // Parameter linkage.
    for (block, block_data) in data.blocks.iter_enumerated() {
        for &inst in &block_data.insts {
            if !data.insts[inst].is_call() {
                continue;
            }
            let call_node = pdg.inst_node(func, block, inst);
            for callee in params.cg.called_functions(func, inst) {
                let callee_data = &module.funcs[callee];
                if callee_data.is_declaration() {
                    continue;
                }
                wire_call(pdg, call_node, callee, callee_data);
            }
        }
    }
}

fn add_operand_edge(pdg: &mut Pdg, func: FuncId, op: &Operand, to: NodeId) {
    let key = match op {
        Operand::Value(def) => NodeKey { func, kind: NodeKind::Inst(*def) },
        Operand::Arg(idx) => NodeKey { func, kind: NodeKind::Param(*idx) },
        _ => return,
    };
    if let Some(from) = pdg.get(key) {
        pdg.add_data_edge(from, to);
    }
}

fn location_node(pdg: &mut Pdg, func: FuncId, point: Location) -> NodeId {
    let kind = match point.kind {
        LocationKind::Inst(inst) => NodeKind::Inst(inst),
        LocationKind::Terminator => NodeKind::Term(point.block),
    };
    pdg.node(NodeKey { func, kind })
}

/// The call site gets edges to the callee's formal parameters and from its
/// return terminators; the callee PDG joins the call site's subgraph set.
fn wire_call(pdg: &mut Pdg, call_node: NodeId, callee: FuncId, callee_data: &Function) {
    if pdg.node_data(call_node).subgraphs.contains(&callee) {
        return;
    }

    let mut formals = Vec::with_capacity(callee_data.sig.params.len());
    for i in 0..callee_data.sig.params.len() {
        let formal = pdg.node(NodeKey { func: callee, kind: NodeKind::Param(i as u32) });
        pdg.add_data_edge(call_node, formal);
        formals.push(formal);
    }

    let mut rets = Vec::new();
    for (block, block_data) in callee_data.blocks.iter_enumerated() {
        if block_data.terminator.as_ref().map_or(false, |term| term.is_ret()) {
            let ret = pdg.node(NodeKey { func: callee, kind: NodeKind::Term(block) });
            pdg.add_data_edge(ret, call_node);
            rets.push(ret);
        }
    }

    let node = &mut pdg.nodes[call_node];
    node.subgraphs.push(callee);
    node.params.push(CallParams { callee, formals, rets });
}
