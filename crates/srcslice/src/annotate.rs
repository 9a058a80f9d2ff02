//! Annotated IR listing: the module text with a comment line per dependence
//! edge, used for debugging the analyses.

use std::io::{self, Write};

use bitset::BitSet;
use callgraph::CallGraph;
use ir::{Function, Module, Op, Operand};
use pdg::{NodeId, NodeKey, NodeKind, Pdg};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AnnotateKind {
    /// Data-dependence edges.
    Dd,
    /// Control-dependence edges.
    Cd,
    /// Resolved callee sets of call sites.
    Pta,
    /// Resolved places of loads and stores.
    Memacc,
    /// Mark in-slice instructions.
    Slice,
}

impl std::str::FromStr for AnnotateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<AnnotateKind, String> {
        match s {
            "dd" => Ok(AnnotateKind::Dd),
            "cd" => Ok(AnnotateKind::Cd),
            "pta" => Ok(AnnotateKind::Pta),
            "memacc" => Ok(AnnotateKind::Memacc),
            "slice" => Ok(AnnotateKind::Slice),
            _ => Err(format!("unknown annotation {:?} (use dd|cd|pta|memacc|slice)", s)),
        }
    }
}

pub fn annotate(
    out: &mut dyn Write,
    module: &Module,
    pdg: &Pdg,
    cg: &CallGraph<'_>,
    marked: &BitSet<NodeId>,
    kinds: &[AnnotateKind],
) -> io::Result<()> {
    let want = |kind| kinds.contains(&kind);

    for (func, data) in module.defined_funcs() {
        writeln!(out, "fn @{} {{", data.name)?;
        for (block, block_data) in data.blocks.iter_enumerated() {
            writeln!(out, "{:?}:", block)?;
            for &inst in &block_data.insts {
                let inst_data = &data.insts[inst];
                writeln!(out, "    {}", ir::inst_string(module, data, inst_data))?;

                let node = pdg.get(NodeKey { func, kind: NodeKind::Inst(inst) });
                if let Some(node) = node {
                    if want(AnnotateKind::Slice) && marked.contains(node) {
                        writeln!(out, "        ; slice")?;
                    }
                    if want(AnnotateKind::Dd) {
                        for &from in &pdg.node_data(node).rev_data {
                            writeln!(out, "        ; dd <- {}", describe(module, pdg, from))?;
                        }
                    }
                    if want(AnnotateKind::Cd) {
                        for &from in &pdg.node_data(node).rev_ctrl {
                            writeln!(out, "        ; cd <- {}", describe(module, pdg, from))?;
                        }
                    }
                }

                if want(AnnotateKind::Pta) && inst_data.is_call() {
                    let callees: Vec<String> = cg
                        .called_functions(func, inst)
                        .iter()
                        .map(|&callee| format!("@{}", module.funcs[callee].name))
                        .collect();
                    writeln!(out, "        ; pta -> [{}]", callees.join(", "))?;
                }
                if want(AnnotateKind::Memacc) {
                    if let Some(access) = memory_access(module, data, inst_data) {
                        writeln!(out, "        ; memacc {}", access)?;
                    }
                }
            }
            writeln!(out, "    {}", ir::term_string(module, data, block_data))?;
            if want(AnnotateKind::Cd) {
                if let Some(node) = pdg.get(NodeKey { func, kind: NodeKind::Term(block) }) {
                    for &from in &pdg.node_data(node).rev_ctrl {
                        writeln!(out, "        ; cd <- {}", describe(module, pdg, from))?;
                    }
                }
            }
        }
        writeln!(out, "}}")?;
    }
    Ok(())
}

fn describe(module: &Module, pdg: &Pdg, node: NodeId) -> String {
    let key = pdg.key(node);
    let func = &module.funcs[key.func];
    match key.kind {
        NodeKind::Inst(inst) => match &func.insts[inst].result {
            Some(name) => format!("@{}/%{}", func.name, name),
            None => format!("@{}/{:?}", func.name, inst),
        },
        NodeKind::Term(block) => format!("@{}/{:?}.term", func.name, block),
        NodeKind::Param(idx) => format!("@{}/arg{}", func.name, idx),
    }
}

fn memory_access(module: &Module, func: &Function, inst: &ir::InstData) -> Option<String> {
    let (what, addr) = match inst.op {
        Op::Load => ("load", inst.args.first()?),
        Op::Store => ("store", inst.args.get(1)?),
        _ => return None,
    };
    let place = match addr {
        Operand::Value(value) if matches!(func.insts[*value].op, Op::Alloca) => {
            match &func.insts[*value].result {
                Some(name) => format!("%{}", name),
                None => format!("{:?}", value),
            }
        }
        Operand::Global(global) => format!("@{}", module.globals[*global].name),
        _ => "<unresolved>".to_owned(),
    };
    Some(format!("{} of {}", what, place))
}
