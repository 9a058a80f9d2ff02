//! Slicing criteria: grammar and resolution to IR instructions / PDG nodes.
//!
//! Three spellings are accepted, comma-separated:
//!
//! * `file#line#col` — a source position (the source-level variant);
//! * `func:line` / `func:line:col` — a source position scoped to a procedure;
//! * `symbol` — every call site of the named marker procedure.

use indexmap::IndexSet;
use ir::{FuncId, Inst, Module, SrcLoc};
use pdg::{NodeId, NodeKey, NodeKind, Pdg};
use smol_str::SmolStr;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum CriterionSpec {
    SourceTriple { file: SmolStr, line: u32, col: u32 },
    FuncLine { func: SmolStr, line: u32, col: Option<u32> },
    MarkerCall { symbol: SmolStr },
}

pub fn parse_criteria(raw: &str) -> Result<Vec<CriterionSpec>, String> {
    raw.split(',')
        .filter(|part| !part.is_empty())
        .map(parse_criterion)
        .collect()
}

fn parse_criterion(raw: &str) -> Result<CriterionSpec, String> {
    if raw.contains('#') {
        let parts: Vec<&str> = raw.split('#').collect();
        if parts.len() != 3 {
            return Err(format!("invalid criterion {:?}, use file#line#col", raw));
        }
        let line = parse_num(parts[1], raw)?;
        let col = parse_num(parts[2], raw)?;
        return Ok(CriterionSpec::SourceTriple { file: SmolStr::new(parts[0]), line, col });
    }
    if raw.contains(':') {
        let parts: Vec<&str> = raw.split(':').collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err(format!("invalid criterion {:?}, use func:line[:col]", raw));
        }
        let line = parse_num(parts[1], raw)?;
        let col = parts.get(2).map(|part| parse_num(part, raw)).transpose()?;
        return Ok(CriterionSpec::FuncLine { func: SmolStr::new(parts[0]), line, col });
    }
    if raw.is_empty() {
        return Err("empty criterion".to_owned());
    }
    Ok(CriterionSpec::MarkerCall { symbol: SmolStr::new(raw) })
}

fn parse_num(part: &str, raw: &str) -> Result<u32, String> {
    part.parse().map_err(|_| format!("invalid number {:?} in criterion {:?}", part, raw))
}

/// Resolves criteria to IR instructions. A source position selects every
/// instruction whose first debug location matches it; a marker symbol
/// selects its call sites, or with `next_instr` the first instruction at or
/// after each call (the following instruction in block order, falling over
/// to the successor blocks when the call ends its block).
pub fn resolve_to_insts(
    module: &Module,
    specs: &[CriterionSpec],
    next_instr: bool,
) -> Vec<(FuncId, Inst)> {
    let mut res: IndexSet<(FuncId, Inst), ahash::RandomState> = IndexSet::default();

    for (id, func) in module.defined_funcs() {
        for (block, block_data) in func.blocks.iter_enumerated() {
            for (pos, &inst) in block_data.insts.iter().enumerate() {
                let data = &func.insts[inst];
                for spec in specs {
                    let matched = match spec {
                        CriterionSpec::SourceTriple { file, line, col } => {
                            func.file.as_ref() == Some(file)
                                && data.loc == Some(SrcLoc { line: *line, col: *col })
                        }
                        CriterionSpec::FuncLine { func: name, line, col } => {
                            func.name == *name
                                && data.loc.map_or(false, |loc| {
                                    loc.line == *line && col.map_or(true, |col| loc.col == col)
                                })
                        }
                        CriterionSpec::MarkerCall { symbol } => data
                            .callee()
                            .and_then(|callee| callee.as_func())
                            .map_or(false, |callee| module.funcs[callee].name == *symbol),
                    };
                    if !matched {
                        continue;
                    }

                    let next_of_marker =
                        next_instr && matches!(spec, CriterionSpec::MarkerCall { .. });
                    if !next_of_marker {
                        res.insert((id, inst));
                    } else if let Some(&next) = block_data.insts.get(pos + 1) {
                        res.insert((id, next));
                    } else {
                        // The marker ends its block; fall over to the
                        // successor blocks.
                        for succ in block_data.successors() {
                            if let Some(&first) = func.blocks[succ].insts.first() {
                                res.insert((id, first));
                            }
                        }
                    }
                }
            }
        }
    }

    res.into_iter().collect()
}

/// Looks the criterion instructions up in the PDG.
pub fn resolve_to_nodes(pdg: &Pdg, insts: &[(FuncId, Inst)]) -> Vec<NodeId> {
    insts
        .iter()
        .filter_map(|&(func, inst)| pdg.get(NodeKey { func, kind: NodeKind::Inst(inst) }))
        .collect()
}
