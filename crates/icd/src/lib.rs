//! Inter-procedural control dependence.
//!
//! A *noret point* is a position from which execution may never return to
//! its caller: a terminator without successors that is not a `ret`, a call
//! to an abnormal-terminator primitive (`exit`, `abort`, ...), a recursive
//! call, or a call whose callee transitively contains such a point.
//!
//! Everything that executes after a noret point is control-dependent on it:
//! whether those instructions run at all is decided there. [`InterprocCd`]
//! computes, per defined procedure, the noret points and two views of the
//! dependence they induce: per block (`block_cd`, the noret points flowing
//! into the block from its predecessors) and per instruction (`block_cd`
//! plus the local noret points strictly preceding the instruction).

use ahash::AHashMap;
use callgraph::CallGraph;
use indexmap::IndexSet;
use ir::{Block, FuncId, Function, Inst, Location, LocationKind, Module};
use smol_str::SmolStr;
use workqueue::WorkStack;

#[cfg(test)]
mod tests;

pub type LocationSet = IndexSet<Location, ahash::RandomState>;

#[derive(Clone, Debug)]
pub struct IcdConfig {
    /// Declarations whose calls terminate the program abnormally.
    pub abnormal_terminators: Vec<SmolStr>,
}

impl Default for IcdConfig {
    fn default() -> IcdConfig {
        IcdConfig {
            abnormal_terminators: ["exit", "abort", "_exit", "_Exit"]
                .into_iter()
                .map(SmolStr::new)
                .collect(),
        }
    }
}

impl IcdConfig {
    fn is_abnormal(&self, callee: &Function) -> bool {
        callee.noreturn || self.abnormal_terminators.iter().any(|name| *name == callee.name)
    }
}

#[derive(Default)]
pub struct FuncInfo {
    /// Call instructions and terminators that may not return.
    pub noret: LocationSet,
    /// Set once control dependencies have been computed.
    pub has_cd: bool,
    /// Noret points flowing into each block; blocks without any are absent.
    pub block_cd: AHashMap<Block, LocationSet>,
    /// The local noret points of each block, in instruction order.
    pub block_norets: AHashMap<Block, Vec<Location>>,
}

impl FuncInfo {
    /// The control dependencies of `inst` inside `block`: the block's
    /// incoming noret points plus the local ones strictly preceding the
    /// instruction.
    pub fn instr_cd(&self, func: &Function, block: Block, inst: Inst) -> Vec<Location> {
        let mut res: Vec<Location> = match self.block_cd.get(&block) {
            Some(set) => set.iter().copied().collect(),
            None => Vec::new(),
        };
        if let Some(norets) = self.block_norets.get(&block) {
            let insts = &func.blocks[block].insts;
            let pos = insts.iter().position(|&i| i == inst).unwrap_or(insts.len());
            for point in norets {
                match point.kind {
                    LocationKind::Inst(p) => {
                        let ppos = insts.iter().position(|&i| i == p).unwrap_or(insts.len());
                        if ppos < pos {
                            res.push(*point);
                        }
                    }
                    // A terminator never precedes an instruction.
                    LocationKind::Terminator => (),
                }
            }
        }
        res
    }
}

pub struct InterprocCd {
    infos: AHashMap<FuncId, FuncInfo>,
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    Grey,
    Black,
}

struct Frame {
    func: FuncId,
    /// (containing block, call site, resolved defined callee).
    calls: Vec<(Block, Inst, FuncId)>,
    next: usize,
}

impl InterprocCd {
    pub fn compute(module: &Module, cg: &CallGraph, config: &IcdConfig) -> InterprocCd {
        let mut res = InterprocCd { infos: AHashMap::new() };
        let mut colors: AHashMap<FuncId, Color> = AHashMap::new();
        for (func, _) in module.defined_funcs() {
            res.compute_func_info(module, cg, config, func, &mut colors);
        }
        for (func, _) in module.defined_funcs() {
            res.compute_cd(module, func);
        }
        res
    }

    pub fn func_info(&self, func: FuncId) -> Option<&FuncInfo> {
        self.infos.get(&func)
    }

    /// Collects the noret points of `root` and, depth-first, of everything
    /// it calls. The recursion over the call graph is an explicit stack; a
    /// call to a function currently on the stack is recursion and
    /// conservatively counts as a noret point.
    fn compute_func_info(
        &mut self,
        module: &Module,
        cg: &CallGraph,
        config: &IcdConfig,
        root: FuncId,
        colors: &mut AHashMap<FuncId, Color>,
    ) {
        if colors.contains_key(&root) {
            return;
        }

        let mut stack = vec![self.enter(module, cg, config, root, colors)];

        while let Some(top) = stack.len().checked_sub(1) {
            let func = stack[top].func;
            match stack[top].calls.get(stack[top].next).copied() {
                None => {
                    colors.insert(func, Color::Black);
                    stack.pop();
                }
                Some((block, call, callee)) => match colors.get(&callee).copied() {
                    // The callee is on the current call stack.
                    Some(Color::Grey) => {
                        stack[top].next += 1;
                        self.mark_noret(func, block, call);
                    }
                    Some(Color::Black) => {
                        stack[top].next += 1;
                        if !self.infos[&callee].noret.is_empty() {
                            self.mark_noret(func, block, call);
                        }
                    }
                    // Not computed yet; the call site is re-evaluated once
                    // the callee's frame completes.
                    None => {
                        let frame = self.enter(module, cg, config, callee, colors);
                        stack.push(frame);
                    }
                },
            }
        }
    }

    /// Phase A for one function: local noret points (dead-end terminators
    /// and calls to abnormal declarations), plus the list of defined callees
    /// to recurse into.
    fn enter(
        &mut self,
        module: &Module,
        cg: &CallGraph,
        config: &IcdConfig,
        func: FuncId,
        colors: &mut AHashMap<FuncId, Color>,
    ) -> Frame {
        colors.insert(func, Color::Grey);
        let info = self.infos.entry(func).or_default();
        let data = &module.funcs[func];

        let mut calls = Vec::new();
        for (block, block_data) in data.blocks.iter_enumerated() {
            if let Some(term) = &block_data.terminator {
                if term.successors().is_empty() && !term.is_ret() {
                    info.noret.insert(Location { block, kind: LocationKind::Terminator });
                }
            }

            for &inst in &block_data.insts {
                if !data.insts[inst].is_call() {
                    continue;
                }
                for callee in cg.called_functions(func, inst) {
                    let callee_data = &module.funcs[callee];
                    if callee_data.is_declaration() {
                        if config.is_abnormal(callee_data) {
                            info.noret.insert(Location { block, kind: LocationKind::Inst(inst) });
                        }
                    } else {
                        calls.push((block, inst, callee));
                    }
                }
            }
        }

        log::debug!("computing no-return points for @{}", data.name);
        Frame { func, calls, next: 0 }
    }

    fn mark_noret(&mut self, func: FuncId, block: Block, call: Inst) {
        self.infos
            .entry(func)
            .or_default()
            .noret
            .insert(Location { block, kind: LocationKind::Inst(call) });
    }

    /// Propagates the noret points of each block to everything reachable
    /// from it, to a fixpoint, then freezes the per-block views.
    fn compute_cd(&mut self, module: &Module, func: FuncId) {
        let data = &module.funcs[func];
        let info = self.infos.entry(func).or_default();

        let mut block_norets: AHashMap<Block, Vec<Location>> = AHashMap::new();
        for (block, block_data) in data.blocks.iter_enumerated() {
            let mut points = Vec::new();
            for &inst in &block_data.insts {
                let loc = Location { block, kind: LocationKind::Inst(inst) };
                if info.noret.contains(&loc) {
                    points.push(loc);
                }
            }
            let term = Location { block, kind: LocationKind::Terminator };
            if info.noret.contains(&term) {
                points.push(term);
            }
            if !points.is_empty() {
                block_norets.insert(block, points);
            }
        }

        let mut cds: AHashMap<Block, LocationSet> = AHashMap::new();
        let mut queue: WorkStack<Block> = WorkStack::with_none(data.blocks.len());
        // Seed in block order so the resulting sets iterate deterministically.
        for (block, block_data) in data.blocks.iter_enumerated() {
            if block_norets.contains_key(&block) {
                queue.extend(block_data.successors());
            }
        }

        while let Some(block) = queue.pop() {
            let mut new = LocationSet::default();
            for &pred in data.predecessors(block) {
                if let Some(set) = cds.get(&pred) {
                    new.extend(set.iter().copied());
                }
                if let Some(points) = block_norets.get(&pred) {
                    new.extend(points.iter().copied());
                }
            }
            if cds.get(&block) != Some(&new) {
                cds.insert(block, new);
                queue.extend(data.blocks[block].successors());
            }
        }

        cds.retain(|_, set| !set.is_empty());
        info.block_cd = cds;
        info.block_norets = block_norets;
        info.has_cd = true;
    }
}
