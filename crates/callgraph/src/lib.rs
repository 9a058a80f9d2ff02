//! The inter-procedural call graph (who may call whom).
//!
//! Three construction strategies sit behind one query surface:
//!
//! * [`CallGraph::imported`] re-uses caller→callee edges an external pointer
//!   analysis computed during its own fixpoint.
//! * [`CallGraph::eager`] walks the program from the entry procedure and
//!   resolves every call site up front through the points-to session.
//! * [`CallGraph::lazy`] starts empty and resolves call sites on demand,
//!   caching the result per call site. Without a points-to session it stays
//!   sound by over-approximating: an indirect call may target every defined
//!   function whose address is taken and whose signature is call-compatible
//!   with the site.

use std::cell::RefCell;

use ahash::AHashMap;
use indexmap::IndexSet;
use ir::{FuncId, Inst, Module, Operand};
use once_cell::unsync::OnceCell;
use smallvec::{smallvec, SmallVec};

mod compat;
mod points_to;

#[cfg(test)]
mod tests;

pub use compat::{call_is_compatible, CallCompat};
pub use points_to::{ExternalCallGraph, PointsTo, PointsToEntry, PtTarget};

type FuncSet = IndexSet<FuncId, ahash::RandomState>;

#[derive(Default)]
struct CgNode {
    callees: FuncSet,
    callers: FuncSet,
}

#[derive(Default)]
struct Graph {
    nodes: AHashMap<FuncId, CgNode>,
}

impl Graph {
    fn create_node(&mut self, func: FuncId) {
        self.nodes.entry(func).or_default();
    }

    /// Duplicate edges collapse; both directions are recorded together.
    fn add_call(&mut self, caller: FuncId, callee: FuncId) {
        self.nodes.entry(caller).or_default().callees.insert(callee);
        self.nodes.entry(callee).or_default().callers.insert(caller);
    }

    fn functions(&self) -> Vec<FuncId> {
        let mut res: Vec<_> = self.nodes.keys().copied().collect();
        res.sort_unstable();
        res
    }

    fn callers(&self, func: FuncId) -> Vec<FuncId> {
        self.nodes.get(&func).map_or(Vec::new(), |n| n.callers.iter().copied().collect())
    }

    fn callees(&self, func: FuncId) -> Vec<FuncId> {
        self.nodes.get(&func).map_or(Vec::new(), |n| n.callees.iter().copied().collect())
    }

    fn calls(&self, caller: FuncId, callee: FuncId) -> bool {
        self.nodes.get(&caller).map_or(false, |n| n.callees.contains(&callee))
    }
}

enum Strategy {
    Imported(Graph),
    Eager(Graph),
    Lazy(LazyState),
}

#[derive(Default)]
struct LazyState {
    graph: RefCell<Graph>,
    /// Resolved callee vectors per call site; repeated queries are O(1).
    funptrs: RefCell<AHashMap<(FuncId, Inst), SmallVec<[FuncId; 2]>>>,
    address_taken: OnceCell<Vec<FuncId>>,
}

pub struct CallGraph<'a> {
    module: &'a Module,
    pta: Option<&'a dyn PointsTo>,
    compat: CallCompat,
    strategy: Strategy,
}

impl<'a> CallGraph<'a> {
    /// Re-uses a call graph built by the pointer analysis.
    pub fn imported(module: &'a Module, external: &ExternalCallGraph) -> CallGraph<'a> {
        let mut graph = Graph::default();
        for &(caller, callee) in &external.edges {
            graph.add_call(caller, callee);
        }
        CallGraph { module, pta: None, compat: CallCompat::default(), strategy: Strategy::Imported(graph) }
    }

    /// Builds the graph of everything reachable from `entry` up front.
    pub fn eager(
        module: &'a Module,
        entry: FuncId,
        pta: &'a dyn PointsTo,
        compat: CallCompat,
    ) -> CallGraph<'a> {
        let mut graph = Graph::default();
        graph.create_node(entry);

        let mut queue = vec![entry];
        let mut enqueued: IndexSet<FuncId, ahash::RandomState> = IndexSet::default();
        enqueued.insert(entry);
        let mut head = 0;
        while head < queue.len() {
            let cur = queue[head];
            head += 1;
            let func = &module.funcs[cur];
            for data in func.insts.iter() {
                let callee = match data.callee() {
                    Some(callee) => callee,
                    None => continue,
                };
                let targets: SmallVec<[FuncId; 2]> = match callee.as_func() {
                    Some(target) => smallvec![target],
                    None => pta
                        .points_to(module, cur, callee)
                        .into_iter()
                        .filter_map(|entry| match entry.target {
                            PtTarget::Func(target) => Some(target),
                            _ => None,
                        })
                        .collect(),
                };
                for target in targets {
                    graph.add_call(cur, target);
                    if !module.funcs[target].is_declaration() && enqueued.insert(target) {
                        queue.push(target);
                    }
                }
            }
        }

        CallGraph { module, pta: Some(pta), compat, strategy: Strategy::Eager(graph) }
    }

    /// An initially empty graph; queries resolve call sites on demand.
    pub fn lazy(
        module: &'a Module,
        pta: Option<&'a dyn PointsTo>,
        compat: CallCompat,
    ) -> CallGraph<'a> {
        CallGraph { module, pta, compat, strategy: Strategy::Lazy(LazyState::default()) }
    }

    /// Functions present in the graph so far. With the lazy strategy there
    /// may be functions missing until [`build`](Self::build) has run.
    pub fn procedures(&self) -> Vec<FuncId> {
        match &self.strategy {
            Strategy::Imported(graph) | Strategy::Eager(graph) => graph.functions(),
            Strategy::Lazy(state) => state.graph.borrow().functions(),
        }
    }

    pub fn callers(&self, func: FuncId) -> Vec<FuncId> {
        match &self.strategy {
            Strategy::Imported(graph) | Strategy::Eager(graph) => graph.callers(func),
            Strategy::Lazy(state) => state.graph.borrow().callers(func),
        }
    }

    pub fn callees(&self, func: FuncId) -> Vec<FuncId> {
        match &self.strategy {
            Strategy::Imported(graph) | Strategy::Eager(graph) => graph.callees(func),
            Strategy::Lazy(state) => state.graph.borrow().callees(func),
        }
    }

    pub fn calls(&self, caller: FuncId, callee: FuncId) -> bool {
        match &self.strategy {
            Strategy::Imported(graph) | Strategy::Eager(graph) => graph.calls(caller, callee),
            Strategy::Lazy(state) => state.graph.borrow().calls(caller, callee),
        }
    }

    /// Forces construction. Only meaningful for the lazy strategy: resolves
    /// the call sites of every defined function.
    pub fn build(&self) {
        if let Strategy::Lazy(_) = self.strategy {
            for (func, data) in self.module.defined_funcs() {
                for (inst, inst_data) in data.insts.iter_enumerated() {
                    if inst_data.is_call() {
                        self.called_functions(func, inst);
                    }
                }
            }
        }
    }

    /// Resolves the call site `inst` of `func` to its possible callees.
    pub fn called_functions(&self, func: FuncId, inst: Inst) -> SmallVec<[FuncId; 2]> {
        let data = &self.module.funcs[func].insts[inst];
        let callee = match data.callee() {
            Some(callee) => callee,
            None => return SmallVec::new(),
        };

        // Direct calls resolve trivially under every strategy.
        if let Some(target) = callee.as_func() {
            if let Strategy::Lazy(state) = &self.strategy {
                state.graph.borrow_mut().add_call(func, target);
            }
            return smallvec![target];
        }

        match &self.strategy {
            Strategy::Lazy(state) => {
                if let Some(cached) = state.funptrs.borrow().get(&(func, inst)) {
                    return cached.clone();
                }
                let targets = self.resolve_indirect(func, inst, callee);
                if targets.is_empty() {
                    log::warn!(
                        "unresolved indirect call in @{}, treating as no-op for dependence",
                        self.module.funcs[func].name
                    );
                }
                let mut graph = state.graph.borrow_mut();
                for &target in &targets {
                    graph.add_call(func, target);
                }
                state.funptrs.borrow_mut().insert((func, inst), targets.clone());
                targets
            }
            _ => match self.pta {
                Some(pta) => pta
                    .points_to(self.module, func, callee)
                    .into_iter()
                    .filter_map(|entry| match entry.target {
                        PtTarget::Func(target) => Some(target),
                        _ => None,
                    })
                    .collect(),
                None => SmallVec::new(),
            },
        }
    }

    /// Every call site that may call `target`, with its containing function.
    pub fn call_sites_of(&self, target: FuncId) -> Vec<(FuncId, Inst)> {
        let mut res = Vec::new();
        for (func, data) in self.module.defined_funcs() {
            for (inst, inst_data) in data.insts.iter_enumerated() {
                if inst_data.is_call() && self.called_functions(func, inst).contains(&target) {
                    res.push((func, inst));
                }
            }
        }
        res
    }

    fn resolve_indirect(
        &self,
        func: FuncId,
        inst: Inst,
        callee: &Operand,
    ) -> SmallVec<[FuncId; 2]> {
        let data = &self.module.funcs[func].insts[inst];
        if let Some(pta) = self.pta {
            return pta
                .points_to(self.module, func, callee)
                .into_iter()
                .filter_map(|entry| match entry.target {
                    PtTarget::Func(target) => Some(target),
                    _ => None,
                })
                .filter(|&target| {
                    call_is_compatible(
                        &self.module.funcs[func],
                        data,
                        &self.module.funcs[target],
                        self.compat,
                    )
                })
                .collect();
        }

        let caller = &self.module.funcs[func];
        self.address_taken()
            .iter()
            .copied()
            .filter(|&target| {
                call_is_compatible(caller, data, &self.module.funcs[target], self.compat)
            })
            .collect()
    }

    /// Defined functions whose address escapes into data: any use other than
    /// being the called value of a call counts (a store of the address does,
    /// an unknown use conservatively does).
    pub fn address_taken(&self) -> &[FuncId] {
        let state = match &self.strategy {
            Strategy::Lazy(state) => state,
            _ => panic!("address-taken filter is a lazy-strategy fallback"),
        };
        state.address_taken.get_or_init(|| {
            let mut taken = vec![false; self.module.funcs.len()];
            let mut mark = |op: &Operand| {
                if let Operand::Func(target) = op {
                    taken[usize::from(*target)] = true;
                }
            };
            for (_, func) in self.module.defined_funcs() {
                for data in func.insts.iter() {
                    // The called-value slot of a call is not an escaping use.
                    let args = if data.is_call() { data.call_args() } else { &data.args[..] };
                    args.iter().for_each(&mut mark);
                }
                for block in &func.blocks {
                    if let Some(term) = &block.terminator {
                        term.visit_operands(&mut mark);
                    }
                }
            }
            self.module
                .funcs
                .iter_enumerated()
                .filter(|(id, func)| taken[usize::from(*id)] && !func.is_declaration())
                .map(|(id, _)| id)
                .collect()
        })
    }
}
