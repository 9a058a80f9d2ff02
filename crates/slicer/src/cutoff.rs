//! Pre-slice CFG surgery: shield blocks that cannot reach any criterion.
//!
//! Backward reachability over the inter-procedural CFG from the criteria
//! blocks gives the *relevant* set; every other block gets a call to a
//! freshly declared non-returning `exit` prefixed before its first non-phi
//! instruction. Irrelevant branches thereby become dead, so the dependence
//! analyses that run afterwards cannot import spurious dependencies through
//! them.

use ahash::AHashSet;
use callgraph::{CallCompat, CallGraph};
use ir::{Block, Const, FuncId, Function, Inst, InstData, Module, Op, Operand, Signature, Ty};
use smallvec::smallvec;
use smol_str::SmolStr;

/// Returns the stub call instructions that were inserted (they belong in the
/// slice: removing them would undo the hardening).
pub fn cutoff_diverging_branches(
    module: &mut Module,
    entry: FuncId,
    criteria: &[(FuncId, Inst)],
    compat: CallCompat,
) -> Result<Vec<(FuncId, Inst)>, String> {
    if criteria.is_empty() {
        return Err("have no slicing criteria instructions".to_owned());
    }
    if module.funcs[entry].is_declaration() {
        return Err("did not find the entry function".to_owned());
    }

    let relevant = relevant_blocks(module, criteria, compat);
    let exit_fn = declare_exit_stub(module);

    let func_ids: Vec<FuncId> = module.defined_funcs().map(|(id, _)| id).collect();
    let mut stubs = Vec::new();
    for func in func_ids {
        if func == exit_fn {
            continue;
        }
        let num_blocks = module.funcs[func].blocks.len();
        for idx in 0..num_blocks {
            let block = Block::from(idx);
            if relevant.contains(&(func, block)) {
                continue;
            }
            let data = &mut module.funcs[func];
            let pos = data.first_non_phi(block);
            let stub = data.insts.next_key();
            data.insts.push(InstData {
                op: Op::Call,
                ty: Ty::Void,
                result: None,
                args: smallvec![Operand::Func(exit_fn), Operand::Const(Const::Int(0, Ty::I32))],
                loc: None,
            });
            data.blocks[block].insts.insert(pos, stub);
            stubs.push((func, stub));
        }
    }

    log::debug!("cut off {} diverging blocks", stubs.len());
    Ok(stubs)
}

/// The non-returning declaration the stubs call. An existing `exit`
/// declaration is reused only when its signature is exactly the expected
/// one; the input module controls that name, so anything else (a defined
/// body, a different arity or type) gets a fresh, uniquely-named
/// declaration instead.
fn declare_exit_stub(module: &mut Module) -> FuncId {
    let sig = Signature { params: vec![Ty::I32], ret: Ty::Void, variadic: false };

    if let Some(existing) = module.func_by_name("exit") {
        let func = &mut module.funcs[existing];
        if func.is_declaration() && func.sig == sig {
            func.noreturn = true;
            return existing;
        }
    } else {
        return module.add_func(Function::new_declaration(SmolStr::new("exit"), sig, true));
    }

    let mut counter = 0u32;
    let name = loop {
        let candidate = format!("exit.{}", counter);
        if module.func_by_name(&candidate).is_none() {
            break SmolStr::new(candidate);
        }
        counter += 1;
    };
    module.add_func(Function::new_declaration(name, sig, true))
}

/// Blocks from which some path in the inter-procedural CFG reaches a
/// criterion: the criteria blocks, their intra-procedural predecessors, and,
/// for the entry block of a procedure, the blocks of every call site calling
/// it.
fn relevant_blocks(
    module: &Module,
    criteria: &[(FuncId, Inst)],
    compat: CallCompat,
) -> AHashSet<(FuncId, Block)> {
    let cg = CallGraph::lazy(module, None, compat);
    let mut relevant: AHashSet<(FuncId, Block)> = AHashSet::new();
    let mut visited: AHashSet<(FuncId, Block)> = AHashSet::new();
    let mut queue: Vec<(FuncId, Block)> = Vec::new();

    for &(func, inst) in criteria {
        let blocks = module.funcs[func].containing_blocks();
        if let Some(block) = blocks[inst] {
            if visited.insert((func, block)) {
                queue.push((func, block));
            }
        }
    }

    while let Some((func, block)) = queue.pop() {
        relevant.insert((func, block));

        let data = &module.funcs[func];
        for &pred in data.predecessors(block) {
            if visited.insert((func, pred)) {
                queue.push((func, pred));
            }
        }

        if block == data.entry() {
            // Pop up from the call: every call site of this procedure.
            for (caller, call) in cg.call_sites_of(func) {
                let blocks = module.funcs[caller].containing_blocks();
                if let Some(call_block) = blocks[call] {
                    if visited.insert((caller, call_block)) {
                        queue.push((caller, call_block));
                    }
                }
            }
        }
    }

    relevant
}
