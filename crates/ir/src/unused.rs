//! Drops functions unreachable from the entry and globals without uses,
//! rebuilding the module with compact ids.

use ahash::AHashMap;

use crate::{FuncId, GlobalId, Module, Operand};

/// Returns a module containing only the entry, everything the entry
/// transitively references (called or address-taken) and the globals those
/// functions use. Indices are re-assigned; `entry` maps to the returned id.
pub fn remove_unused(module: &Module, entry: FuncId) -> (Module, FuncId) {
    let mut live_funcs = vec![false; module.funcs.len()];
    let mut live_globals = vec![false; module.globals.len()];
    let mut worklist = vec![entry];
    live_funcs[usize::from(entry)] = true;

    while let Some(func) = worklist.pop() {
        let data = &module.funcs[func];
        let mut reference = |op: &Operand| match op {
            Operand::Func(target) => {
                if !live_funcs[usize::from(*target)] {
                    live_funcs[usize::from(*target)] = true;
                    worklist.push(*target);
                }
            }
            Operand::Global(global) => live_globals[usize::from(*global)] = true,
            _ => (),
        };
        for inst in &data.insts {
            for arg in &inst.args {
                reference(arg);
            }
        }
        for block in &data.blocks {
            if let Some(term) = &block.terminator {
                term.visit_operands(&mut reference);
            }
        }
    }

    let mut func_map: AHashMap<FuncId, FuncId> = AHashMap::new();
    let mut global_map: AHashMap<GlobalId, GlobalId> = AHashMap::new();
    let mut res = Module::default();

    for (id, global) in module.globals.iter_enumerated() {
        if live_globals[usize::from(id)] {
            global_map.insert(id, res.add_global(global.clone()));
        }
    }
    for (id, func) in module.funcs.iter_enumerated() {
        if live_funcs[usize::from(id)] {
            func_map.insert(id, res.add_func(func.clone()));
        }
    }

    // Rewrite the symbol references to the compacted ids.
    for func in &mut res.funcs {
        let mut rewrite = |op: &mut Operand| match op {
            Operand::Func(target) => *target = func_map[target],
            Operand::Global(global) => *global = global_map[global],
            _ => (),
        };
        for inst in &mut func.insts {
            for arg in &mut inst.args {
                rewrite(arg);
            }
        }
        for block in &mut func.blocks {
            if let Some(term) = &mut block.terminator {
                term.visit_operands_mut(&mut rewrite);
            }
        }
    }

    let new_entry = func_map[&entry];
    (res, new_entry)
}
