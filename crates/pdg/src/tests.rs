use callgraph::{CallCompat, CallGraph};
use icd::{IcdConfig, InterprocCd};
use ir::Module;

use crate::{build, DataDeps, NodeKey, NodeKind, Pdg, PdgParams, ReachingStores};

fn build_pdg(src: &str) -> (Module, Pdg) {
    let module = Module::parse(src).unwrap();
    let cg = CallGraph::lazy(&module, None, CallCompat::default());
    let icd = InterprocCd::compute(&module, &cg, &IcdConfig::default());
    let reaching = ReachingStores::compute(&module);
    let pdg = build(&PdgParams {
        module: &module,
        cg: &cg,
        icd: &icd,
        data_deps: &reaching,
        interference: false,
    });
    (module, pdg)
}

fn assert_edge_symmetry(pdg: &Pdg) {
    for (node, data) in pdg.iter() {
        for &succ in &data.data {
            assert!(pdg.node_data(succ).rev_data.contains(&node), "{node:?} -> {succ:?}");
        }
        for &pred in &data.rev_data {
            assert!(pdg.node_data(pred).data.contains(&node), "{pred:?} -> {node:?}");
        }
        for &succ in &data.ctrl {
            assert!(pdg.node_data(succ).rev_ctrl.contains(&node), "{node:?} -> {succ:?}");
        }
        for &pred in &data.rev_ctrl {
            assert!(pdg.node_data(pred).ctrl.contains(&node), "{pred:?} -> {node:?}");
        }
    }
}

const STRAIGHT_LINE: &str = r#"
module {
decl @printf(str, ...) -> i32;
fn @main() -> i32 file "s1.c" line 1 {
bb0:
    %a = alloca.i32 !2:7;
    store [i32 1, %a] !2:9;
    %0 = load.i32 [%a] !3:11;
    %b = add.i32 [%0, i32 1] !3:13;
    %r = call.i32 [@printf, str "%d", %b] !4:3;
    ret [i32 0] !5:3;
}
}"#;

#[test]
fn ssa_and_memory_data_edges() {
    let (module, pdg) = build_pdg(STRAIGHT_LINE);
    assert_edge_symmetry(&pdg);

    let main = module.func_by_name("main").unwrap();
    let func = &module.funcs[main];
    let insts = &func.blocks[func.entry()].insts;
    let [_alloca, store, load, add, call]: [ir::Inst; 5] = insts.as_slice().try_into().unwrap();

    let node = |inst| pdg.get(NodeKey { func: main, kind: NodeKind::Inst(inst) }).unwrap();

    // The store reaches the load; the load feeds the add; the add feeds the
    // call.
    assert!(pdg.node_data(node(store)).data.contains(&node(load)));
    assert!(pdg.node_data(node(load)).data.contains(&node(add)));
    assert!(pdg.node_data(node(add)).data.contains(&node(call)));
    // Backward view.
    assert!(pdg.node_data(node(call)).rev_data.contains(&node(add)));
}

#[test]
fn branch_controls_its_arms() {
    let src = r#"
    module {
    fn @main(i32) -> i32 {
    bb0:
        %c = lt.i1 [arg0, i32 10];
        br %c, bb1, bb2;
    bb1:
        %y = add.i32 [i32 1, i32 0];
        br bb3;
    bb2:
        %z = add.i32 [i32 2, i32 0];
        br bb3;
    bb3:
        %p = phi.i32 [(bb1, %y), (bb2, %z)];
        ret %p;
    }
    }"#;
    let (module, pdg) = build_pdg(src);
    assert_edge_symmetry(&pdg);

    let main = module.func_by_name("main").unwrap();
    let func = &module.funcs[main];
    let bb0 = func.entry();
    let bb1 = ir::Block::from(1usize);
    let bb3 = ir::Block::from(3usize);

    let branch = pdg.get(NodeKey { func: main, kind: NodeKind::Term(bb0) }).unwrap();
    let y = pdg
        .get(NodeKey { func: main, kind: NodeKind::Inst(func.blocks[bb1].insts[0]) })
        .unwrap();
    let phi = pdg
        .get(NodeKey { func: main, kind: NodeKind::Inst(func.blocks[bb3].insts[0]) })
        .unwrap();

    // bb1 is control-dependent on the branch; bb3 post-dominates bb0 and is
    // not.
    assert!(pdg.node_data(branch).ctrl.contains(&y));
    assert!(pdg.node_data(y).rev_ctrl.contains(&branch));
    assert!(!pdg.node_data(branch).ctrl.contains(&phi));

    // The phi reads both arms.
    let y_key = pdg.node_data(phi).rev_data.contains(&y);
    assert!(y_key);
}

#[test]
fn noret_call_controls_later_instructions() {
    let src = r#"
    module {
    decl @exit(i32) -> void;
    fn @main() -> i32 {
    bb0:
        call [@exit, i32 1];
        %x = add.i32 [i32 1, i32 2];
        ret %x;
    }
    }"#;
    let (module, pdg) = build_pdg(src);
    assert_edge_symmetry(&pdg);

    let main = module.func_by_name("main").unwrap();
    let func = &module.funcs[main];
    let insts = &func.blocks[func.entry()].insts;
    let exit_call = pdg.get(NodeKey { func: main, kind: NodeKind::Inst(insts[0]) }).unwrap();
    let x = pdg.get(NodeKey { func: main, kind: NodeKind::Inst(insts[1]) }).unwrap();

    assert!(pdg.node_data(exit_call).ctrl.contains(&x));
}

#[test]
fn call_sites_wire_parameter_linkage() {
    let src = r#"
    module {
    fn @inc(i32) -> i32 {
    bb0:
        %r = add.i32 [arg0, i32 1];
        ret %r;
    }
    fn @main() -> i32 {
    bb0:
        %v = call.i32 [@inc, i32 41];
        ret %v;
    }
    }"#;
    let (module, pdg) = build_pdg(src);
    assert_edge_symmetry(&pdg);

    let main = module.func_by_name("main").unwrap();
    let inc = module.func_by_name("inc").unwrap();
    let func = &module.funcs[main];
    let call = pdg
        .get(NodeKey { func: main, kind: NodeKind::Inst(func.blocks[func.entry()].insts[0]) })
        .unwrap();

    let data = pdg.node_data(call);
    assert_eq!(data.subgraphs, vec![inc]);
    assert_eq!(data.params.len(), 1);
    let linkage = &data.params[0];
    assert_eq!(linkage.callee, inc);
    assert_eq!(linkage.formals.len(), 1);
    assert_eq!(linkage.rets.len(), 1);

    // call -> formal; ret -> call.
    assert!(data.data.contains(&linkage.formals[0]));
    assert!(data.rev_data.contains(&linkage.rets[0]));

    // Inside the callee the formal feeds the add.
    let inc_func = &module.funcs[inc];
    let add = pdg
        .get(NodeKey { func: inc, kind: NodeKind::Inst(inc_func.blocks[inc_func.entry()].insts[0]) })
        .unwrap();
    assert!(pdg.node_data(linkage.formals[0]).data.contains(&add));
}

#[test]
fn reaching_stores_kill_along_paths() {
    let src = r#"
    module {
    fn @main(i32) -> i32 {
    bb0:
        %a = alloca.i32;
        store [i32 1, %a];
        %c = lt.i1 [arg0, i32 0];
        br %c, bb1, bb2;
    bb1:
        store [i32 2, %a];
        br bb2;
    bb2:
        %v = load.i32 [%a];
        ret %v;
    }
    }"#;
    let module = Module::parse(src).unwrap();
    let reaching = ReachingStores::compute(&module);
    let main = module.func_by_name("main").unwrap();
    let func = &module.funcs[main];

    let store1 = func.blocks[ir::Block::from(0usize)].insts[1];
    let store2 = func.blocks[ir::Block::from(1usize)].insts[0];
    let load = func.blocks[ir::Block::from(2usize)].insts[0];

    // Both stores reach the merge point load.
    assert_eq!(reaching.reaching_defs(main, load), &[store1, store2]);
}

#[test]
fn sweep_isolation_is_symmetric() {
    let (module, mut pdg) = build_pdg(STRAIGHT_LINE);
    let main = module.func_by_name("main").unwrap();
    let func = &module.funcs[main];
    let add = func.blocks[func.entry()].insts[3];
    let node = pdg.get(NodeKey { func: main, kind: NodeKind::Inst(add) }).unwrap();

    pdg.isolate(node);
    assert!(pdg.node_data(node).is_isolated());
    assert!(pdg.node_data(node).dropped);
    assert_edge_symmetry(&pdg);
    for (_, data) in pdg.iter() {
        assert!(!data.data.contains(&node));
        assert!(!data.ctrl.contains(&node));
        assert!(!data.rev_data.contains(&node));
        assert!(!data.rev_ctrl.contains(&node));
    }
    // The overlay no longer lists the node.
    let overlay = pdg.block_nodes(main, func.entry()).unwrap();
    assert!(!overlay.contains(&node));
}

#[test]
fn interference_links_cross_procedure_accesses() {
    let src = r#"
    module {
    global @shared;
    fn @writer() -> void {
    bb0:
        store [i32 1, @shared];
        ret;
    }
    fn @reader() -> i32 {
    bb0:
        %v = load.i32 [@shared];
        ret %v;
    }
    }"#;
    let module = Module::parse(src).unwrap();
    let cg = CallGraph::lazy(&module, None, CallCompat::default());
    let icd = InterprocCd::compute(&module, &cg, &IcdConfig::default());
    let reaching = ReachingStores::compute(&module);
    let pdg = build(&PdgParams {
        module: &module,
        cg: &cg,
        icd: &icd,
        data_deps: &reaching,
        interference: true,
    });

    let writer = module.func_by_name("writer").unwrap();
    let reader = module.func_by_name("reader").unwrap();
    let store = module.funcs[writer].blocks[ir::Block::from(0usize)].insts[0];
    let load = module.funcs[reader].blocks[ir::Block::from(0usize)].insts[0];
    let store_node = pdg.get(NodeKey { func: writer, kind: NodeKind::Inst(store) }).unwrap();
    let load_node = pdg.get(NodeKey { func: reader, kind: NodeKind::Inst(load) }).unwrap();

    assert!(pdg.node_data(store_node).interf.contains(&load_node));
    assert!(pdg.node_data(load_node).interf.contains(&store_node));
}

struct NoDeps;

impl DataDeps for NoDeps {
    fn reaching_defs(&self, _func: ir::FuncId, _load: ir::Inst) -> &[ir::Inst] {
        &[]
    }
}

#[test]
fn custom_data_deps_provider_is_honoured() {
    let module = Module::parse(STRAIGHT_LINE).unwrap();
    let cg = CallGraph::lazy(&module, None, CallCompat::default());
    let icd = InterprocCd::compute(&module, &cg, &IcdConfig::default());
    let pdg = build(&PdgParams {
        module: &module,
        cg: &cg,
        icd: &icd,
        data_deps: &NoDeps,
        interference: false,
    });

    let main = module.func_by_name("main").unwrap();
    let func = &module.funcs[main];
    let insts = &func.blocks[func.entry()].insts;
    let store = pdg.get(NodeKey { func: main, kind: NodeKind::Inst(insts[1]) }).unwrap();
    let load = pdg.get(NodeKey { func: main, kind: NodeKind::Inst(insts[2]) }).unwrap();
    assert!(!pdg.node_data(store).data.contains(&load));
}
