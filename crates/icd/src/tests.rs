use callgraph::{CallCompat, CallGraph};
use ir::{Block, LocationKind, Module};

use crate::{IcdConfig, InterprocCd};

fn compute(src: &str) -> (Module, Vec<(String, Vec<String>)>) {
    let module = Module::parse(src).unwrap();
    let cg = CallGraph::lazy(&module, None, CallCompat::default());
    let icd = InterprocCd::compute(&module, &cg, &IcdConfig::default());

    let mut summary = Vec::new();
    for (func, data) in module.defined_funcs() {
        let info = icd.func_info(func).unwrap();
        assert!(info.has_cd);
        let mut norets: Vec<String> =
            info.noret.iter().map(|point| format!("{:?}", point)).collect();
        norets.sort();
        summary.push((data.name.to_string(), norets));
    }
    (module, summary)
}

#[test]
fn exit_call_is_a_noret_point() {
    let (_, summary) = compute(
        r#"
        module {
        decl @exit(i32) -> void;
        fn @main() -> i32 {
        bb0:
            call [@exit, i32 1];
            ret [i32 0];
        }
        }"#,
    );
    assert_eq!(summary, vec![("main".to_string(), vec!["bb0/inst0".to_string()])]);
}

#[test]
fn noret_propagates_through_calls() {
    // void bad() { exit(1); }  void f() { bad(); g(); }  void g() {}
    let (_, summary) = compute(
        r#"
        module {
        decl @exit(i32) -> void;
        fn @bad() -> void {
        bb0:
            call [@exit, i32 1];
            ret;
        }
        fn @f() -> void {
        bb0:
            call [@bad];
            call [@g];
            ret;
        }
        fn @g() -> void {
        bb0:
            ret;
        }
        }"#,
    );
    assert_eq!(
        summary,
        vec![
            ("bad".to_string(), vec!["bb0/inst0".to_string()]),
            ("f".to_string(), vec!["bb0/inst0".to_string()]),
            ("g".to_string(), vec![]),
        ]
    );
}

#[test]
fn recursion_is_conservatively_noret() {
    let (_, summary) = compute(
        r#"
        module {
        fn @even(i32) -> i32 {
        bb0:
            %r = call.i32 [@odd, arg0];
            ret %r;
        }
        fn @odd(i32) -> i32 {
        bb0:
            %r = call.i32 [@even, arg0];
            ret %r;
        }
        }"#,
    );
    // One of the two call sites closes the cycle; once it does, the other
    // sees a callee with a non-empty noret set.
    assert_eq!(
        summary,
        vec![
            ("even".to_string(), vec!["bb0/inst0".to_string()]),
            ("odd".to_string(), vec!["bb0/inst0".to_string()]),
        ]
    );
}

#[test]
fn dead_end_terminator_is_noret() {
    let (_, summary) = compute(
        r#"
        module {
        fn @trap() -> void {
        bb0:
            unreachable;
        }
        }"#,
    );
    assert_eq!(summary, vec![("trap".to_string(), vec!["bb0/term".to_string()])]);
}

#[test]
fn block_cd_flows_to_reachable_blocks() {
    let src = r#"
        module {
        decl @abort() -> void;
        fn @main() -> i32 {
        bb0:
            %c = lt.i1 [i32 1, i32 2];
            br %c, bb1, bb2;
        bb1:
            call [@abort];
            br bb3;
        bb2:
            br bb3;
        bb3:
            ret [i32 0];
        }
        }"#;
    let module = Module::parse(src).unwrap();
    let cg = CallGraph::lazy(&module, None, CallCompat::default());
    let icd = InterprocCd::compute(&module, &cg, &IcdConfig::default());

    let main = module.func_by_name("main").unwrap();
    let info = icd.func_info(main).unwrap();

    let bb1 = Block::from(1usize);
    let bb3 = Block::from(3usize);
    // The abort call dominates bb3 through the bb1 edge.
    let cd3 = info.block_cd.get(&bb3).unwrap();
    assert_eq!(cd3.len(), 1);
    let point = *cd3.iter().next().unwrap();
    assert_eq!(point.block, bb1);
    assert!(matches!(point.kind, LocationKind::Inst(_)));
    // Nothing flows into the entry.
    assert!(info.block_cd.get(&Block::from(0usize)).is_none());
    assert_eq!(info.block_norets.get(&bb1).unwrap().len(), 1);
}

#[test]
fn instr_cd_covers_only_later_instructions() {
    let src = r#"
        module {
        decl @abort() -> void;
        fn @main() -> i32 {
        bb0:
            %a = add.i32 [i32 1, i32 2];
            call [@abort];
            %b = add.i32 [%a, i32 3];
            ret %b;
        }
        }"#;
    let module = Module::parse(src).unwrap();
    let cg = CallGraph::lazy(&module, None, CallCompat::default());
    let icd = InterprocCd::compute(&module, &cg, &IcdConfig::default());

    let main = module.func_by_name("main").unwrap();
    let func = &module.funcs[main];
    let info = icd.func_info(main).unwrap();
    let bb0 = Block::from(0usize);
    let [a, call, b]: [ir::Inst; 3] = func.blocks[bb0].insts.as_slice().try_into().unwrap();

    assert!(info.instr_cd(func, bb0, a).is_empty());
    assert!(info.instr_cd(func, bb0, call).is_empty());
    let cd_b = info.instr_cd(func, bb0, b);
    assert_eq!(cd_b.len(), 1);
    assert_eq!(cd_b[0].kind, LocationKind::Inst(call));
}
