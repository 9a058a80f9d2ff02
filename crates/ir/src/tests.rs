use expect_test::expect;

use crate::{Module, Op, Ty};

#[test]
fn parse_and_print() {
    let src = r#"
    module {
    global @counter;
    decl @printf(str, ...) -> i32;
    decl @exit(i32) -> void noreturn;
    fn @main() -> i32 file "simple.c" line 3 {
    bb0:
        %a = alloca.i32 !4:7;
        store [i32 1, %a] !4:11;
        %0 = load.i32 [%a] !5:11;
        %b = add.i32 [%0, i32 1] !5:7;
        %r = call.i32 [@printf, str "%d\n", %b] !6:3;
        br %b, bb1, bb2 !6:3;
    bb1:
        store [%b, @counter] !7:5;
        br bb2;
    bb2:
        ret [i32 0] !9:1;
    }
    }"#;

    let module = Module::parse(src).unwrap();
    let printed = module.print();
    expect![[r#"
        module {
        global @counter;
        decl @printf(str, ...) -> i32;
        decl @exit(i32) -> void noreturn;
        fn @main() -> i32 file "simple.c" line 3 {
        bb0:
            %a = alloca.i32 !4:7;
            store [i32 1, %a] !4:11;
            %0 = load.i32 [%a] !5:11;
            %b = add.i32 [%0, i32 1] !5:7;
            %r = call.i32 [@printf, str "%d\n", %b] !6:3;
            br %b, bb1, bb2 !6:3;
        bb1:
            store [%b, @counter] !7:5;
            br bb2;
        bb2:
            ret [i32 0] !9:1;
        }
        }"#]]
    .assert_eq(&printed);

    // The printed form parses back to the same text.
    let reparsed = Module::parse(&printed).unwrap();
    assert_eq!(reparsed.print(), printed);
}

#[test]
fn forward_references_resolve() {
    let src = r#"
    module {
    fn @loop(i32) -> i32 {
    bb0:
        br bb1;
    bb1:
        %i = phi.i32 [(bb0, i32 0), (bb2, %next)];
        %c = lt.i1 [%i, arg0];
        br %c, bb2, bb3;
    bb2:
        %next = add.i32 [%i, i32 1];
        br bb1;
    bb3:
        ret %i;
    }
    }"#;

    let module = Module::parse(src).unwrap();
    let func = &module.funcs[module.func_by_name("loop").unwrap()];
    let phi = func.blocks[crate::Block::from(1usize)].insts[0];
    assert!(matches!(func.insts[phi].op, Op::Phi(_)));
    assert_eq!(func.insts[phi].ty, Ty::I32);
    assert!(module.verify().is_empty());
}

#[test]
fn undefined_value_is_a_parse_error() {
    let src = r#"
    module {
    fn @f() -> void {
    bb0:
        %x = add.i32 [%missing, i32 1];
        ret;
    }
    }"#;
    let err = Module::parse(src).unwrap_err();
    assert!(err.contains("undefined value %missing"), "{err}");
}

#[test]
fn verify_reports_read_before_write() {
    let src = r#"
    module {
    fn @f() -> i32 {
    bb0:
        br bb1;
    bb1:
        %x = add.i32 [%y, i32 1];
        %y = add.i32 [i32 1, i32 2];
        ret %x;
    }
    }"#;
    let module = Module::parse(src).unwrap();
    let errors = module.verify();
    expect![[r#"
        [
            fn0/bb1: inst1 was read before write!,
        ]
    "#]]
    .assert_debug_eq(&errors);
}

#[test]
fn statistics_skip_declarations_and_noops() {
    let src = r#"
    module {
    global @g;
    decl @ext() -> void;
    fn @main() -> void {
    bb0:
        %a = alloca.i32;
        store [i32 1, %a];
        ret;
    }
    }"#;
    let mut module = Module::parse(src).unwrap();
    let stats = module.statistics();
    assert_eq!(stats.to_string(), "Globals/Functions/Blocks/Instr.: 1 1 1 2");

    let main = module.func_by_name("main").unwrap();
    let func = &mut module.funcs[main];
    let first = func.blocks[func.entry()].insts[0];
    func.insts[first] = crate::InstData::noop();
    assert_eq!(module.statistics().instructions, 1);
}

#[test]
fn remove_unused_keeps_the_reachable_world() {
    let src = r#"
    module {
    global @used;
    global @unused;
    decl @ext(i32) -> void;
    fn @orphan() -> void {
    bb0:
        ret;
    }
    fn @helper() -> void {
    bb0:
        store [i32 1, @used];
        ret;
    }
    fn @main() -> void {
    bb0:
        call [@helper];
        call [@ext, i32 0];
        ret;
    }
    }"#;
    let module = Module::parse(src).unwrap();
    let entry = module.func_by_name("main").unwrap();
    let (res, new_entry) = crate::remove_unused(&module, entry);

    assert!(res.func_by_name("orphan").is_none());
    assert!(res.global_by_name("unused").is_none());
    assert!(res.func_by_name("helper").is_some());
    assert!(res.func_by_name("ext").is_some());
    assert_eq!(res.func_by_name("main"), Some(new_entry));
    assert!(res.verify().is_empty());
}
