use ir::Module;
use smallvec::SmallVec;

use crate::{CallCompat, CallGraph, PointsTo, PointsToEntry, PtTarget};

fn funptr_module() -> Module {
    // void h(void) { ... }  void other(int) { ... }
    // int main() { void (*fp)(void) = &h; fp(); }
    Module::parse(
        r#"
        module {
        fn @h() -> void {
        bb0:
            ret;
        }
        fn @other(i32) -> void {
        bb0:
            ret;
        }
        fn @main() -> i32 {
        bb0:
            %fp = alloca.ptr;
            store [@h, %fp];
            %f = load.ptr [%fp];
            call [%f];
            ret [i32 0];
        }
        }"#,
    )
    .unwrap()
}

#[test]
fn lazy_falls_back_to_address_taken() {
    let m = funptr_module();
    let cg = CallGraph::lazy(&m, None, CallCompat::default());
    let main = m.func_by_name("main").unwrap();
    let h = m.func_by_name("h").unwrap();

    // `h` escapes through the store, `other` does not.
    assert_eq!(cg.address_taken(), &[h]);

    cg.build();
    assert_eq!(cg.callees(main), vec![h]);
    assert_eq!(cg.callers(h), vec![main]);
    assert!(cg.calls(main, h));
    assert!(!cg.calls(h, main));
}

#[test]
fn loose_compat_tolerates_extra_args_strict_does_not() {
    let m = Module::parse(
        r#"
        module {
        fn @callee(i32) -> i32 {
        bb0:
            ret [i32 0];
        }
        fn @main() -> void {
        bb0:
            %fp = alloca.ptr;
            store [@callee, %fp];
            %f = load.ptr [%fp];
            %r = call.i32 [%f, i32 1, i32 2];
            ret;
        }
        }"#,
    )
    .unwrap();
    let main = m.func_by_name("main").unwrap();
    let callee = m.func_by_name("callee").unwrap();

    let loose = CallGraph::lazy(&m, None, CallCompat::Loose);
    loose.build();
    assert_eq!(loose.callees(main), vec![callee]);

    let strict = CallGraph::lazy(&m, None, CallCompat::Strict);
    strict.build();
    assert_eq!(strict.callees(main), Vec::<ir::FuncId>::new());
}

#[test]
fn direct_call_target_is_not_address_taken() {
    let m = Module::parse(
        r#"
        module {
        fn @callee() -> void {
        bb0:
            ret;
        }
        fn @main() -> void {
        bb0:
            call [@callee];
            ret;
        }
        }"#,
    )
    .unwrap();
    let cg = CallGraph::lazy(&m, None, CallCompat::default());
    assert!(cg.address_taken().is_empty());
}

struct StubPta {
    targets: Vec<(ir::FuncId, ir::FuncId)>,
}

impl PointsTo for StubPta {
    fn points_to(
        &self,
        _module: &Module,
        func: ir::FuncId,
        value: &ir::Operand,
    ) -> SmallVec<[PointsToEntry; 4]> {
        if matches!(value, ir::Operand::Value(_)) {
            self.targets
                .iter()
                .filter(|(caller, _)| *caller == func)
                .map(|&(_, target)| PointsToEntry { target: PtTarget::Func(target), offset: None })
                .collect()
        } else {
            SmallVec::new()
        }
    }
}

#[test]
fn eager_reaches_only_from_entry() {
    let m = funptr_module();
    let main = m.func_by_name("main").unwrap();
    let h = m.func_by_name("h").unwrap();
    let pta = StubPta { targets: vec![(main, h)] };

    let cg = CallGraph::eager(&m, main, &pta, CallCompat::default());
    assert_eq!(cg.procedures(), vec![h, main]);
    assert!(cg.calls(main, h));
}

#[test]
fn imported_graph_mirrors_edges() {
    let m = funptr_module();
    let main = m.func_by_name("main").unwrap();
    let h = m.func_by_name("h").unwrap();
    let external = crate::ExternalCallGraph { edges: vec![(main, h)] };
    let cg = CallGraph::imported(&m, &external);
    assert!(cg.calls(main, h));
    assert_eq!(cg.callers(h), vec![main]);
    assert_eq!(cg.callees(main), vec![h]);
}
