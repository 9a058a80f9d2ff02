//! Can a function be the target of a given call site?

use ir::{Function, InstData};

/// Signature matching policy for resolving indirect calls.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CallCompat {
    /// Argument counts must match exactly (the fixed portion for variadics);
    /// the return type must losslessly bit-cast to the call-site type.
    Strict,
    /// Tolerate patterns that usually work in practice: a call site may pass
    /// more arguments than the callee takes, and integers and pointers
    /// substitute for each other in return and argument positions.
    #[default]
    Loose,
    /// Check only the overlapping argument positions; ignore counts and the
    /// return type.
    MatchingArgs,
}

impl std::str::FromStr for CallCompat {
    type Err = String;

    fn from_str(s: &str) -> Result<CallCompat, String> {
        match s {
            "strict" => Ok(CallCompat::Strict),
            "loose" => Ok(CallCompat::Loose),
            "matching-args" => Ok(CallCompat::MatchingArgs),
            _ => Err(format!("unknown call compatibility policy {:?}", s)),
        }
    }
}

/// Whether `callee` is call-compatible with the call instruction `call`
/// (located in `caller`) under `policy`.
pub fn call_is_compatible(
    caller: &Function,
    call: &InstData,
    callee: &Function,
    policy: CallCompat,
) -> bool {
    debug_assert!(call.is_call());
    let args = call.call_args();
    let params = &callee.sig.params;

    if policy != CallCompat::MatchingArgs {
        if callee.sig.variadic {
            if params.len() > args.len() {
                return false;
            }
        } else if params.len() != args.len() {
            // Too few arguments never works; extra arguments are tolerated
            // by the loose policy only.
            if policy == CallCompat::Strict || params.len() > args.len() {
                return false;
            }
        }

        let ret = callee.sig.ret;
        if !ret.lossless_bitcast_to(call.ty) {
            let escape = policy == CallCompat::Loose
                && ret.is_pointer_or_integer()
                && call.ty.is_pointer_or_integer();
            if !escape {
                return false;
            }
        }
    }

    for (arg, &param) in args.iter().zip(params) {
        let arg_ty = caller.operand_ty(arg);
        if arg_ty.lossless_bitcast_to(param) {
            continue;
        }
        if policy != CallCompat::Strict
            && arg_ty.is_pointer_or_integer()
            && param.is_pointer_or_integer()
        {
            continue;
        }
        return false;
    }

    true
}
