use clap::{Arg, ArgAction, Command, ValueHint};

const ABOUT: &str = "Slices a program at the source level: given its IR with \
debug metadata and one or more slicing criteria, reports the source lines \
that influence the criteria (or emits the sliced IR).";

pub fn main_command() -> Command {
    Command::new("srcslice")
        .version(env!("CARGO_PKG_VERSION"))
        .about(ABOUT)
        .args([
            criteria(),
            secondary_criteria(),
            criteria_are_next_instr(),
            entry(),
            cutoff_diverging_branches(),
            walk_depth(),
            walk_depth_interproc(),
            call_compat(),
            threads(),
            verify(),
            no_verify(),
            statistics(),
            annotate(),
            output(),
            linenum(),
            source_root(),
            input(),
        ])
        .arg_required_else_help(true)
}

pub const CRITERIA: &str = "criteria";
pub const SECONDARY_CRITERIA: &str = "secondary-criteria";
pub const CRITERIA_ARE_NEXT_INSTR: &str = "criteria-are-next-instr";
pub const ENTRY: &str = "entry";
pub const CUTOFF_DIVERGING: &str = "cutoff-diverging-branches";
pub const WALK_DEPTH: &str = "walk-depth";
pub const WALK_DEPTH_INTERPROC: &str = "walk-depth-interproc";
pub const CALL_COMPAT: &str = "call-compat";
pub const THREADS: &str = "threads";
pub const VERIFY: &str = "verify";
pub const NO_VERIFY: &str = "no-verify";
pub const STATISTICS: &str = "statistics";
pub const ANNOTATE: &str = "annotate";
pub const OUTPUT: &str = "output";
pub const LINENUM: &str = "linenum";
pub const SOURCE_ROOT: &str = "source-root";
pub const INPUT: &str = "input";

fn flag(name: &'static str) -> Arg {
    Arg::new(name).long(name).action(ArgAction::SetTrue)
}

fn criteria() -> Arg {
    Arg::new(CRITERIA)
        .long(CRITERIA)
        .short('c')
        .help("Slicing criteria.")
        .long_help(
            "Slicing criteria, comma-separated.\n\n\
             file#line#col   a source position\n\
             func:line[:col] a source position scoped to a procedure\n\
             symbol          every call site of the named marker procedure",
        )
        .value_name("SPEC")
        .required(true)
        .value_hint(ValueHint::Other)
}

fn secondary_criteria() -> Arg {
    Arg::new(SECONDARY_CRITERIA)
        .long(SECONDARY_CRITERIA)
        .help("Additional criteria, same grammar as --criteria.")
        .value_name("SPEC")
        .required(false)
        .value_hint(ValueHint::Other)
}

fn criteria_are_next_instr() -> Arg {
    flag(CRITERIA_ARE_NEXT_INSTR).help(
        "Slice from the instruction after each marker call, not the call itself.",
    )
}

fn entry() -> Arg {
    Arg::new(ENTRY)
        .long(ENTRY)
        .help("Entry procedure.")
        .value_name("NAME")
        .default_value("main")
        .required(false)
        .value_hint(ValueHint::Other)
}

fn cutoff_diverging_branches() -> Arg {
    flag(CUTOFF_DIVERGING).help(
        "Before slicing, make blocks that cannot reach any criterion diverge (exit(0) stubs).",
    )
}

fn walk_depth() -> Arg {
    Arg::new(WALK_DEPTH)
        .long(WALK_DEPTH)
        .help("Max depth of intra-procedural walks on the dependence graph.")
        .value_name("N")
        .value_parser(clap::value_parser!(u32))
        .required(false)
}

fn walk_depth_interproc() -> Arg {
    Arg::new(WALK_DEPTH_INTERPROC)
        .long(WALK_DEPTH_INTERPROC)
        .help("Max depth of inter-procedural walks on the dependence graph.")
        .value_name("N")
        .value_parser(clap::value_parser!(u32))
        .required(false)
}

fn call_compat() -> Arg {
    Arg::new(CALL_COMPAT)
        .long(CALL_COMPAT)
        .help("Signature matching policy for indirect calls.")
        .value_parser(["strict", "loose", "matching-args"])
        .default_value("loose")
        .value_name("POLICY")
        .required(false)
}

fn threads() -> Arg {
    flag(THREADS).help("Model loose read/write conflicts between procedures (interference edges).")
}

fn verify() -> Arg {
    flag(VERIFY).help("Verify the sliced module (default).").conflicts_with(NO_VERIFY)
}

fn no_verify() -> Arg {
    flag(NO_VERIFY).help("Do not verify the sliced module.")
}

fn statistics() -> Arg {
    flag(STATISTICS).help("Print statistics about slicing.")
}

fn annotate() -> Arg {
    Arg::new(ANNOTATE)
        .long(ANNOTATE)
        .help("Write an annotated IR listing to stderr.")
        .long_help(
            "Write an annotated IR listing to stderr.\n\npossible values\n\n\
             dd     - data-dependence edges\n\
             cd     - control-dependence edges\n\
             pta    - resolved callees of each call\n\
             memacc - resolved place of each load/store\n\
             slice  - mark in-slice instructions",
        )
        .value_name("KIND")
        .value_delimiter(',')
        .action(ArgAction::Append)
        .value_parser(["dd", "cd", "pta", "memacc", "slice"])
        .hide_possible_values(true)
        .required(false)
}

fn output() -> Arg {
    Arg::new(OUTPUT)
        .long(OUTPUT)
        .short('o')
        .help("Write the sliced IR to this file instead of recovering source lines.")
        .value_name("FILE")
        .required(false)
        .value_hint(ValueHint::FilePath)
}

fn linenum() -> Arg {
    flag(LINENUM)
        .help("Print a comma-separated line manifest per file instead of the source text.")
}

fn source_root() -> Arg {
    Arg::new(SOURCE_ROOT)
        .long(SOURCE_ROOT)
        .help("Directory against which relative source paths are resolved.")
        .value_name("DIR")
        .required(false)
        .value_hint(ValueHint::DirPath)
}

fn input() -> Arg {
    Arg::new(INPUT)
        .help("The whole-program IR file.")
        .value_name("FILE")
        .required(true)
        .value_hint(ValueHint::FilePath)
}
