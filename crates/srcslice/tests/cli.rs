use callgraph::CallCompat;
use srcslice::cli_def::main_command;
use srcslice::cli_process::matches_to_opts;
use srcslice::AnnotateKind;

#[test]
fn parses_the_full_flag_set() {
    let matches = main_command()
        .try_get_matches_from([
            "srcslice",
            "-c",
            "printf,main:4:7",
            "--secondary-criteria",
            "file.c#9#1",
            "--criteria-are-next-instr",
            "--entry",
            "start",
            "--cutoff-diverging-branches",
            "--walk-depth",
            "15",
            "--walk-depth-interproc",
            "1",
            "--call-compat",
            "strict",
            "--threads",
            "--no-verify",
            "--statistics",
            "--annotate",
            "dd,cd",
            "--annotate",
            "slice",
            "-o",
            "out.sir",
            "--linenum",
            "--source-root",
            ".",
            "prog.sir",
        ])
        .unwrap();
    let opts = matches_to_opts(&matches).unwrap();

    assert_eq!(opts.criteria, "printf,main:4:7");
    assert_eq!(opts.secondary_criteria.as_deref(), Some("file.c#9#1"));
    assert!(opts.criteria_are_next_instr);
    assert_eq!(opts.entry, "start");
    assert!(opts.cutoff_diverging);
    assert_eq!(opts.walk_depth, Some(15));
    assert_eq!(opts.walk_depth_interproc, Some(1));
    assert_eq!(opts.compat, CallCompat::Strict);
    assert!(opts.threads);
    assert!(!opts.verify);
    assert!(opts.statistics);
    assert_eq!(
        opts.annotate,
        vec![AnnotateKind::Dd, AnnotateKind::Cd, AnnotateKind::Slice]
    );
    assert_eq!(opts.output.as_deref().map(|p| p.as_str()), Some("out.sir"));
    assert!(opts.line_numbers);
    assert_eq!(opts.input.as_str(), "prog.sir");
}

#[test]
fn sensible_defaults() {
    let matches =
        main_command().try_get_matches_from(["srcslice", "-c", "printf", "prog.sir"]).unwrap();
    let opts = matches_to_opts(&matches).unwrap();

    assert_eq!(opts.entry, "main");
    assert_eq!(opts.compat, CallCompat::Loose);
    assert!(opts.verify);
    assert!(!opts.cutoff_diverging);
    // Walk depths default to unbounded.
    assert_eq!(opts.walk_depth, None);
    assert_eq!(opts.walk_depth_interproc, None);
}

#[test]
fn criteria_are_required() {
    assert!(main_command().try_get_matches_from(["srcslice", "prog.sir"]).is_err());
}

#[test]
fn verify_flags_conflict() {
    let res =
        main_command().try_get_matches_from(["srcslice", "-c", "x", "--verify", "--no-verify", "p"]);
    assert!(res.is_err());
}

#[test]
fn unknown_annotation_kinds_are_rejected() {
    let res = main_command()
        .try_get_matches_from(["srcslice", "-c", "x", "--annotate", "bogus", "p.sir"]);
    assert!(res.is_err());
}
