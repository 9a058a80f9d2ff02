//! The slicing pipeline behind the `srcslice` binary.
//!
//! parse → remove unused → resolve criteria → [cutoff surgery] → call graph
//! → data-dependence baseline → inter-procedural CD → PDG → mark → sweep →
//! output (sliced IR, or source listing / line manifest).

use std::fs;
use std::io::{self, Write};
use std::time::Instant;

use anyhow::{Context, Result};
use callgraph::{CallCompat, CallGraph};
use camino::Utf8PathBuf;
use icd::{IcdConfig, InterprocCd};
use ir::Module;
use pdg::{PdgParams, ReachingStores};
use slicer::WalkDepth;

mod annotate;
pub mod cli_def;
pub mod cli_process;

pub use annotate::AnnotateKind;

pub const EXIT_OK: i32 = 0;
/// Configuration or parse error.
pub const EXIT_CONFIG: i32 = 1;
/// Analysis or verification error.
pub const EXIT_ANALYSIS: i32 = 2;

#[derive(Debug, Clone)]
pub struct Opts {
    pub input: Utf8PathBuf,
    pub criteria: String,
    pub secondary_criteria: Option<String>,
    pub criteria_are_next_instr: bool,
    pub entry: String,
    pub cutoff_diverging: bool,
    pub walk_depth: Option<u32>,
    pub walk_depth_interproc: Option<u32>,
    pub compat: CallCompat,
    pub threads: bool,
    pub verify: bool,
    pub statistics: bool,
    pub annotate: Vec<AnnotateKind>,
    pub output: Option<Utf8PathBuf>,
    pub line_numbers: bool,
    pub source_root: Option<Utf8PathBuf>,
}

impl Default for Opts {
    fn default() -> Opts {
        Opts {
            input: Utf8PathBuf::new(),
            criteria: String::new(),
            secondary_criteria: None,
            criteria_are_next_instr: false,
            entry: "main".to_owned(),
            cutoff_diverging: false,
            walk_depth: None,
            walk_depth_interproc: None,
            compat: CallCompat::default(),
            threads: false,
            verify: true,
            statistics: false,
            annotate: Vec::new(),
            output: None,
            line_numbers: false,
            source_root: None,
        }
    }
}

struct Stopwatch(Instant);

impl Stopwatch {
    fn start() -> Stopwatch {
        Stopwatch(Instant::now())
    }

    fn report(self, what: &str) {
        log::info!("{} took {:.1} ms", what, self.0.elapsed().as_secs_f64() * 1000.0);
    }
}

pub fn run(opts: &Opts) -> Result<i32> {
    run_with_output(opts, &mut io::stdout())
}

pub fn run_with_output(opts: &Opts, out: &mut dyn Write) -> Result<i32> {
    let src = match fs::read_to_string(&opts.input) {
        Ok(src) => src,
        Err(err) => {
            eprintln!("error: failed reading '{}': {}", opts.input, err);
            return Ok(EXIT_CONFIG);
        }
    };

    let module = match Module::parse(&src) {
        Ok(module) => module,
        Err(err) => {
            eprintln!("error: failed parsing '{}': {}", opts.input, err);
            return Ok(EXIT_CONFIG);
        }
    };

    let entry = match module.func_by_name(&opts.entry) {
        Some(entry) if !module.funcs[entry].is_declaration() => entry,
        _ => {
            eprintln!("error: the entry function not found: {}", opts.entry);
            return Ok(EXIT_CONFIG);
        }
    };

    if opts.statistics {
        eprintln!("Statistics before {}", module.statistics());
    }

    // Unreachable functions and unused globals only get in the way.
    let (mut module, entry) = ir::remove_unused(&module, entry);

    let mut specs = match slicer::parse_criteria(&opts.criteria) {
        Ok(specs) if !specs.is_empty() => specs,
        Ok(_) => {
            eprintln!("error: criteria has to be provided");
            return Ok(EXIT_CONFIG);
        }
        Err(err) => {
            eprintln!("error: {}", err);
            return Ok(EXIT_CONFIG);
        }
    };
    if let Some(secondary) = &opts.secondary_criteria {
        match slicer::parse_criteria(secondary) {
            Ok(more) => specs.extend(more),
            Err(err) => {
                eprintln!("error: {}", err);
                return Ok(EXIT_CONFIG);
            }
        }
    }

    let criteria = slicer::resolve_to_insts(&module, &specs, opts.criteria_are_next_instr);
    if criteria.is_empty() {
        eprintln!("error: no reachable slicing criterion: '{}'", opts.criteria);
        return Ok(EXIT_CONFIG);
    }

    let stubs = if opts.cutoff_diverging {
        let tm = Stopwatch::start();
        let stubs =
            match slicer::cutoff_diverging_branches(&mut module, entry, &criteria, opts.compat) {
                Ok(stubs) => stubs,
                Err(err) => {
                    eprintln!("error: {}", err);
                    return Ok(EXIT_ANALYSIS);
                }
            };
        tm.report("cutting off diverging branches");
        stubs
    } else {
        Vec::new()
    };

    let (mut pdg, marked) = {
        let tm = Stopwatch::start();
        let cg = CallGraph::lazy(&module, None, opts.compat);
        cg.build();
        tm.report("call graph construction");

        let tm = Stopwatch::start();
        let reaching = ReachingStores::compute(&module);
        tm.report("data dependence analysis");

        let tm = Stopwatch::start();
        let icd = InterprocCd::compute(&module, &cg, &IcdConfig::default());
        tm.report("control dependence analysis");

        let tm = Stopwatch::start();
        let pdg = pdg::build(&PdgParams {
            module: &module,
            cg: &cg,
            icd: &icd,
            data_deps: &reaching,
            interference: opts.threads,
        });
        tm.report("building the dependence graph");

        if !pdg.has_nodes_for(entry) {
            eprintln!("error: empty dependence graph for the entry function");
            return Ok(EXIT_ANALYSIS);
        }

        let nodes = slicer::resolve_to_nodes(&pdg, &criteria);
        if nodes.is_empty() {
            eprintln!("error: no reachable slicing criterion: '{}'", opts.criteria);
            return Ok(EXIT_CONFIG);
        }

        let depth = WalkDepth { intra: opts.walk_depth, inter: opts.walk_depth_interproc };
        let tm = Stopwatch::start();
        let mut marked = slicer::mark(&pdg, &nodes, depth, opts.threads);
        tm.report("marking the slice");

        // The cutoff stubs are hardening, not slack; keep them.
        for node in slicer::resolve_to_nodes(&pdg, &stubs) {
            marked.insert(node);
        }

        if !opts.annotate.is_empty() {
            let mut stderr = io::stderr().lock();
            annotate::annotate(&mut stderr, &module, &pdg, &cg, &marked, &opts.annotate)
                .context("writing annotations")?;
        }

        (pdg, marked)
    };

    let tm = Stopwatch::start();
    slicer::sweep(&mut pdg, &marked);
    slicer::apply_to_module(&mut module, &pdg, &marked);
    tm.report("slicing");

    match &opts.output {
        Some(path) => {
            let errors = module.verify();
            if !errors.is_empty() {
                for err in errors.iter() {
                    eprintln!("error: verification: {:?}", err);
                }
                if opts.verify {
                    return Ok(EXIT_ANALYSIS);
                }
            }
            fs::write(path, module.print()).with_context(|| format!("writing {}", path))?;
        }
        None => {
            let mut ctx = match &opts.source_root {
                Some(root) => src_recovery::SourceRecoveryContext::with_source_root(root.clone()),
                None => src_recovery::SourceRecoveryContext::new(),
            };
            ctx.collect_lines(&module);
            ctx.close_braces();
            if opts.line_numbers {
                ctx.render_manifest(out).context("writing the line manifest")?;
            } else {
                ctx.render_source(out).context("writing the source listing")?;
            }
        }
    }

    if opts.statistics {
        eprintln!("Statistics after {}", module.statistics());
    }

    Ok(EXIT_OK)
}
