use anyhow::Result;
use camino::Utf8PathBuf;
use clap::ArgMatches;

use crate::cli_def;
use crate::{AnnotateKind, Opts};

pub fn matches_to_opts(matches: &ArgMatches) -> Result<Opts> {
    let input: &String = matches.get_one(cli_def::INPUT).expect("input is required");
    let criteria: &String = matches.get_one(cli_def::CRITERIA).expect("criteria is required");

    let annotate = matches
        .get_many::<String>(cli_def::ANNOTATE)
        .unwrap_or_default()
        .map(|raw| raw.parse::<AnnotateKind>().map_err(anyhow::Error::msg))
        .collect::<Result<Vec<_>>>()?;

    let compat = matches
        .get_one::<String>(cli_def::CALL_COMPAT)
        .expect("has a default")
        .parse()
        .map_err(anyhow::Error::msg)?;

    Ok(Opts {
        input: Utf8PathBuf::from(input),
        criteria: criteria.clone(),
        secondary_criteria: matches.get_one::<String>(cli_def::SECONDARY_CRITERIA).cloned(),
        criteria_are_next_instr: matches.get_flag(cli_def::CRITERIA_ARE_NEXT_INSTR),
        entry: matches.get_one::<String>(cli_def::ENTRY).expect("has a default").clone(),
        cutoff_diverging: matches.get_flag(cli_def::CUTOFF_DIVERGING),
        walk_depth: matches.get_one::<u32>(cli_def::WALK_DEPTH).copied(),
        walk_depth_interproc: matches.get_one::<u32>(cli_def::WALK_DEPTH_INTERPROC).copied(),
        compat,
        threads: matches.get_flag(cli_def::THREADS),
        verify: !matches.get_flag(cli_def::NO_VERIFY),
        statistics: matches.get_flag(cli_def::STATISTICS),
        annotate,
        output: matches.get_one::<String>(cli_def::OUTPUT).map(Utf8PathBuf::from),
        line_numbers: matches.get_flag(cli_def::LINENUM),
        source_root: matches.get_one::<String>(cli_def::SOURCE_ROOT).map(Utf8PathBuf::from),
    })
}
