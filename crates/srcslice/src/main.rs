use std::process::exit;

use srcslice::cli_def::main_command;
use srcslice::cli_process::matches_to_opts;
use srcslice::EXIT_CONFIG;

pub fn main() {
    let matches = main_command().get_matches();

    let env = env_logger::Env::default().filter("SRCSLICE_LOG").write_style("SRCSLICE_LOG_STYLE");
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(log::LevelFilter::Warn)
        .parse_env(env)
        .init();

    let code = match matches_to_opts(&matches).and_then(|opts| srcslice::run(&opts)) {
        Ok(code) => code,
        Err(err) => {
            for cause in err.chain() {
                eprintln!("error: {cause}");
            }
            EXIT_CONFIG
        }
    };
    exit(code)
}
