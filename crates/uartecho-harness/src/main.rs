use clap::Parser;
use std::process::ExitCode;

use uartecho_harness::{run, Cli, EXIT_RUNTIME_ERROR};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("uart-fuzz: {e:#}");
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}
