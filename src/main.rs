use clap::Parser;
use std::process;

use size_diff::cli::{Cli, Commands};
use size_diff::cmd;
use size_diff::error::ErrorFormatter;

fn main() {
    // Initialize logger (use RUST_LOG env var to control verbosity)
    env_logger::init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Run(args) => cmd::cmd_run(args),
        Commands::Init { force } => cmd::cmd_init(*force).map(|_| 0),
        Commands::Completions { shell } => {
            cmd::cmd_completions(*shell);
            Ok(0)
        }
    };

    match result {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{}", ErrorFormatter::format(&e));
            process::exit(ErrorFormatter::exit_code(&e));
        }
    }
}
