//! srm - safe rm
//!
//! Main entry point for the srm command-line interface. Removed paths are
//! archived into the backup store and can be brought back with `--restore`.

mod cli;
mod commands;
mod output;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("srm {}", srm_backup::VERSION);
        return ExitCode::SUCCESS;
    }

    init_tracing(cli.verbose, cli.quiet);

    match commands::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose > 0 {
        match verbose {
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    } else {
        // Stay silent on success like rm; RUST_LOG still wins when set
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
