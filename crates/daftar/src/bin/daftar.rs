//! daftar: reconstruct a retrospective sales ledger from an import catalog,
//! a B2B roster, a holiday calendar, and declared quarterly totals.

#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use daftar::cmd;
use std::process::ExitCode;
use tracing::Level;

/// Retrospective sales-ledger reconstruction.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show verbose output including per-quarter progress
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output (just use exit code)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the invoice ledger and write CSV reports
    Generate(cmd::generate::Args),
    /// Re-run generation and validate the resulting ledger
    Validate(cmd::validate_cmd::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let result = match cli.command {
        Command::Generate(args) => cmd::generate::run(&args),
        Command::Validate(args) => cmd::validate_cmd::run(&args),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
