//! tally-cli: replay reward-ledger scenarios.
//!
//! A scenario is a TOML file describing a ledger configuration, initial
//! balances, and a timestamped list of operations. `run` replays it against
//! an in-memory ledger and prints the resulting state; `check` only parses
//! and validates it.

mod report;
mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::scenario::Scenario;

/// Tally scenario runner.
#[derive(Parser, Debug)]
#[command(name = "tally-cli", version, about = "Replay Tally reward-ledger scenarios")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a scenario and print the final ledger state.
    Run(RunArgs),
    /// Parse and validate a scenario without running it.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the scenario file.
    scenario: PathBuf,

    /// Abort on the first failing step instead of recording it.
    #[arg(long)]
    strict: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Path to the scenario file.
    scenario: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Check(args) => check(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    scenario.validate()?;
    info!(path = %args.scenario.display(), steps = scenario.steps.len(), "replaying scenario");

    let report = scenario.replay(args.strict)?;
    if args.json {
        let out = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{out}");
    } else {
        print!("{report}");
    }
    Ok(())
}

fn check(args: CheckArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    scenario.validate()?;
    println!(
        "{}: ok ({} balances, {} steps)",
        args.scenario.display(),
        scenario.balances.len(),
        scenario.steps.len()
    );
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `RUST_LOG` takes precedence over `level_str` when set.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
