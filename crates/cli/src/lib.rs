//! The `fieldsearch` command line tool.

mod commands;
mod util;

use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use tracing_subscriber::EnvFilter;
use util::CliResult;

#[derive(Parser, Debug)]
#[command(name = "fieldsearch", version, about = "Run field search programs against a site description")]
struct Cli {
    #[arg(
        long = "log-level",
        value_name = "FILTER",
        global = true,
        help = "Tracing filter such as `debug` or `fieldsearch_engine=trace`. Overrides RUST_LOG."
    )]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a program and run it against a site.
    Run(commands::run::RunArgs),
    /// Assemble a program and print its disassembly.
    Check(commands::check::CheckArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let output = match &cli.command {
        Command::Run(args) => commands::run::run(args)?,
        Command::Check(args) => commands::check::run(args)?,
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    Ok(())
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
