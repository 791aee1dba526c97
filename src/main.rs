//! versiondb - command-line interface to the versioned entity store.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use versiondb::db::{Database, DatabaseConfig};

mod cli;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "versiondb=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: cli::Cli) -> anyhow::Result<()> {
    let config = DatabaseConfig::new(&cli.database);
    let db = Database::open_with_config(config)
        .with_context(|| format!("cannot open database {}", cli.database.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = cli::commands::run_command(&db, cli.command, cli.format, &mut out);
    db.close()?;
    result
}
