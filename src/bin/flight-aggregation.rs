//! Flight loader / late-flight aggregation CLI.
//!
//! `--file` loads a CSV into the store; without it the aggregation query
//! runs. Log verbosity follows `RUST_LOG` (default `info`).

use std::process::ExitCode;

use clap::{error::ErrorKind, Parser};
use flight_aggregation::{
    cli::{self, Cli, Outcome},
    store::aerospike::AerospikeStore,
    AppError,
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.print()?;
            return Ok(ExitCode::SUCCESS);
        }
        Err(err) => {
            err.print()?;
            return Ok(ExitCode::from(AppError::from(err).class().exit_code()));
        }
    };

    match cli::run(&cli, AerospikeStore::connect) {
        Ok(Outcome::Usage(text)) => {
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(err) => Ok(ExitCode::from(err.class().exit_code())),
    }
}
