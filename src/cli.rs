//! Command-line surface.
//!
//! `-h` selects the host, so clap's short help flag is disabled and only
//! `--help` remains. Passing `--file` selects loader mode; otherwise the
//! aggregation query runs.

use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, Parser};

use crate::{
    config::{
        ClientConfig, LoadOptions, MalformedLinePolicy, DEFAULT_DATA_FILE, DEFAULT_HOST,
        DEFAULT_NAMESPACE, DEFAULT_PORT,
    },
    error::AppError,
    loader::{LoadSummary, Loader},
    observability::{log_debug, log_error},
    query::{QueryOutcome, QueryRunner},
    store::{Store, StoreError},
};

/// Parsed command line.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "flight-aggregation",
    version,
    about = "Load flight records or run the late-flight aggregation",
    after_help = "Query mode uploads the aggregation routine from \
                  udf/simple_aggregation.lua relative to the working directory. \
                  The routine is not bundled; place it there before querying.",
    disable_help_flag = true
)]
pub struct Cli {
    /// Server hostname.
    #[arg(short = 'h', long, default_value = DEFAULT_HOST)]
    pub host: String,
    /// Server port.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Namespace.
    #[arg(short, long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,
    /// Data file to load (default: data/flights_from.csv). Without it the
    /// aggregation query runs.
    #[arg(
        short,
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_DATA_FILE
    )]
    pub file: Option<PathBuf>,
    /// Print usage.
    #[arg(short, long)]
    pub usage: bool,
    /// Skip malformed lines instead of aborting the load.
    #[arg(short, long)]
    pub skip_malformed: bool,
    /// Print help.
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
    /// Positional arguments; any of them turns off `--usage`.
    #[arg(hide = true)]
    pub args: Vec<String>,
}

/// What a run will do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Print usage and exit.
    Usage,
    /// Load the given file.
    Load(PathBuf),
    /// Run the aggregation query.
    Query,
}

/// Result of a successful run.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Usage text to print.
    Usage(String),
    /// Loader finished.
    Loaded(LoadSummary),
    /// Query finished.
    Queried(QueryOutcome),
}

impl Cli {
    /// Mode selected by the flags.
    pub fn mode(&self) -> Mode {
        if self.usage && self.args.is_empty() {
            Mode::Usage
        } else if let Some(file) = &self.file {
            Mode::Load(file.clone())
        } else {
            Mode::Query
        }
    }

    /// Connection settings.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_host(self.host.as_str())
            .with_port(self.port)
            .with_namespace(self.namespace.as_str())
    }

    /// Loader settings.
    pub fn load_options(&self) -> LoadOptions {
        let policy = if self.skip_malformed {
            MalformedLinePolicy::Skip
        } else {
            MalformedLinePolicy::Abort
        };
        LoadOptions::default().with_policy(policy)
    }

    /// Rendered help text.
    pub fn usage_text() -> String {
        Cli::command().render_help().to_string()
    }
}

/// Execute the selected mode. `connect` builds the store client and is not
/// called for [`Mode::Usage`]. Failures are logged here once.
pub fn run<S, F>(cli: &Cli, connect: F) -> Result<Outcome, AppError>
where
    S: Store,
    F: FnOnce(&ClientConfig) -> Result<S, StoreError>,
{
    let result = dispatch(cli, connect);
    if let Err(err) = &result {
        log_error!(
            component = "cli",
            event = "run_failed",
            class = ?err.class(),
            error = %err,
        );
    }
    result
}

fn dispatch<S, F>(cli: &Cli, connect: F) -> Result<Outcome, AppError>
where
    S: Store,
    F: FnOnce(&ClientConfig) -> Result<S, StoreError>,
{
    match cli.mode() {
        Mode::Usage => Ok(Outcome::Usage(Cli::usage_text())),
        Mode::Load(path) => {
            let (store, config) = open(cli, connect)?;
            log_debug!(component = "cli", event = "data_file", file = %path.display());
            let summary = Loader::new(store, config)
                .with_options(cli.load_options())
                .load(path)?;
            Ok(Outcome::Loaded(summary))
        }
        Mode::Query => {
            let (store, config) = open(cli, connect)?;
            Ok(Outcome::Queried(QueryRunner::new(store, config).run()?))
        }
    }
}

fn open<S, F>(cli: &Cli, connect: F) -> Result<(S, ClientConfig), StoreError>
where
    F: FnOnce(&ClientConfig) -> Result<S, StoreError>,
{
    let config = cli.client_config();
    log_debug!(
        component = "cli",
        event = "resolved_config",
        host = %config.host,
        port = config.port,
        namespace = %config.namespace,
    );
    let store = connect(&config)?;
    Ok((store, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("flight-aggregation").chain(args.iter().copied()))
            .expect("parse")
    }

    #[test]
    fn defaults_select_query_mode() {
        let cli = parse(&[]);
        assert_eq!(cli.client_config(), ClientConfig::default());
        assert_eq!(cli.mode(), Mode::Query);
        assert_eq!(cli.load_options().policy, MalformedLinePolicy::Abort);
    }

    #[test]
    fn short_flags() {
        let cli = parse(&["-h", "10.0.0.5", "-p", "3100", "-n", "bar", "-f", "in.csv", "-s"]);
        assert_eq!(cli.client_config().address(), "10.0.0.5:3100");
        assert_eq!(cli.namespace, "bar");
        assert_eq!(cli.mode(), Mode::Load(PathBuf::from("in.csv")));
        assert_eq!(cli.load_options().policy, MalformedLinePolicy::Skip);
    }

    #[test]
    fn bare_file_flag_uses_default_data_file() {
        let cli = parse(&["--file"]);
        assert_eq!(cli.mode(), Mode::Load(PathBuf::from("data/flights_from.csv")));
    }

    #[test]
    fn usage_only_without_positionals() {
        assert_eq!(parse(&["-u"]).mode(), Mode::Usage);
        assert_eq!(parse(&["-u", "extra"]).mode(), Mode::Query);
        assert!(Cli::usage_text().contains("--namespace"));
    }

    #[test]
    fn help_names_routine_location() {
        assert!(Cli::usage_text().contains(crate::query::ROUTINE_PATH));
    }

    #[test]
    fn bad_port_is_a_parse_error() {
        let err = Cli::try_parse_from(["flight-aggregation", "-p", "not-a-port"]).unwrap_err();
        assert_eq!(AppError::from(err).class(), crate::ErrorClass::Usage);
    }
}
