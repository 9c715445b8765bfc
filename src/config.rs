use std::path::PathBuf;

use crate::{
    flight::FLIGHTS_SET,
    query::{DateRange, ROUTINE_FUNCTION, ROUTINE_PACKAGE, ROUTINE_PATH},
};

/// Default seed host of the store cluster.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default service port of the store cluster.
pub const DEFAULT_PORT: u16 = 3000;
/// Default namespace records are written to.
pub const DEFAULT_NAMESPACE: &str = "test";
/// Data file used when `--file` is given without a value.
pub const DEFAULT_DATA_FILE: &str = "data/flights_from.csv";

/// Connection settings shared by the loader and the query runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Seed host name or address.
    pub host: String,
    /// Service port.
    pub port: u16,
    /// Namespace holding the flight set.
    pub namespace: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl ClientConfig {
    /// Override the seed host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Override the service port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// `host:port` string handed to the client.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What the loader does with a line that cannot be parsed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MalformedLinePolicy {
    /// Stop the load at the first malformed line. Earlier writes remain.
    #[default]
    Abort,
    /// Log a warning, count the line as skipped, keep going.
    Skip,
}

/// Loader settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    /// Set the flight records are written to.
    pub set: String,
    /// Malformed line handling.
    pub policy: MalformedLinePolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            set: FLIGHTS_SET.to_string(),
            policy: MalformedLinePolicy::default(),
        }
    }
}

impl LoadOptions {
    /// Override the target set.
    #[must_use]
    pub fn with_set(mut self, set: impl Into<String>) -> Self {
        self.set = set.into();
        self
    }

    /// Override the malformed line policy.
    #[must_use]
    pub fn with_policy(mut self, policy: MalformedLinePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Query runner settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryOptions {
    /// Set the query runs over.
    pub set: String,
    /// Local source of the aggregation routine.
    pub routine_path: PathBuf,
    /// Routine package (module) name.
    pub package: String,
    /// Entry function inside the package.
    pub function: String,
    /// Inclusive flight date range.
    pub range: DateRange,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            set: FLIGHTS_SET.to_string(),
            routine_path: PathBuf::from(ROUTINE_PATH),
            package: ROUTINE_PACKAGE.to_string(),
            function: ROUTINE_FUNCTION.to_string(),
            range: DateRange::default(),
        }
    }
}

impl QueryOptions {
    /// Override the routine source path.
    #[must_use]
    pub fn with_routine_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.routine_path = path.into();
        self
    }

    /// Override the date range.
    #[must_use]
    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }
}
