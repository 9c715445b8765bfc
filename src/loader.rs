//! CSV ingestion.
//!
//! The loader makes sure the flight date index exists, then streams the input
//! file one line at a time, writing each parsed [`FlightRecord`] before the
//! next line is read. Nothing is rolled back: records written before a failure
//! stay in the store.

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{
    config::{ClientConfig, LoadOptions, MalformedLinePolicy},
    flight::{FlightRecord, ParseError, FL_DATE_BIN, FL_DATE_INDEX},
    observability::{log_debug, log_info, log_warn},
    store::{IndexOutcome, IndexSpec, IndexType, RecordKey, Store, StoreError, StoreTask},
};

/// Errors that stop a load.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The input path does not exist. No store call was made.
    ///
    /// Reported as an input error (exit code 3) rather than a clean exit.
    #[error("failed to upload {}: file does not exist", .path.display())]
    MissingFile {
        /// Requested path.
        path: PathBuf,
    },
    /// The input exists but could not be opened.
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        /// Requested path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Reading a line failed.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Requested path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },
    /// A line could not be parsed under [`MalformedLinePolicy::Abort`].
    #[error("malformed line {line} in {}: {source}", .path.display())]
    Malformed {
        /// Requested path.
        path: PathBuf,
        /// 1-based line number.
        line: u64,
        /// Parse failure.
        #[source]
        source: ParseError,
    },
    /// The store rejected the index or a write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counters for a finished load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Whether this run built the date index.
    pub index: Option<IndexOutcome>,
    /// Records written.
    pub written: u64,
    /// Malformed lines skipped under [`MalformedLinePolicy::Skip`].
    pub skipped: u64,
}

/// Writes flight records from a CSV file into a [`Store`].
pub struct Loader<S> {
    store: S,
    config: ClientConfig,
    options: LoadOptions,
}

impl<S: Store> Loader<S> {
    /// Loader with default [`LoadOptions`].
    pub fn new(store: S, config: ClientConfig) -> Self {
        Self {
            store,
            config,
            options: LoadOptions::default(),
        }
    }

    /// Replace the options.
    #[must_use]
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Index declaration for the flight date bin.
    pub fn index_spec(&self) -> IndexSpec {
        IndexSpec {
            namespace: self.config.namespace.clone(),
            set: self.options.set.clone(),
            index_name: FL_DATE_INDEX.to_string(),
            bin: FL_DATE_BIN.to_string(),
            index_type: IndexType::Numeric,
        }
    }

    /// Create the flight date index and wait for it. An existing index is
    /// not an error.
    pub fn ensure_index(&self) -> Result<IndexOutcome, StoreError> {
        let spec = self.index_spec();
        let outcome = match self.store.create_index(&spec) {
            Ok(task) => {
                task.wait_till_complete()?;
                IndexOutcome::Created
            }
            Err(StoreError::IndexExists { .. }) => IndexOutcome::AlreadyExists,
            Err(err) => return Err(err),
        };
        log_info!(
            component = "loader",
            event = "index_ready",
            namespace = %spec.namespace,
            set = %spec.set,
            index = %spec.index_name,
            outcome = ?outcome,
        );
        Ok(outcome)
    }

    /// Load every line of `path`.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadSummary, LoadError> {
        let path = path.as_ref();
        let summary = self.load_inner(path)?;
        log_info!(
            component = "loader",
            event = "upload_complete",
            file = %path.display(),
            written = summary.written,
            skipped = summary.skipped,
            "successfully uploaded {}",
            path.display(),
        );
        Ok(summary)
    }

    fn load_inner(&self, path: &Path) -> Result<LoadSummary, LoadError> {
        if !path.exists() {
            return Err(LoadError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut summary = LoadSummary {
            index: Some(self.ensure_index()?),
            ..LoadSummary::default()
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        for row in reader.records() {
            let row = row.map_err(|source| LoadError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let line = row.position().map_or(0, |pos| pos.line());

            let flight = match FlightRecord::from_fields(row.iter()) {
                Ok(flight) => flight,
                Err(source) => match self.options.policy {
                    MalformedLinePolicy::Abort => {
                        return Err(LoadError::Malformed {
                            path: path.to_path_buf(),
                            line,
                            source,
                        });
                    }
                    MalformedLinePolicy::Skip => {
                        log_warn!(
                            component = "loader",
                            event = "line_skipped",
                            line,
                            error = %source,
                        );
                        summary.skipped += 1;
                        continue;
                    }
                },
            };

            self.write(&flight)?;
            summary.written += 1;
        }

        Ok(summary)
    }

    fn write(&self, flight: &FlightRecord) -> Result<(), StoreError> {
        let key = RecordKey::new(
            self.config.namespace.as_str(),
            self.options.set.as_str(),
            flight.id.as_str(),
        );
        self.store.put(&key, &flight.bins())?;
        log_debug!(
            component = "loader",
            event = "flight_written",
            id = %flight.id,
            fl_date = flight.fl_date,
            carrier = %flight.carrier,
            fl_num = flight.fl_num,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::store::{MemoryStore, Operation};

    fn csv(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        for line in lines {
            writeln!(file, "{line}").expect("write line");
        }
        file
    }

    fn line(id: &str, date: &str) -> String {
        format!(
            "{id},2012,5,{date},19805,AA,1,12478,JFK,New York,NY,LAX,Los Angeles,CA,\
             912,1230,378,341,2475"
        )
    }

    #[test]
    fn ensure_index_is_idempotent() {
        let store = MemoryStore::new();
        let loader = Loader::new(&store, ClientConfig::default());
        assert_eq!(loader.ensure_index().expect("first"), IndexOutcome::Created);
        assert_eq!(
            loader.ensure_index().expect("second"),
            IndexOutcome::AlreadyExists
        );
    }

    #[test]
    fn malformed_line_aborts_by_default() {
        let good = line("1", "2012/01/05");
        let file = csv(&[&good, "2,2012,bad", &line("3", "2012/01/06")]);
        let store = MemoryStore::new();
        let err = Loader::new(&store, ClientConfig::default())
            .load(file.path())
            .unwrap_err();
        assert!(matches!(err, LoadError::Malformed { line: 2, .. }), "{err}");
        assert_eq!(store.len("test", "flights"), 1);
    }

    #[test]
    fn malformed_line_skipped_when_configured() {
        let file = csv(&[
            &line("1", "2012/01/05"),
            &line("2", "01-06-2012"),
            &line("3", "2012/01/06"),
        ]);
        let store = MemoryStore::new();
        let summary = Loader::new(&store, ClientConfig::default())
            .with_options(LoadOptions::default().with_policy(MalformedLinePolicy::Skip))
            .load(file.path())
            .expect("load");
        assert_eq!(summary.written, 2);
        assert_eq!(summary.skipped, 1);
        assert!(store.record("test", "flights", "2").is_none());
    }

    #[test]
    fn index_precedes_writes() {
        let file = csv(&[&line("7", "2012/02/01")]);
        let store = MemoryStore::new();
        Loader::new(&store, ClientConfig::default().with_namespace("bar"))
            .load(file.path())
            .expect("load");
        assert_eq!(
            store.operations(),
            vec![
                Operation::CreateIndex("FL_DATE".into()),
                Operation::Put(RecordKey::new("bar", "flights", "7")),
            ]
        );
    }
}
