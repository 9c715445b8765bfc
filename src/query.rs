//! Late-flight aggregation runner.
//!
//! The runner never computes anything itself: it uploads the routine, builds
//! a range query over the flight date, and logs whatever the server-side
//! function streams back.

use std::path::PathBuf;

use thiserror::Error;

use crate::{
    config::{ClientConfig, QueryOptions},
    flight::FL_DATE_BIN,
    observability::{log_debug, log_info},
    store::{AggregateCall, Filter, Routine, Statement, Store, StoreError, StoreTask, Value},
};

/// Local source of the aggregation routine.
pub const ROUTINE_PATH: &str = "udf/simple_aggregation.lua";
/// Package the routine registers as.
pub const ROUTINE_PACKAGE: &str = "simple_aggregation";
/// Entry function computing late flights per airline.
pub const ROUTINE_FUNCTION: &str = "late_flights_by_airline";
/// Logged before the first and after the last aggregation result.
pub const RESULTS_HEADER: &str = "Airlines with late flights:";

/// Inclusive range of encoded flight dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    /// First included date.
    pub from: i64,
    /// Last included date.
    pub to: i64,
}

impl DateRange {
    /// `from..=to`.
    pub const fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// January 2012, the demonstrated window.
    pub const fn january_2012() -> Self {
        Self::new(20120101, 20120131)
    }

    /// Index-backed filter over the flight date bin.
    pub fn filter(&self) -> Filter {
        Filter::range(FL_DATE_BIN, self.from, self.to)
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::january_2012()
    }
}

/// What the aggregation produced.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutcome {
    /// Items streamed by the routine, in cursor order.
    Results(Vec<Value>),
    /// No cursor, or a cursor without items.
    NothingReturned,
}

/// Errors that stop a query run.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The routine source is not on disk. No store call was made.
    #[error("aggregation routine {} does not exist", .path.display())]
    RoutineNotFound {
        /// Expected path.
        path: PathBuf,
    },
    /// Registration, the query, or the cursor failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Uploads the routine and runs the date-range aggregation.
pub struct QueryRunner<S> {
    store: S,
    config: ClientConfig,
    options: QueryOptions,
}

impl<S: Store> QueryRunner<S> {
    /// Runner with default [`QueryOptions`].
    pub fn new(store: S, config: ClientConfig) -> Self {
        Self {
            store,
            config,
            options: QueryOptions::default(),
        }
    }

    /// Replace the options.
    #[must_use]
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Routine uploaded before the query.
    pub fn routine(&self) -> Routine {
        Routine::lua(&self.options.routine_path)
    }

    /// Range query over the flight set.
    pub fn statement(&self) -> Statement {
        Statement::new(self.config.namespace.as_str(), self.options.set.as_str())
            .with_filter(self.options.range.filter())
    }

    /// Function applied to the query candidates.
    pub fn aggregate_call(&self) -> AggregateCall {
        AggregateCall::new(self.options.package.as_str(), self.options.function.as_str())
    }

    /// Upload the routine and wait for the store to accept it.
    pub fn register_routine(&self) -> Result<Routine, QueryError> {
        let routine = self.routine();
        if !routine.path.exists() {
            return Err(QueryError::RoutineNotFound {
                path: routine.path.clone(),
            });
        }
        self.store.register_routine(&routine)?.wait_till_complete()?;
        log_info!(
            component = "query",
            event = "routine_registered",
            routine = %routine.name,
            "registered routine",
        );
        Ok(routine)
    }

    /// Register, query, and drain the cursor.
    pub fn run(&self) -> Result<QueryOutcome, QueryError> {
        self.register_routine()?;

        let statement = self.statement();
        let call = self.aggregate_call();
        log_debug!(
            component = "query",
            event = "query_built",
            namespace = %statement.namespace,
            set = %statement.set,
            from = self.options.range.from,
            to = self.options.range.to,
            "built query",
        );

        let cursor = self.store.query_aggregate(&statement, &call)?;
        log_info!(
            component = "query",
            event = "aggregation_executed",
            function = %call,
            "executed aggregation",
        );

        let Some(cursor) = cursor else {
            log_info!(component = "query", event = "nothing_returned", "nothing returned");
            return Ok(QueryOutcome::NothingReturned);
        };

        let mut items = Vec::new();
        for item in cursor {
            let item = item?;
            if items.is_empty() {
                log_info!(component = "query", event = "results_begin", "{}", RESULTS_HEADER);
            }
            log_info!(component = "query", event = "result", "{}", item);
            for line in airline_lines(&item) {
                log_info!(component = "query", event = "airline", "{}", line);
            }
            items.push(item);
        }

        if items.is_empty() {
            log_info!(component = "query", event = "nothing_returned", "nothing returned");
            Ok(QueryOutcome::NothingReturned)
        } else {
            log_info!(
                component = "query",
                event = "results_end",
                count = items.len(),
                "{}",
                RESULTS_HEADER,
            );
            Ok(QueryOutcome::Results(items))
        }
    }
}

/// Render an airline -> `{flights, late}` map as `"<airline>: <flights> <late>"`
/// rows. Any other shape renders nothing.
pub fn airline_lines(value: &Value) -> Vec<String> {
    let Some(airlines) = value.as_map() else {
        return Vec::new();
    };
    let counters: Option<Vec<_>> = airlines
        .iter()
        .map(|(airline, stats)| {
            let stats = stats.as_map()?;
            let flights = stats.get("flights")?.as_int()?;
            let late = stats.get("late")?.as_int()?;
            Some(format!("{airline}: {flights:6} {late:6}"))
        })
        .collect();
    counters.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, io::Write, iter};

    use tempfile::TempDir;

    use super::*;
    use crate::store::{Bin, IndexSpec, MemoryStore, Operation, RecordKey};

    struct Counters(&'static str, i64, i64);

    fn summary(rows: &[Counters]) -> Value {
        Value::Map(
            rows.iter()
                .map(|Counters(airline, flights, late)| {
                    let mut stats = BTreeMap::new();
                    stats.insert("flights".to_string(), Value::Int(*flights));
                    stats.insert("late".to_string(), Value::Int(*late));
                    (airline.to_string(), Value::Map(stats))
                })
                .collect(),
        )
    }

    fn routine_dir() -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("simple_aggregation.lua");
        let mut file = std::fs::File::create(&path).expect("create routine");
        file.write_all(b"-- server side").expect("write routine");
        (dir, path)
    }

    /// Store that accepts everything and never hands back a cursor.
    struct NoCursor;

    impl Store for NoCursor {
        type Task = crate::store::memory::CompletedTask;
        type Cursor = iter::Empty<Result<Value, StoreError>>;

        fn create_index(&self, _: &IndexSpec) -> Result<Self::Task, StoreError> {
            Ok(Default::default())
        }

        fn put(&self, _: &RecordKey, _: &[Bin]) -> Result<(), StoreError> {
            Ok(())
        }

        fn register_routine(&self, _: &Routine) -> Result<Self::Task, StoreError> {
            Ok(Default::default())
        }

        fn query_aggregate(
            &self,
            _: &Statement,
            _: &AggregateCall,
        ) -> Result<Option<Self::Cursor>, StoreError> {
            Ok(None)
        }
    }

    #[test]
    fn date_range_bounds_are_inclusive() {
        let filter = DateRange::default().filter();
        assert!(filter.matches(&Value::Int(20120101)));
        assert!(filter.matches(&Value::Int(20120131)));
        assert!(!filter.matches(&Value::Int(20120201)));
        assert_eq!(filter, Filter::range("FL_DATE", 20120101, 20120131));
    }

    #[test]
    fn statement_targets_flight_set() {
        let runner = QueryRunner::new(MemoryStore::new(), ClientConfig::default());
        let statement = runner.statement();
        assert_eq!(statement.namespace, "test");
        assert_eq!(statement.set, "flights");
        assert_eq!(
            statement.filter,
            Some(Filter::range("FL_DATE", 20120101, 20120131))
        );
        assert_eq!(
            runner.aggregate_call(),
            AggregateCall::new("simple_aggregation", "late_flights_by_airline")
        );
    }

    #[test]
    fn missing_routine_makes_no_store_call() {
        let store = MemoryStore::new();
        let runner = QueryRunner::new(&store, ClientConfig::default()).with_options(
            QueryOptions::default().with_routine_path("nowhere/simple_aggregation.lua"),
        );
        let err = runner.run().unwrap_err();
        assert!(matches!(err, QueryError::RoutineNotFound { .. }));
        assert!(store.operations().is_empty());
    }

    #[test]
    fn absent_cursor_is_nothing_returned() {
        let (_dir, path) = routine_dir();
        let runner = QueryRunner::new(NoCursor, ClientConfig::default())
            .with_options(QueryOptions::default().with_routine_path(path));
        assert_eq!(runner.run().expect("run"), QueryOutcome::NothingReturned);
    }

    #[test]
    fn results_are_collected_in_order() {
        let (_dir, path) = routine_dir();
        let store = MemoryStore::new().with_aggregator(
            ROUTINE_PACKAGE,
            ROUTINE_FUNCTION,
            |records| vec![Value::Int(records.len() as i64), Value::Str("done".into())],
        );
        store
            .create_index(&IndexSpec {
                namespace: "test".into(),
                set: "flights".into(),
                index_name: "FL_DATE".into(),
                bin: "FL_DATE".into(),
                index_type: crate::store::IndexType::Numeric,
            })
            .expect("index");
        store
            .put(
                &RecordKey::new("test", "flights", "1"),
                &[Bin::new("FL_DATE", 20120110)],
            )
            .expect("put");

        let outcome = QueryRunner::new(&store, ClientConfig::default())
            .with_options(QueryOptions::default().with_routine_path(path))
            .run()
            .expect("run");
        assert_eq!(
            outcome,
            QueryOutcome::Results(vec![Value::Int(1), Value::Str("done".into())])
        );
        assert_eq!(
            store.operations().last(),
            Some(&Operation::QueryAggregate(AggregateCall::new(
                ROUTINE_PACKAGE,
                ROUTINE_FUNCTION
            )))
        );
    }

    #[test]
    fn airline_rows_use_fixed_width_counters() {
        let value = summary(&[Counters("AA", 120, 7), Counters("DL", 4, 0)]);
        assert_eq!(
            airline_lines(&value),
            vec!["AA:    120      7".to_string(), "DL:      4      0".to_string()]
        );
        assert!(airline_lines(&Value::Int(3)).is_empty());
        assert!(airline_lines(&summary(&[])).is_empty());
    }
}
