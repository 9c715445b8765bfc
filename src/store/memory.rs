//! In-process [`Store`] implementation.
//!
//! Records live in per-set ordered maps. Range queries are only accepted when
//! a numeric index covers the filtered bin and the routine package has been
//! registered, the same preconditions the server enforces. Uploaded sources
//! are kept as bytes and never interpreted: aggregation functions are native
//! closures installed with [`MemoryStore::with_aggregator`].

use std::{
    collections::{BTreeMap, HashMap},
    fs, vec,
};

use parking_lot::Mutex;

use super::{
    AggregateCall, Bin, IndexSpec, IndexType, RecordKey, Routine, Statement, Store, StoreError,
    StoreTask, Value,
};
use crate::observability::log_debug;

type Aggregator = Box<dyn Fn(&[StoredRecord]) -> Vec<Value> + Send + Sync>;

/// Cursor over materialized aggregation output.
pub type MemoryCursor = vec::IntoIter<Result<Value, StoreError>>;

/// Record as held by [`MemoryStore`].
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRecord {
    /// User key.
    pub key: String,
    /// Bins by name.
    pub bins: BTreeMap<String, Value>,
}

impl StoredRecord {
    /// Bin value by name.
    pub fn bin(&self, name: &str) -> Option<&Value> {
        self.bins.get(name)
    }
}

/// Store call observed by [`MemoryStore`], in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// `create_index` with the index name.
    CreateIndex(String),
    /// `put` with the written key.
    Put(RecordKey),
    /// `register_routine` with the routine name.
    RegisterRoutine(String),
    /// `query_aggregate` with the invoked function.
    QueryAggregate(AggregateCall),
}

/// Task that is already complete when handed out.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompletedTask;

impl StoreTask for CompletedTask {
    fn wait_till_complete(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Default)]
struct Inner {
    sets: BTreeMap<(String, String), BTreeMap<String, StoredRecord>>,
    indexes: BTreeMap<(String, String), IndexSpec>,
    routines: BTreeMap<String, Vec<u8>>,
    operations: Vec<Operation>,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    aggregators: HashMap<(String, String), Aggregator>,
}

impl MemoryStore {
    /// Empty store without aggregation functions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the native function run for `package.function` queries.
    #[must_use]
    pub fn with_aggregator<F>(
        mut self,
        package: impl Into<String>,
        function: impl Into<String>,
        aggregator: F,
    ) -> Self
    where
        F: Fn(&[StoredRecord]) -> Vec<Value> + Send + Sync + 'static,
    {
        self.aggregators
            .insert((package.into(), function.into()), Box::new(aggregator));
        self
    }

    /// Record stored under `namespace`/`set`/`key`.
    pub fn record(&self, namespace: &str, set: &str, key: &str) -> Option<StoredRecord> {
        let inner = self.inner.lock();
        inner
            .sets
            .get(&(namespace.to_string(), set.to_string()))
            .and_then(|records| records.get(key))
            .cloned()
    }

    /// Number of records in `namespace`/`set`.
    pub fn len(&self, namespace: &str, set: &str) -> usize {
        let inner = self.inner.lock();
        inner
            .sets
            .get(&(namespace.to_string(), set.to_string()))
            .map_or(0, BTreeMap::len)
    }

    /// Whether `namespace` has an index called `index_name`.
    pub fn has_index(&self, namespace: &str, index_name: &str) -> bool {
        self.inner
            .lock()
            .indexes
            .contains_key(&(namespace.to_string(), index_name.to_string()))
    }

    /// Source bytes of a registered routine.
    pub fn routine_source(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.lock().routines.get(name).cloned()
    }

    /// Every call received so far.
    pub fn operations(&self) -> Vec<Operation> {
        self.inner.lock().operations.clone()
    }
}

impl Store for MemoryStore {
    type Task = CompletedTask;
    type Cursor = MemoryCursor;

    fn create_index(&self, spec: &IndexSpec) -> Result<Self::Task, StoreError> {
        let mut inner = self.inner.lock();
        inner
            .operations
            .push(Operation::CreateIndex(spec.index_name.clone()));
        let slot = (spec.namespace.clone(), spec.index_name.clone());
        if inner.indexes.contains_key(&slot) {
            return Err(StoreError::IndexExists {
                index: spec.index_name.clone(),
            });
        }
        inner.indexes.insert(slot, spec.clone());
        log_debug!(
            component = "store",
            event = "index_created",
            namespace = %spec.namespace,
            index = %spec.index_name,
        );
        Ok(CompletedTask)
    }

    fn put(&self, key: &RecordKey, bins: &[Bin]) -> Result<(), StoreError> {
        if key.user_key.is_empty() {
            return Err(StoreError::Write {
                key: key.to_string(),
                message: "empty user key".to_string(),
            });
        }
        let mut inner = self.inner.lock();
        inner.operations.push(Operation::Put(key.clone()));
        let record = StoredRecord {
            key: key.user_key.clone(),
            bins: bins
                .iter()
                .map(|bin| (bin.name.to_string(), bin.value.clone()))
                .collect(),
        };
        inner
            .sets
            .entry((key.namespace.clone(), key.set.clone()))
            .or_default()
            .insert(key.user_key.clone(), record);
        Ok(())
    }

    fn register_routine(&self, routine: &Routine) -> Result<Self::Task, StoreError> {
        let source = fs::read(&routine.path).map_err(|err| StoreError::Register {
            routine: routine.name.clone(),
            message: err.to_string(),
        })?;
        let mut inner = self.inner.lock();
        inner
            .operations
            .push(Operation::RegisterRoutine(routine.name.clone()));
        inner.routines.insert(routine.name.clone(), source);
        Ok(CompletedTask)
    }

    fn query_aggregate(
        &self,
        statement: &Statement,
        call: &AggregateCall,
    ) -> Result<Option<Self::Cursor>, StoreError> {
        let candidates = {
            let mut inner = self.inner.lock();
            inner
                .operations
                .push(Operation::QueryAggregate(call.clone()));

            if let Some(filter) = &statement.filter {
                let indexed = inner.indexes.values().any(|spec| {
                    spec.namespace == statement.namespace
                        && spec.set == statement.set
                        && spec.bin == filter.bin
                        && spec.index_type == IndexType::Numeric
                });
                if !indexed {
                    return Err(StoreError::Query {
                        message: format!("no numeric index on bin `{}`", filter.bin),
                    });
                }
            }

            let registered = inner
                .routines
                .keys()
                .any(|name| Routine::lua(name).package() == call.package);
            if !registered {
                return Err(StoreError::Query {
                    message: format!("routine package `{}` is not registered", call.package),
                });
            }

            inner
                .sets
                .get(&(statement.namespace.clone(), statement.set.clone()))
                .map(|records| {
                    records
                        .values()
                        .filter(|record| match &statement.filter {
                            Some(filter) => record
                                .bin(&filter.bin)
                                .is_some_and(|value| filter.matches(value)),
                            None => true,
                        })
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };

        let aggregator = self
            .aggregators
            .get(&(call.package.clone(), call.function.clone()))
            .ok_or_else(|| StoreError::Query {
                message: format!("function `{call}` is not available"),
            })?;

        log_debug!(
            component = "store",
            event = "aggregate_candidates",
            function = %call,
            candidates = candidates.len(),
        );
        let results: Vec<_> = aggregator(&candidates).into_iter().map(Ok).collect();
        Ok(Some(results.into_iter()))
    }
}
