//! Narrow client surface over the external key-value store.
//!
//! The loader and the query runner only ever talk to a [`Store`]. The trait
//! mirrors the handful of calls the pipelines need: secondary index creation,
//! keyed writes, routine registration, and range-filtered aggregate queries.
//! Long-running server operations hand back a [`StoreTask`] the caller blocks
//! on.

#[cfg(feature = "aerospike")]
pub mod aerospike;
pub mod memory;

use std::{
    collections::BTreeMap,
    fmt,
    ops::RangeInclusive,
    path::{Path, PathBuf},
};

use thiserror::Error;

pub use self::memory::{MemoryStore, Operation, StoredRecord};

/// Value model shared by record bins and aggregation results.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Absent value.
    Nil,
    /// Signed integer.
    Int(i64),
    /// UTF-8 string.
    Str(String),
    /// Ordered list.
    List(Vec<Value>),
    /// String-keyed map.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Map payload, if any.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Named value written as part of a record.
#[derive(Clone, Debug, PartialEq)]
pub struct Bin {
    /// Bin name. The store caps names at 14 bytes.
    pub name: &'static str,
    /// Bin payload.
    pub value: Value,
}

impl Bin {
    /// Create a bin.
    pub fn new(name: &'static str, value: impl Into<Value>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Fully qualified primary key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Namespace.
    pub namespace: String,
    /// Set within the namespace.
    pub set: String,
    /// User key.
    pub user_key: String,
}

impl RecordKey {
    /// Create a key.
    pub fn new(
        namespace: impl Into<String>,
        set: impl Into<String>,
        user_key: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.into(),
            user_key: user_key.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.set, self.user_key)
    }
}

/// Secondary index value type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexType {
    /// Integer bins, range queryable.
    Numeric,
}

/// Secondary index declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSpec {
    /// Namespace.
    pub namespace: String,
    /// Set the index covers.
    pub set: String,
    /// Index name, unique per namespace.
    pub index_name: String,
    /// Indexed bin.
    pub bin: String,
    /// Bin value type.
    pub index_type: IndexType,
}

/// Result of ensuring an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The index was built by this call.
    Created,
    /// The store already had it.
    AlreadyExists,
}

/// Language of an uploaded routine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutineLanguage {
    /// Lua source.
    Lua,
}

/// Server-side routine uploaded from a local file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Routine {
    /// Local source path.
    pub path: PathBuf,
    /// Name the server stores it under (the file name).
    pub name: String,
    /// Source language.
    pub language: RoutineLanguage,
}

impl Routine {
    /// Lua routine registered under its file name.
    pub fn lua(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            language: RoutineLanguage::Lua,
        }
    }

    /// Module name the routine's functions are invoked through.
    pub fn package(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map_or(self.name.as_str(), |(stem, _)| stem)
    }
}

/// Inclusive integer range predicate over one bin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    /// Filtered bin; must carry a numeric index.
    pub bin: String,
    /// Inclusive bounds.
    pub range: RangeInclusive<i64>,
}

impl Filter {
    /// `begin <= bin <= end`.
    pub fn range(bin: impl Into<String>, begin: i64, end: i64) -> Self {
        Self {
            bin: bin.into(),
            range: begin..=end,
        }
    }

    /// Whether `value` satisfies the predicate. Non-integers never match.
    pub fn matches(&self, value: &Value) -> bool {
        value.as_int().is_some_and(|v| self.range.contains(&v))
    }
}

/// Query over one set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    /// Namespace.
    pub namespace: String,
    /// Set.
    pub set: String,
    /// Optional index-backed filter.
    pub filter: Option<Filter>,
}

impl Statement {
    /// Unfiltered statement.
    pub fn new(namespace: impl Into<String>, set: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.into(),
            filter: None,
        }
    }

    /// Attach the filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Registered routine function applied to a query's candidates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregateCall {
    /// Routine package (file name without extension).
    pub package: String,
    /// Entry function.
    pub function: String,
}

impl AggregateCall {
    /// Create a call.
    pub fn new(package: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            function: function.into(),
        }
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.package, self.function)
    }
}

/// Errors reported by a store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Cluster unreachable or handshake refused.
    #[error("failed to connect to {address}: {message}")]
    Connect {
        /// `host:port` that was dialed.
        address: String,
        /// Store message.
        message: String,
    },
    /// The index name is already taken.
    #[error("index `{index}` already exists")]
    IndexExists {
        /// Index name.
        index: String,
    },
    /// Index creation or its completion wait failed.
    #[error("index `{index}` failed: {message}")]
    Index {
        /// Index name.
        index: String,
        /// Store message.
        message: String,
    },
    /// A record write failed.
    #[error("write of `{key}` failed: {message}")]
    Write {
        /// Key being written.
        key: String,
        /// Store message.
        message: String,
    },
    /// Routine upload or its completion wait failed.
    #[error("routine `{routine}` registration failed: {message}")]
    Register {
        /// Routine name.
        routine: String,
        /// Store message.
        message: String,
    },
    /// The query was rejected.
    #[error("query failed: {message}")]
    Query {
        /// Store message.
        message: String,
    },
    /// Reading from the result cursor failed.
    #[error("result cursor failed: {message}")]
    Cursor {
        /// Store message.
        message: String,
    },
}

/// Handle on a server operation that completes asynchronously.
pub trait StoreTask {
    /// Block until the server reports the operation done.
    fn wait_till_complete(&self) -> Result<(), StoreError>;
}

/// Client operations the pipelines rely on.
pub trait Store {
    /// Task handle for index builds and routine uploads.
    type Task: StoreTask;
    /// Aggregation result cursor.
    type Cursor: Iterator<Item = Result<Value, StoreError>>;

    /// Start building a secondary index. An existing index yields
    /// [`StoreError::IndexExists`].
    fn create_index(&self, spec: &IndexSpec) -> Result<Self::Task, StoreError>;

    /// Write (or overwrite) the record under `key`.
    fn put(&self, key: &RecordKey, bins: &[Bin]) -> Result<(), StoreError>;

    /// Upload a routine's source.
    fn register_routine(&self, routine: &Routine) -> Result<Self::Task, StoreError>;

    /// Run `statement` and reduce its candidates through `call` on the
    /// server. `None` means the store returned no cursor.
    fn query_aggregate(
        &self,
        statement: &Statement,
        call: &AggregateCall,
    ) -> Result<Option<Self::Cursor>, StoreError>;
}

impl<S: Store + ?Sized> Store for &S {
    type Task = S::Task;
    type Cursor = S::Cursor;

    fn create_index(&self, spec: &IndexSpec) -> Result<Self::Task, StoreError> {
        (**self).create_index(spec)
    }

    fn put(&self, key: &RecordKey, bins: &[Bin]) -> Result<(), StoreError> {
        (**self).put(key, bins)
    }

    fn register_routine(&self, routine: &Routine) -> Result<Self::Task, StoreError> {
        (**self).register_routine(routine)
    }

    fn query_aggregate(
        &self,
        statement: &Statement,
        call: &AggregateCall,
    ) -> Result<Option<Self::Cursor>, StoreError> {
        (**self).query_aggregate(statement, call)
    }
}
