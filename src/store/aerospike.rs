//! [`Store`] backed by the Aerospike client.
//!
//! Only the calls the pipelines need are wrapped. Client errors are reduced to
//! their message so [`StoreError`] stays `Send + Sync`.

use std::{collections::HashMap, sync::Arc};

use aerospike::{
    as_val, Bin as AsBin, Bins, Client, ClientPolicy, IndexTask, IndexType as AsIndexType, Key,
    QueryPolicy, Record, Recordset, RegisterTask, Statement as AsStatement, Task, UDFLang,
    Value as AsValue, WritePolicy,
};

use super::{
    AggregateCall, Bin, IndexSpec, IndexType, RecordKey, Routine, RoutineLanguage, Statement,
    Store, StoreError, StoreTask, Value,
};
use crate::{config::ClientConfig, observability::log_info};

/// Bin carrying an aggregation result.
const SUCCESS_BIN: &str = "SUCCESS";
/// Bin carrying an aggregation failure message.
const FAILURE_BIN: &str = "FAILURE";

/// Connected Aerospike client.
pub struct AerospikeStore {
    client: Client,
    write_policy: WritePolicy,
    query_policy: QueryPolicy,
}

impl AerospikeStore {
    /// Connect to the cluster seeded at `config.address()`.
    pub fn connect(config: &ClientConfig) -> Result<Self, StoreError> {
        let address = config.address();
        let client =
            Client::new(&ClientPolicy::default(), &address).map_err(|err| StoreError::Connect {
                address: address.clone(),
                message: err.to_string(),
            })?;
        log_info!(component = "store", event = "connected", address = %address);
        Ok(Self {
            client,
            write_policy: WritePolicy::default(),
            query_policy: QueryPolicy::default(),
        })
    }
}

impl Drop for AerospikeStore {
    fn drop(&mut self) {
        let _ = self.client.close();
    }
}

/// Pending index build or routine upload.
pub enum AerospikeTask {
    /// Secondary index build.
    Index {
        /// Index name.
        index: String,
        /// Client task.
        task: IndexTask,
    },
    /// Routine upload.
    Register {
        /// Routine name.
        routine: String,
        /// Client task.
        task: RegisterTask,
    },
}

impl StoreTask for AerospikeTask {
    fn wait_till_complete(&self) -> Result<(), StoreError> {
        match self {
            AerospikeTask::Index { index, task } => {
                task.wait_till_complete(None)
                    .map(|_| ())
                    .map_err(|err| StoreError::Index {
                        index: index.clone(),
                        message: err.to_string(),
                    })
            }
            AerospikeTask::Register { routine, task } => task
                .wait_till_complete(None)
                .map(|_| ())
                .map_err(|err| StoreError::Register {
                    routine: routine.clone(),
                    message: err.to_string(),
                }),
        }
    }
}

/// Aggregation output read from a [`Recordset`].
pub struct AerospikeCursor {
    records: Arc<Recordset>,
}

impl Iterator for AerospikeCursor {
    type Item = Result<Value, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut records: &Recordset = &self.records;
        let next = records.next()?;
        Some(
            next.map_err(|err| StoreError::Cursor {
                message: err.to_string(),
            })
            .and_then(|record| aggregate_value(&record)),
        )
    }
}

fn aggregate_value(record: &Record) -> Result<Value, StoreError> {
    if let Some(value) = record.bins.get(SUCCESS_BIN) {
        return Ok(from_client_value(value));
    }
    if let Some(value) = record.bins.get(FAILURE_BIN) {
        return Err(StoreError::Cursor {
            message: value.to_string(),
        });
    }
    Ok(Value::Map(
        record
            .bins
            .iter()
            .map(|(name, value)| (name.clone(), from_client_value(value)))
            .collect(),
    ))
}

fn from_client_value(value: &AsValue) -> Value {
    match value {
        AsValue::Nil => Value::Nil,
        AsValue::Int(v) => Value::Int(*v),
        AsValue::String(v) => Value::Str(v.clone()),
        AsValue::List(items) => Value::List(items.iter().map(from_client_value).collect()),
        AsValue::HashMap(entries) => Value::Map(
            entries
                .iter()
                .map(|(key, value)| (key.to_string(), from_client_value(value)))
                .collect(),
        ),
        other => Value::Str(other.to_string()),
    }
}

fn to_client_value(value: &Value) -> AsValue {
    match value {
        Value::Nil => AsValue::Nil,
        Value::Int(v) => AsValue::from(*v),
        Value::Str(v) => AsValue::from(v.clone()),
        Value::List(items) => AsValue::List(items.iter().map(to_client_value).collect()),
        Value::Map(entries) => AsValue::HashMap(
            entries
                .iter()
                .map(|(key, value)| (AsValue::from(key.clone()), to_client_value(value)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

fn is_index_found(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("fail:200") || message.contains("index already exists")
}

impl Store for AerospikeStore {
    type Task = AerospikeTask;
    type Cursor = AerospikeCursor;

    fn create_index(&self, spec: &IndexSpec) -> Result<Self::Task, StoreError> {
        let index_type = match spec.index_type {
            IndexType::Numeric => AsIndexType::Numeric,
        };
        let task = self
            .client
            .create_index(
                &self.write_policy,
                &spec.namespace,
                &spec.set,
                &spec.bin,
                &spec.index_name,
                index_type,
            )
            .map_err(|err| {
                let message = err.to_string();
                if is_index_found(&message) {
                    StoreError::IndexExists {
                        index: spec.index_name.clone(),
                    }
                } else {
                    StoreError::Index {
                        index: spec.index_name.clone(),
                        message,
                    }
                }
            })?;
        Ok(AerospikeTask::Index {
            index: spec.index_name.clone(),
            task,
        })
    }

    fn put(&self, key: &RecordKey, bins: &[Bin]) -> Result<(), StoreError> {
        let write_error = |message: String| StoreError::Write {
            key: key.to_string(),
            message,
        };
        let client_key = Key::new(
            key.namespace.as_str(),
            key.set.as_str(),
            AsValue::from(key.user_key.clone()),
        )
        .map_err(|err| write_error(err.to_string()))?;
        let client_bins: Vec<AsBin> = bins
            .iter()
            .map(|bin| AsBin::new(bin.name, to_client_value(&bin.value)))
            .collect();
        self.client
            .put(&self.write_policy, &client_key, &client_bins)
            .map_err(|err| write_error(err.to_string()))
    }

    fn register_routine(&self, routine: &Routine) -> Result<Self::Task, StoreError> {
        let register_error = |message: String| StoreError::Register {
            routine: routine.name.clone(),
            message,
        };
        let path = routine
            .path
            .to_str()
            .ok_or_else(|| register_error("routine path is not valid UTF-8".to_string()))?;
        let language = match routine.language {
            RoutineLanguage::Lua => UDFLang::Lua,
        };
        let task = self
            .client
            .register_udf_from_file(&self.write_policy, path, &routine.name, language)
            .map_err(|err| register_error(err.to_string()))?;
        Ok(AerospikeTask::Register {
            routine: routine.name.clone(),
            task,
        })
    }

    fn query_aggregate(
        &self,
        statement: &Statement,
        call: &AggregateCall,
    ) -> Result<Option<Self::Cursor>, StoreError> {
        let mut client_statement =
            AsStatement::new(&statement.namespace, &statement.set, Bins::All);
        if let Some(filter) = &statement.filter {
            client_statement.add_filter(aerospike::as_range!(
                filter.bin.as_str(),
                *filter.range.start(),
                *filter.range.end()
            ));
        }
        client_statement.set_aggregate_function(&call.package, &call.function, None);
        let records = self
            .client
            .query(&self.query_policy, client_statement)
            .map_err(|err| StoreError::Query {
                message: err.to_string(),
            })?;
        Ok(Some(AerospikeCursor { records }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_found_detection() {
        assert!(is_index_found("Server error: FAIL:200:Index already exists"));
        assert!(is_index_found("index already exists"));
        assert!(!is_index_found("FAIL:201:Index not found"));
    }

    #[test]
    fn values_convert_both_ways() {
        let mut entries = std::collections::BTreeMap::new();
        entries.insert("late".to_string(), Value::Int(2));
        let value = Value::List(vec![Value::Map(entries), Value::Str("AA".into()), Value::Nil]);
        assert_eq!(from_client_value(&to_client_value(&value)), value);
    }
}
