//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::{io::Write, path::PathBuf};

use flight_aggregation::{
    query::{ROUTINE_FUNCTION, ROUTINE_PACKAGE},
    MemoryStore, Value,
};
use tempfile::{NamedTempFile, TempDir};

/// A well-formed 19-field line for `id` flying on `date` (`YYYY/MM/DD`).
pub fn flight_line(id: &str, date: &str) -> String {
    format!(
        "{id},2012,5,{date},19805,AA,1,12478,JFK,New York,NY,LAX,Los Angeles,CA,914,1230,376,\
         342,2475"
    )
}

/// Temporary CSV holding `lines`.
pub fn write_csv<S: AsRef<str>>(lines: &[S]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tempfile");
    for line in lines {
        writeln!(file, "{}", line.as_ref()).expect("write line");
    }
    file
}

/// Directory holding a placeholder `simple_aggregation.lua`.
pub fn routine_file() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("simple_aggregation.lua");
    std::fs::write(&path, b"-- server-side aggregation").expect("write routine");
    (dir, path)
}

/// Memory store whose late-flight function echoes the candidate keys it
/// received, sorted, as a single list. No candidates produce no output.
pub fn echo_store() -> MemoryStore {
    MemoryStore::new().with_aggregator(ROUTINE_PACKAGE, ROUTINE_FUNCTION, |records| {
        if records.is_empty() {
            return Vec::new();
        }
        let mut keys: Vec<_> = records.iter().map(|record| record.key.clone()).collect();
        keys.sort();
        vec![Value::List(keys.into_iter().map(Value::Str).collect())]
    })
}

/// Sample input shipped with the crate.
pub fn sample_data() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/flights_from.csv")
}
