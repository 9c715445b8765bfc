mod common;

use clap::Parser;
use flight_aggregation::{
    cli::{self, Cli, Outcome},
    AppError, ErrorClass, LoadSummary, MemoryStore, StoreError,
};

use crate::common::{echo_store, flight_line, write_csv};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("flight-aggregation").chain(args.iter().copied()))
        .expect("parse")
}

#[test]
fn usage_never_connects() {
    let outcome = cli::run(&parse(&["-u"]), |_| -> Result<MemoryStore, StoreError> {
        panic!("usage must not connect")
    })
    .expect("usage");
    match outcome {
        Outcome::Usage(text) => assert!(text.contains("--host")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn file_flag_runs_loader_with_resolved_namespace() {
    let file = write_csv(&[flight_line("9", "2012/01/09")]);
    let path = file.path().to_str().expect("utf-8 path");
    let store = MemoryStore::new();
    let outcome = cli::run(&parse(&["-n", "bar", "-f", path]), |config| {
        assert_eq!(config.namespace, "bar");
        Ok(&store)
    })
    .expect("load");

    match outcome {
        Outcome::Loaded(LoadSummary { written, .. }) => assert_eq!(written, 1),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(store.record("bar", "flights", "9").is_some());
}

#[test]
fn missing_file_is_an_input_error_without_store_calls() {
    let store = MemoryStore::new();
    let err = cli::run(&parse(&["-f", "no/such/flights.csv"]), |_| Ok(&store)).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Input);
    assert_eq!(err.class().exit_code(), 3);
    assert!(store.operations().is_empty());
}

#[test]
fn connect_failure_is_a_store_error() {
    let err = cli::run(&parse(&["-p", "4000"]), |config| -> Result<MemoryStore, _> {
        Err(StoreError::Connect {
            address: config.address(),
            message: "connection refused".into(),
        })
    })
    .unwrap_err();
    assert!(matches!(
        err,
        AppError::Store(StoreError::Connect { ref address, .. }) if address == "127.0.0.1:4000"
    ));
    assert_eq!(err.class().exit_code(), 1);
}

#[test]
fn query_mode_without_routine_source_is_an_input_error() {
    // Tests run from the crate root, which ships no routine source.
    let store = echo_store();
    let err = cli::run(&parse(&[]), |_| Ok(&store)).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Input);
    assert!(store.operations().is_empty());
}
