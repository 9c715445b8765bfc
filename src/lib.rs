#![deny(missing_docs)]
//! Flight-record loader and late-flight aggregation runner.
//!
//! The crate is a thin client over an external key-value store. It has two
//! pipelines:
//!
//! - [`loader::Loader`] ensures a numeric range index on the flight date and
//!   writes one record per CSV line.
//! - [`query::QueryRunner`] uploads an aggregation routine, filters flights by
//!   an inclusive date range, and hands the candidates to the routine on the
//!   server.
//!
//! Every store interaction goes through the [`store::Store`] trait. The
//! `aerospike` feature enables the production client; [`store::MemoryStore`]
//! implements the same contract in-process.

pub(crate) mod observability;

/// Command-line surface and mode dispatch.
pub mod cli;

/// Client and pipeline configuration.
pub mod config;

/// Top-level error classification.
pub mod error;

/// Flight record model and CSV line parsing.
pub mod flight;

/// CSV ingestion into the store.
pub mod loader;

/// Server-side aggregation query runner.
pub mod query;

/// Store client surface and implementations.
pub mod store;

pub use crate::{
    cli::{Cli, Mode, Outcome},
    config::{ClientConfig, LoadOptions, MalformedLinePolicy, QueryOptions},
    error::{AppError, ErrorClass},
    flight::{FlightRecord, ParseError},
    loader::{LoadError, LoadSummary, Loader},
    query::{DateRange, QueryError, QueryOutcome, QueryRunner},
    store::{MemoryStore, Store, StoreError, Value},
};
