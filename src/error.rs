use thiserror::Error;

use crate::{loader::LoadError, query::QueryError, store::StoreError};

/// Broad failure class, mapped to a process exit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad command line.
    Usage,
    /// The store refused or could not be reached.
    Store,
    /// Input files missing, unreadable, or malformed.
    Input,
}

impl ErrorClass {
    /// Exit status reported by the binary.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorClass::Store => 1,
            ErrorClass::Usage => 2,
            ErrorClass::Input => 3,
        }
    }
}

/// Any failure of a CLI run.
#[derive(Debug, Error)]
pub enum AppError {
    /// Argument parsing failed.
    #[error(transparent)]
    Usage(#[from] clap::Error),
    /// Connecting to the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Loader mode failed.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// Query mode failed.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl AppError {
    /// Classify the failure.
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::Usage(_) => ErrorClass::Usage,
            AppError::Store(_)
            | AppError::Load(LoadError::Store(_))
            | AppError::Query(QueryError::Store(_)) => ErrorClass::Store,
            AppError::Load(_) | AppError::Query(_) => ErrorClass::Input,
        }
    }
}
