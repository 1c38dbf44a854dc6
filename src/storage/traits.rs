//! Storage traits and error types
//!
//! This module defines the trait interface for record sinks and
//! associated error types.

use crate::storage::CompanyRecord;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Column '{column}' not found in {path}")]
    MissingColumn { column: String, path: String },

    #[error("{path} has header '{found}', expected '{expected}'")]
    SchemaMismatch {
        path: String,
        expected: String,
        found: String,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// How an append call treated the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The destination was missing or empty; a header row was written first
    Created { rows: usize },

    /// Rows were added after the existing content
    Appended { rows: usize },
}

impl AppendOutcome {
    /// Number of data rows written
    pub fn rows(&self) -> usize {
        match self {
            Self::Created { rows } | Self::Appended { rows } => *rows,
        }
    }
}

/// Trait for record sink implementations
///
/// A sink has a single writer for the whole run. Prior rows are never
/// rewritten or truncated.
pub trait RecordSink: Send {
    /// Appends records to the destination
    ///
    /// # Arguments
    ///
    /// * `records` - The records to write, in order
    ///
    /// # Returns
    ///
    /// * `Ok(AppendOutcome)` - Whether a header was written and how many rows
    /// * `Err(StorageError)` - The destination could not be written
    fn append(&mut self, records: &[CompanyRecord]) -> StorageResult<AppendOutcome>;

    /// Reads the company names of all rows already in the destination
    ///
    /// A missing destination yields an empty list.
    fn load_names(&self) -> StorageResult<Vec<String>>;

    /// Writes a complete standalone copy of `records` to `path`
    fn write_snapshot(&self, records: &[CompanyRecord], path: &Path) -> StorageResult<()>;

    /// The main destination of this sink
    fn destination(&self) -> &Path;
}
