//! Storage module for persisting crawl results
//!
//! This module handles all file operations for the harvester, including:
//! - The CSV column contract (detailed and reduced layouts)
//! - Appending records with header-aware create-or-append behaviour
//! - Reading prior company names for resumable runs
//! - Timestamped backup snapshots

mod csv_sink;
pub mod schema;
mod traits;

pub use csv_sink::{snapshot_path, CsvSink};
pub use traits::{AppendOutcome, RecordSink, StorageError, StorageResult};

use crate::config::OutputConfig;

/// Opens the CSV sink described by the output configuration
pub fn open_sink(config: &OutputConfig) -> CsvSink {
    CsvSink::new(&config.csv_path, config.schema)
}

/// One captured company
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyRecord {
    /// Display name; empty when the detail page had no title
    pub name: String,
    /// Slug the detail URL was built from
    pub identifier: String,
    pub detail_url: String,
    /// Stand label from the listing block, prefix stripped
    pub stand: String,
    pub tags: Vec<String>,
    /// Description text with line breaks replaced by spaces
    pub overview: String,
    /// First off-site link on the detail page, empty if none
    pub website: String,
}

impl CompanyRecord {
    /// Tags flattened into a single field
    pub fn tags_joined(&self) -> String {
        self.tags.join(schema::TAG_SEPARATOR)
    }
}
