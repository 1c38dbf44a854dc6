//! Summary of an existing output file
//!
//! Reads a CSV produced by earlier runs (either column layout) and reports
//! what it contains.

use crate::state::normalize_name;
use crate::storage::schema::{COL_COMPANY_NAME, COL_TAGS, COL_WEBSITE, TAG_SEPARATOR};
use crate::storage::{StorageError, StorageResult};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Contents of an output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatistics {
    pub path: PathBuf,

    /// Data rows, header excluded
    pub rows: usize,

    /// Distinct normalised company names
    pub unique_names: usize,

    /// Rows with a non-empty website
    pub with_website: usize,

    /// Most frequent tags, highest count first
    pub top_tags: Vec<(String, usize)>,
}

/// Loads statistics from an output file
///
/// # Arguments
///
/// * `path` - The CSV file to read
/// * `top_n` - Number of tags to report
///
/// # Returns
///
/// * `Ok(FileStatistics)` - Successfully summarised file
/// * `Err(StorageError)` - The file is missing, unreadable or has no `company_name` column
pub fn load_file_statistics(path: &Path, top_n: usize) -> StorageResult<FileStatistics> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);

    let name_index = position(COL_COMPANY_NAME).ok_or_else(|| StorageError::MissingColumn {
        column: COL_COMPANY_NAME.to_string(),
        path: path.display().to_string(),
    })?;
    let tags_index = position(COL_TAGS);
    let website_index = position(COL_WEBSITE);

    let mut rows = 0;
    let mut names = HashSet::new();
    let mut with_website = 0;
    let mut tag_counts: HashMap<String, usize> = HashMap::new();

    for row in reader.records() {
        let row = row?;
        rows += 1;

        let name = normalize_name(row.get(name_index).unwrap_or_default());
        if !name.is_empty() {
            names.insert(name);
        }

        if website_index
            .and_then(|i| row.get(i))
            .map(|w| !w.trim().is_empty())
            .unwrap_or(false)
        {
            with_website += 1;
        }

        if let Some(tags) = tags_index.and_then(|i| row.get(i)) {
            for tag in tags.split(TAG_SEPARATOR.trim()).map(str::trim) {
                if !tag.is_empty() {
                    *tag_counts.entry(tag.to_string()).or_insert(0) += 1;
                }
            }
        }
    }

    let mut top_tags: Vec<_> = tag_counts.into_iter().collect();
    top_tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_tags.truncate(top_n);

    Ok(FileStatistics {
        path: path.to_path_buf(),
        rows,
        unique_names: names.len(),
        with_website,
        top_tags,
    })
}

/// Prints file statistics to stdout
pub fn print_file_statistics(stats: &FileStatistics) {
    println!("=== Output File: {} ===\n", stats.path.display());
    println!("  Rows: {}", stats.rows);
    println!("  Unique companies: {}", stats.unique_names);
    println!("  Rows with website: {}", stats.with_website);

    if stats.rows > stats.unique_names {
        println!(
            "  Duplicate or unnamed rows: {}",
            stats.rows - stats.unique_names
        );
    }

    if !stats.top_tags.is_empty() {
        println!();
        println!("Top Tags:");
        for (tag, count) in &stats.top_tags {
            println!("  {}: {}", tag, count);
        }
    }
}
