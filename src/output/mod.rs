//! Output module for crawl statistics and reports
//!
//! This module handles:
//! - Recording statistics while a run progresses
//! - Printing the end-of-run summary
//! - Summarising an existing output file for `--stats`

pub mod stats;
pub mod summary;

pub use stats::{print_statistics, CrawlStatistics};
pub use summary::{load_file_statistics, print_file_statistics, FileStatistics};
