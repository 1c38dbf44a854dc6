//! Statistics of a crawl run
//!
//! This module provides the counters collected while a run progresses and
//! their console rendering.

use crate::state::StopReason;
use std::time::Duration;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Names loaded from earlier output before the run started
    pub historical_loaded: usize,

    /// Listing pages whose batch was merged
    pub pages_processed: u32,

    /// Last listing page that was processed
    pub last_page: Option<u32>,

    /// Entity references found on processed listing pages
    pub references_found: u64,

    /// References skipped because their identifier was already dispatched
    pub skipped_dispatched: u64,

    /// Detail fetches launched
    pub dispatched: u64,

    /// Records added to the collected set
    pub records_kept: u64,

    /// Records discarded as already captured
    pub duplicates_discarded: u64,

    /// Detail fetches that produced no data
    pub failures: u64,

    /// Backup snapshots written
    pub snapshots_written: u32,

    /// Rows written to the main output by the final flush
    pub records_flushed: usize,

    /// Why the run ended
    pub stop_reason: Option<StopReason>,

    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl CrawlStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of dispatched detail fetches that returned data, in percent
    pub fn success_rate(&self) -> f64 {
        if self.dispatched == 0 {
            return 0.0;
        }
        let succeeded = self.dispatched.saturating_sub(self.failures);
        (succeeded as f64 / self.dispatched as f64) * 100.0
    }

    /// True when the run ended by exhaustion or page ceiling
    pub fn is_clean(&self) -> bool {
        self.stop_reason.map(|r| r.is_clean()).unwrap_or(false)
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Previously captured names: {}", stats.historical_loaded);
    println!("  Listing pages processed: {}", stats.pages_processed);
    if let Some(page) = stats.last_page {
        println!("  Last page: {}", page);
    }
    println!("  Elapsed: {:.1}s", stats.elapsed.as_secs_f64());
    println!();

    println!("Companies:");
    println!("  References found: {}", stats.references_found);
    println!("  Already dispatched this run: {}", stats.skipped_dispatched);
    println!("  Detail fetches: {}", stats.dispatched);
    println!("  Failed fetches: {}", stats.failures);
    println!("  Already captured: {}", stats.duplicates_discarded);
    println!("  New records: {}", stats.records_kept);
    println!("  Rows written: {}", stats.records_flushed);
    println!("  Backup snapshots: {}", stats.snapshots_written);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} detail fetches returned data)",
        stats.success_rate(),
        stats.dispatched.saturating_sub(stats.failures),
        stats.dispatched
    );

    match stats.stop_reason {
        Some(reason) => println!("Finished: {}", reason),
        None => println!("Finished: unknown"),
    }
}
