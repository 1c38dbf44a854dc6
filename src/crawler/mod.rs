//! Crawler module for listing and detail page harvesting
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry and throttle backoff
//! - HTML parsing of listing and detail pages
//! - Detail fetch scheduling under a global concurrency bound
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod parser;
mod scheduler;

pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{build_http_client, FetchResult, HttpTransport, RetryPolicy, Transport};
pub use parser::{DetailFields, EntityReference, Extractor};
pub use scheduler::{DetailOutcome, DetailTask, Scheduler};

use crate::config::Config;
use crate::output::CrawlStatistics;
use crate::Result;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP transport and open the output file
/// 2. Load previously captured names from that file
/// 3. Walk listing pages and fetch detail pages
/// 4. Save new records once the run ends
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `cancel` - Cancelled by the caller to request a graceful stop
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Crawl completed or was stopped; records were saved
/// * `Err(HarvestError)` - Crawl failed
pub async fn crawl(config: Config, cancel: CancellationToken) -> Result<CrawlStatistics> {
    run_crawl(config, cancel).await
}
