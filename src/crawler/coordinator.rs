//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the page loop that coordinates all aspects of
//! a run, including:
//! - Loading previously captured names into the ledger
//! - Walking listing pages in order and dispatching detail batches
//! - Merging detail results with cross-run de-duplication
//! - Periodic backup snapshots and the single final flush
//! - Honouring stop requests at page and batch boundaries

use crate::config::Config;
use crate::crawler::fetcher::{FetchResult, HttpTransport, Transport};
use crate::crawler::parser::{EntityReference, Extractor};
use crate::crawler::scheduler::{DetailOutcome, DetailTask, Scheduler};
use crate::output::CrawlStatistics;
use crate::state::{CrawlPhase, DedupLedger, StopReason};
use crate::storage::{open_sink, snapshot_path, CompanyRecord, RecordSink, StorageResult};
use crate::url::{site_domain, UrlTemplates};
use crate::{HarvestError, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Main crawler coordinator structure
///
/// One coordinator owns all mutable state of one run: the ledger, the
/// collected records and the sink. It is consumed logically by `run`; a
/// second call fails because the phase machine is already `Done`.
pub struct Coordinator {
    config: Arc<Config>,
    extractor: Extractor,
    templates: UrlTemplates,
    scheduler: Scheduler,
    ledger: DedupLedger,
    sink: Box<dyn RecordSink>,
    cancel: CancellationToken,
    collected: Vec<CompanyRecord>,
    phase: CrawlPhase,
    current_page: u32,
    /// Listing body fetched by the last pagination probe
    probed_listing: Option<(u32, String)>,
    stats: CrawlStatistics,
    flushed: bool,
}

impl Coordinator {
    /// Creates a coordinator with the HTTP transport and the configured CSV sink
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    /// * `cancel` - Token an external signal handler cancels to request a stop
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - The client, templates or selectors could not be built
    pub fn new(config: Config, cancel: CancellationToken) -> Result<Self> {
        let transport = HttpTransport::new(&config.http, &config.site.base_url)?;
        let sink = open_sink(&config.output);
        Self::with_transport(config, Arc::new(transport), Box::new(sink), cancel)
    }

    /// Creates a coordinator around a caller-supplied transport and sink
    pub fn with_transport(
        config: Config,
        transport: Arc<dyn Transport>,
        sink: Box<dyn RecordSink>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let templates = UrlTemplates::from_config(&config.site)?;
        let domain = site_domain(&config.site.base_url)?;
        let extractor = Extractor::new(&config.selectors, &config.extract, &domain)?;
        let scheduler = Scheduler::new(&config.crawler, transport);
        let current_page = config.crawler.start_page;

        Ok(Self {
            config: Arc::new(config),
            extractor,
            templates,
            scheduler,
            ledger: DedupLedger::new(),
            sink,
            cancel,
            collected: Vec::new(),
            phase: CrawlPhase::Running,
            current_page,
            probed_listing: None,
            stats: CrawlStatistics::new(),
            flushed: false,
        })
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Records collected so far in this run
    pub fn collected(&self) -> &[CompanyRecord] {
        &self.collected
    }

    pub fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    pub fn stats(&self) -> &CrawlStatistics {
        &self.stats
    }

    /// Runs the crawl to completion
    ///
    /// The collected records are flushed to the sink exactly once, whatever
    /// ended the run. When the page loop fails, an extra timestamped backup
    /// is written and the flush is still attempted before the error is
    /// returned.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlStatistics)` - The run ended by exhaustion, page ceiling or stop request
    /// * `Err(HarvestError)` - The page loop or the final flush failed
    pub async fn run(&mut self) -> Result<CrawlStatistics> {
        let started = Instant::now();

        info!(
            start_page = self.current_page,
            max_pages = ?self.config.crawler.max_pages,
            mode = ?self.config.crawler.mode,
            max_concurrent_tasks = self.config.crawler.max_concurrent_tasks,
            output = %self.sink.destination().display(),
            "Starting crawl"
        );

        self.load_ledger();

        let outcome = self.crawl_pages().await;
        let reason = match &outcome {
            Ok(reason) => *reason,
            Err(e) => {
                error!(page = self.current_page, error = %e, "Crawl failed, saving collected records");
                self.write_backup("crash");
                StopReason::Failed
            }
        };

        if !self.phase.is_terminal() {
            self.phase = CrawlPhase::Done;
        }
        self.stats.stop_reason = Some(reason);

        let flushed = self.flush();
        self.stats.elapsed = started.elapsed();

        match outcome {
            Ok(_) => {
                flushed?;
                info!(
                    reason = %reason,
                    pages = self.stats.pages_processed,
                    records = self.stats.records_kept,
                    failures = self.stats.failures,
                    elapsed_secs = self.stats.elapsed.as_secs_f64(),
                    "Crawl finished"
                );
                Ok(self.stats.clone())
            }
            Err(e) => {
                if let Err(flush_error) = flushed {
                    error!(error = %flush_error, "Final save after failure also failed");
                }
                Err(e)
            }
        }
    }

    /// Populates the ledger from the sink; an unreadable file is logged and skipped
    fn load_ledger(&mut self) {
        match self.ledger.load(self.sink.as_ref()) {
            Ok(count) => {
                self.stats.historical_loaded = count;
                if count > 0 {
                    info!(
                        count,
                        path = %self.sink.destination().display(),
                        "Loaded previously captured companies"
                    );
                } else {
                    info!("No previously captured companies, starting fresh");
                }
            }
            Err(e) => {
                warn!(
                    path = %self.sink.destination().display(),
                    error = %e,
                    "Could not read existing output, continuing without history"
                );
            }
        }
    }

    /// The per-page state machine
    async fn crawl_pages(&mut self) -> Result<StopReason> {
        let max_pages = self.config.crawler.max_pages;
        let autosave_every = self.config.crawler.autosave_every;
        let between_pages = self.config.crawler.between_pages();

        loop {
            if self.cancel.is_cancelled() {
                info!(page = self.current_page, "Stop requested, not starting page");
                self.transition(CrawlPhase::Done)?;
                return Ok(StopReason::StopRequested);
            }

            if page_limit_reached(self.stats.pages_processed, max_pages) {
                self.transition(CrawlPhase::Done)?;
                return Ok(StopReason::PageLimit);
            }

            let page = self.current_page;

            self.transition(CrawlPhase::Listing)?;
            let references = self.fetch_listing(page).await;
            if references.is_empty() {
                info!(page, "No companies found on page, finishing");
                self.transition(CrawlPhase::Done)?;
                return Ok(StopReason::EmptyPage);
            }
            info!(page, count = references.len(), "Found companies on listing page");
            self.stats.references_found += references.len() as u64;

            if self.cancel.is_cancelled() {
                info!(page, "Stop requested, not dispatching batch");
                self.transition(CrawlPhase::Done)?;
                return Ok(StopReason::StopRequested);
            }

            self.transition(CrawlPhase::Dispatching)?;
            let tasks = self.build_tasks(page, references);
            let outcomes = self.scheduler.run_batch(tasks, &self.cancel).await;
            self.stats.dispatched += outcomes.len() as u64;

            self.transition(CrawlPhase::Merging)?;
            let kept = self.merge(outcomes);
            self.stats.pages_processed += 1;
            self.stats.last_page = Some(page);
            info!(
                page,
                kept,
                total = self.collected.len(),
                "Page complete"
            );

            if autosave_every > 0 && self.stats.pages_processed % autosave_every == 0 {
                self.write_backup("autosave");
            }

            self.transition(CrawlPhase::PaginationCheck)?;

            if page_limit_reached(self.stats.pages_processed, max_pages) {
                info!(pages = self.stats.pages_processed, "Page limit reached");
                self.transition(CrawlPhase::Done)?;
                return Ok(StopReason::PageLimit);
            }

            if self.cancel.is_cancelled() {
                info!(page, "Stop requested, not probing next page");
                self.transition(CrawlPhase::Done)?;
                return Ok(StopReason::StopRequested);
            }

            if !self.probe_next(page + 1).await {
                info!(page, "No further listing pages");
                self.transition(CrawlPhase::Done)?;
                return Ok(StopReason::Exhausted);
            }

            self.current_page = page + 1;

            if !between_pages.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(between_pages) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
        }
    }

    fn transition(&mut self, next: CrawlPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        debug!(from = %self.phase, to = %next, page = self.current_page, "Phase transition");
        self.phase = next;
        Ok(())
    }

    /// Fetches and parses a listing page; any failure yields no references
    async fn fetch_listing(&mut self, page: u32) -> Vec<EntityReference> {
        let body = match self.probed_listing.take() {
            Some((probed, body)) if probed == page => body,
            _ => {
                let url = self.templates.listing_url(page);
                info!(page, url = %url, "Fetching listing page");
                match self.scheduler.transport().fetch(&url).await {
                    FetchResult::Success { body, .. } => body,
                    failure => {
                        warn!(page, reason = %failure.describe(), "Listing page fetch failed");
                        return Vec::new();
                    }
                }
            }
        };

        self.extractor.parse_listing(&body)
    }

    /// Checks whether `page` has entries, keeping its body for the next iteration
    async fn probe_next(&mut self, page: u32) -> bool {
        let url = self.templates.listing_url(page);
        debug!(page, url = %url, "Probing next listing page");

        match self.scheduler.transport().fetch(&url).await {
            FetchResult::Success { body, .. } => {
                if self.extractor.has_more(&body) {
                    self.probed_listing = Some((page, body));
                    true
                } else {
                    false
                }
            }
            failure => {
                warn!(page, reason = %failure.describe(), "Pagination probe failed");
                false
            }
        }
    }

    /// Turns references into detail tasks, claiming each identifier
    ///
    /// Stops early, leaving the rest unclaimed, when a stop is requested
    /// while the batch is being built.
    fn build_tasks(&mut self, page: u32, references: Vec<EntityReference>) -> Vec<DetailTask> {
        let total = references.len();
        let mut tasks = Vec::with_capacity(total);

        for (index, reference) in references.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(
                    page,
                    built = tasks.len(),
                    skipped = total - index,
                    "Stop requested while building batch"
                );
                break;
            }

            if !self.ledger.claim_identifier(&reference.identifier) {
                debug!(slug = %reference.identifier, "Already dispatched in this run");
                self.stats.skipped_dispatched += 1;
                continue;
            }

            let url = self.templates.detail_url(&reference.identifier, page);
            tasks.push(DetailTask { reference, url });
        }

        tasks
    }

    /// Merges completed fetches into the collected records
    ///
    /// # Returns
    ///
    /// Number of records kept from this batch
    fn merge(&mut self, outcomes: Vec<DetailOutcome>) -> usize {
        let mut kept = 0;

        for DetailOutcome { task, result } in outcomes {
            let slug = task.reference.identifier.clone();

            let body = match result {
                FetchResult::Success { body, .. } if !body.trim().is_empty() => body,
                FetchResult::Success { .. } => {
                    self.stats.failures += 1;
                    warn!(slug = %slug, "Detail page was empty");
                    continue;
                }
                failure => {
                    self.stats.failures += 1;
                    warn!(slug = %slug, reason = %failure.describe(), "Detail fetch failed");
                    continue;
                }
            };

            let record = self
                .extractor
                .parse_detail(&body)
                .into_record(&task.reference, task.url);

            if record.name.trim().is_empty() {
                warn!(slug = %slug, "Detail page has no company name");
            } else if self.ledger.is_known(&record.name) {
                self.stats.duplicates_discarded += 1;
                info!(slug = %slug, name = %record.name, "Already captured, skipping");
                continue;
            } else {
                self.ledger.mark(&record.name);
            }

            debug!(slug = %slug, name = %record.name, "Captured company");
            self.collected.push(record);
            self.stats.records_kept += 1;
            kept += 1;
        }

        kept
    }

    /// Writes the collected records to a timestamped backup; failures are logged
    fn write_backup(&mut self, label: &str) -> Option<PathBuf> {
        if self.collected.is_empty() {
            return None;
        }

        let path = snapshot_path(
            Path::new(&self.config.output.backup_dir),
            &self.config.output.backup_prefix,
            Local::now(),
        );

        match self.sink.write_snapshot(&self.collected, &path) {
            Ok(()) => {
                self.stats.snapshots_written += 1;
                info!(
                    kind = label,
                    rows = self.collected.len(),
                    path = %path.display(),
                    "Backup written"
                );
                Some(path)
            }
            Err(e) => {
                error!(kind = label, path = %path.display(), error = %e, "Backup failed");
                None
            }
        }
    }

    /// Appends the collected records to the main sink, once per run
    fn flush(&mut self) -> StorageResult<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;

        if self.collected.is_empty() {
            info!("No new companies to save");
            return Ok(());
        }

        match self.sink.append(&self.collected) {
            Ok(outcome) => {
                self.stats.records_flushed = outcome.rows();
                info!(
                    rows = outcome.rows(),
                    outcome = ?outcome,
                    path = %self.sink.destination().display(),
                    "Saved companies"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    path = %self.sink.destination().display(),
                    error = %e,
                    "Failed to save companies"
                );
                self.write_backup("flush-failure");
                Err(e)
            }
        }
    }
}

fn page_limit_reached(processed: u32, max_pages: Option<u32>) -> bool {
    matches!(max_pages, Some(max) if processed >= max)
}

/// Runs a complete crawl with the HTTP transport and configured sink
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `cancel` - Stop request token
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Crawl finished and its records were saved
/// * `Err(HarvestError)` - Crawl failed; collected records were saved on a best-effort basis
///
/// # Example
///
/// ```no_run
/// use exhibitor_harvest::config::Config;
/// use exhibitor_harvest::crawler::run_crawl;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stats = run_crawl(Config::default(), CancellationToken::new()).await?;
/// println!("{} new companies", stats.records_kept);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, cancel: CancellationToken) -> Result<CrawlStatistics> {
    let mut coordinator = Coordinator::new(config, cancel)?;
    coordinator.run().await
}
