//! Integration tests for batch scheduling and graceful stops
//!
//! A scripted transport stands in for the site so the tests can observe
//! how many detail fetches overlap and exactly which pages get requested.

use async_trait::async_trait;
use exhibitor_harvest::config::{Config, ExecutionMode, SchemaVariant};
use exhibitor_harvest::crawler::{Coordinator, FetchResult, Transport};
use exhibitor_harvest::{CsvSink, StopReason};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const BASE: &str = "http://expo.test";

/// Transport serving scripted pages and recording fetch overlap
struct ScriptedTransport {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    /// Cancelled on the first detail fetch, when set
    stop_on_detail: Option<CancellationToken>,
    detail_delay: Duration,
}

impl ScriptedTransport {
    fn new(pages: HashMap<String, String>) -> Self {
        Self {
            pages,
            requested: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            stop_on_detail: None,
            detail_delay: Duration::from_millis(15),
        }
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn detail_requests(&self) -> usize {
        self.requested()
            .iter()
            .filter(|url| url.contains("/exhibitors-list/"))
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, url: &str) -> FetchResult {
        self.requested.lock().unwrap().push(url.to_string());

        if url.contains("/exhibitors-list/") {
            if let Some(token) = &self.stop_on_detail {
                token.cancel();
            }

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.detail_delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        match self.pages.get(url) {
            Some(body) => FetchResult::Success {
                final_url: url.to_string(),
                status_code: 200,
                body: body.clone(),
            },
            None => FetchResult::HttpError {
                status_code: 404,
                attempts: 1,
            },
        }
    }
}

fn test_config(dir: &TempDir, max_tasks: u32) -> Config {
    let mut config = Config::default();
    config.site.base_url = BASE.to_string();
    config.site.listing_url_template = format!("{}/list?page={{page}}", BASE);
    config.site.detail_url_template = format!("{}/exhibitors-list/{{slug}}", BASE);
    config.crawler.max_concurrent_tasks = max_tasks;
    config.crawler.between_pages = 0;
    config.crawler.between_companies = 0;
    config.crawler.autosave_every = 0;
    config.output.csv_path = dir.path().join("out.csv").display().to_string();
    config.output.backup_dir = dir.path().join("backups").display().to_string();
    config
}

fn list_url(page: u32) -> String {
    format!("{}/list?page={}", BASE, page)
}

fn detail_url(slug: &str) -> String {
    format!("{}/exhibitors-list/{}", BASE, slug)
}

/// Builds a site of `pages` listing pages with `per_page` companies each
fn scripted_site(pages: u32, per_page: u32) -> HashMap<String, String> {
    let mut site = HashMap::new();

    for page in 1..=pages {
        let mut listing = String::new();
        for n in 0..per_page {
            let slug = format!("company-{}-{}", page, n);
            listing.push_str(&format!(
                r#"<li class="m-exhibitors-list__items__item"><a class="js-librarylink-entry" href="javascript:openRemoteModal('exhibitors-list/{}','ajax')">x</a></li>"#,
                slug
            ));
            site.insert(
                detail_url(&slug),
                format!(
                    r#"<h1 class="m-exhibitor-entry__item__header__title">Company {} {}</h1>"#,
                    page, n
                ),
            );
        }
        site.insert(list_url(page), listing);
    }

    site
}

fn coordinator(
    config: Config,
    transport: Arc<ScriptedTransport>,
    cancel: CancellationToken,
) -> Coordinator {
    let sink = CsvSink::new(&config.output.csv_path, SchemaVariant::Detailed);
    Coordinator::with_transport(config, transport, Box::new(sink), cancel).unwrap()
}

fn csv_rows(dir: &TempDir) -> usize {
    let mut reader = csv::Reader::from_path(dir.path().join("out.csv")).unwrap();
    reader.records().count()
}

#[tokio::test]
async fn test_concurrency_never_exceeds_bound() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new(scripted_site(3, 6)));
    let mut coordinator = coordinator(
        test_config(&dir, 2),
        Arc::clone(&transport),
        CancellationToken::new(),
    );

    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.stop_reason, Some(StopReason::Exhausted));
    assert_eq!(stats.dispatched, 18);
    assert_eq!(stats.records_kept, 18);
    assert_eq!(transport.peak.load(Ordering::SeqCst), 2);
    assert_eq!(transport.in_flight.load(Ordering::SeqCst), 0);
    assert_eq!(csv_rows(&dir), 18);
}

#[tokio::test]
async fn test_bound_of_one_serialises_fetches() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new(scripted_site(2, 4)));
    let mut coordinator = coordinator(
        test_config(&dir, 1),
        Arc::clone(&transport),
        CancellationToken::new(),
    );

    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.records_kept, 8);
    assert_eq!(transport.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stop_mid_batch_drains_concurrent_batch() {
    let dir = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    let mut transport = ScriptedTransport::new(scripted_site(2, 4));
    transport.stop_on_detail = Some(cancel.clone());
    let transport = Arc::new(transport);

    let mut coordinator = coordinator(test_config(&dir, 2), Arc::clone(&transport), cancel);
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.stop_reason, Some(StopReason::StopRequested));
    assert_eq!(stats.pages_processed, 1);
    assert_eq!(stats.dispatched, 4);
    assert_eq!(stats.records_kept, 4);
    assert_eq!(stats.records_flushed, 4);

    // The next listing page is never requested
    assert!(!transport.requested().contains(&list_url(2)));
    assert_eq!(transport.detail_requests(), 4);
    assert_eq!(csv_rows(&dir), 4);
}

#[tokio::test]
async fn test_stop_mid_batch_in_sequential_mode() {
    let dir = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    let mut transport = ScriptedTransport::new(scripted_site(2, 4));
    transport.stop_on_detail = Some(cancel.clone());
    let transport = Arc::new(transport);

    let mut config = test_config(&dir, 4);
    config.crawler.mode = ExecutionMode::Sequential;

    let mut coordinator = coordinator(config, Arc::clone(&transport), cancel);
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.stop_reason, Some(StopReason::StopRequested));
    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.records_kept, 1);
    assert_eq!(transport.detail_requests(), 1);
    assert_eq!(csv_rows(&dir), 1);
}

#[tokio::test]
async fn test_stop_before_start_fetches_nothing() {
    let dir = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let transport = Arc::new(ScriptedTransport::new(scripted_site(1, 2)));

    let mut coordinator = coordinator(test_config(&dir, 2), Arc::clone(&transport), cancel);
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.stop_reason, Some(StopReason::StopRequested));
    assert!(transport.requested().is_empty());
    assert!(!dir.path().join("out.csv").exists());
}

#[tokio::test]
async fn test_permits_are_released_after_run() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new(scripted_site(1, 5)));
    let mut coordinator = coordinator(
        test_config(&dir, 3),
        Arc::clone(&transport),
        CancellationToken::new(),
    );

    let stats = coordinator.run().await.unwrap();
    assert_eq!(transport.in_flight.load(Ordering::SeqCst), 0);
    assert_eq!(stats.dispatched, 5);
}
