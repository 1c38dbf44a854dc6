//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! crawl cycle end-to-end through the real HTTP transport and CSV sink.

use exhibitor_harvest::config::{Config, SchemaVariant};
use exhibitor_harvest::crawler::crawl;
use exhibitor_harvest::StopReason;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
///
/// Every delay is cut to a few milliseconds.
fn create_test_config(server: &MockServer, dir: &TempDir) -> Config {
    let base_url = server.uri();
    let mut config = Config::default();

    config.site.base_url = base_url.clone();
    config.site.listing_url_template = format!("{}/exhibitors?page={{page}}", base_url);
    config.site.detail_url_template =
        format!("{}/exhibitors-list/{{slug}}?page={{page}}", base_url);

    config.crawler.max_concurrent_tasks = 4;
    config.crawler.between_companies = 0;
    config.crawler.between_pages = 0;
    config.crawler.autosave_every = 0;

    config.http.max_retries = 2;
    config.http.retry_base_delay = 1;
    config.http.throttle_backoff = vec![5, 10];
    config.http.request_timeout = 5;
    config.http.connect_timeout = 5;

    config.output.csv_path = dir.path().join("companies.csv").display().to_string();
    config.output.backup_dir = dir.path().join("backups").display().to_string();
    config.output.log_path = dir.path().join("scraper.log").display().to_string();

    config
}

fn csv_path(config: &Config) -> PathBuf {
    PathBuf::from(&config.output.csv_path)
}

/// Listing page with one container per (slug, stand)
fn listing_page(entries: &[(&str, &str)]) -> String {
    let items: String = entries
        .iter()
        .map(|(slug, stand)| {
            format!(
                r#"<li class="m-exhibitors-list__items__item">
                     <a class="js-librarylink-entry" href="javascript:openRemoteModal('exhibitors-list/{}','ajax',{{}},'')">View</a>
                     <div class="m-exhibitors-list__items__item__header__meta__stand">Stand: {}</div>
                   </li>"#,
                slug, stand
            )
        })
        .collect();

    format!(
        r#"<html><body><ul class="m-exhibitors-list__items">{}</ul></body></html>"#,
        items
    )
}

fn detail_page(base_url: &str, name: &str, tags: &[&str], overview: &str, website: &str) -> String {
    let tags: String = tags
        .iter()
        .map(|t| {
            format!(
                r#"<li class="m-exhibitor-entry__item__header__categories__item">{}</li>"#,
                t
            )
        })
        .collect();

    format!(
        r#"<div class="m-exhibitor-entry">
             <h1 class="m-exhibitor-entry__item__header__title">{}</h1>
             <ul>{}</ul>
             <div class="m-exhibitor-entry__item__body__description">{}</div>
             <a href="{}/visit">Visit</a>
             <a href="{}">Website</a>
           </div>"#,
        name, tags, overview, base_url, website
    )
}

async fn mount_listing(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/exhibitors"))
        .and(query_param("page", page.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, slug: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/exhibitors-list/{}", slug).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Two listing pages with three companies; page 3 is not mounted (404)
async fn mount_two_page_site(server: &MockServer) {
    let base_url = server.uri();

    mount_listing(
        server,
        1,
        listing_page(&[("acme-corp", "S1-100"), ("globex", "N4-200")]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/exhibitors"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing_page(&[("initech", "OD-7")])),
        )
        .expect(1)
        .mount(server)
        .await;

    mount_detail(
        server,
        "acme-corp",
        detail_page(
            &base_url,
            "Acme Corp",
            &["Radar", "Avionics"],
            "Sensors\nfor every\r\nplatform",
            "https://acme.example/",
        ),
    )
    .await;
    mount_detail(
        server,
        "globex",
        detail_page(&base_url, "Globex", &["Naval"], "Ships", "https://globex.example/"),
    )
    .await;
    mount_detail(
        server,
        "initech",
        detail_page(&base_url, "Initech", &[], "Software", "https://initech.example/"),
    )
    .await;
}

fn read_rows(path: &PathBuf) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).expect("Failed to open output");
    let headers = reader
        .headers()
        .expect("Failed to read header")
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.expect("Bad row").iter().map(str::to_string).collect())
        .collect();
    (headers, rows)
}

#[tokio::test]
async fn test_full_crawl_two_pages() {
    let mock_server = MockServer::start().await;
    mount_two_page_site(&mock_server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server, &dir);
    let output = csv_path(&config);

    let stats = crawl(config, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(stats.stop_reason, Some(StopReason::Exhausted));
    assert_eq!(stats.pages_processed, 2);
    assert_eq!(stats.records_kept, 3);
    assert_eq!(stats.records_flushed, 3);
    assert_eq!(stats.failures, 0);

    let (headers, rows) = read_rows(&output);
    assert_eq!(
        headers,
        vec!["company_name", "slug_name", "url", "stand", "tags", "overview", "website"]
    );
    assert_eq!(rows.len(), 3);

    let acme = &rows[0];
    assert_eq!(acme[0], "Acme Corp");
    assert_eq!(acme[1], "acme-corp");
    assert_eq!(
        acme[2],
        format!("{}/exhibitors-list/acme-corp?page=1", mock_server.uri())
    );
    assert_eq!(acme[3], "S1-100");
    assert_eq!(acme[4], "Radar; Avionics");
    assert!(!acme[5].contains('\n') && !acme[5].contains('\r'));
    assert!(acme[5].starts_with("Sensors for every"));
    assert_eq!(acme[6], "https://acme.example/");

    let initech = &rows[2];
    assert_eq!(initech[0], "Initech");
    assert_eq!(initech[3], "OD-7");
    assert!(initech[2].ends_with("/exhibitors-list/initech?page=2"));
}

#[tokio::test]
async fn test_rerun_adds_no_duplicates() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_listing(
        &mock_server,
        1,
        listing_page(&[("acme-corp", "S1"), ("globex", "S2")]),
    )
    .await;
    mount_detail(
        &mock_server,
        "acme-corp",
        detail_page(&base_url, "Acme Corp", &[], "", "https://acme.example/"),
    )
    .await;
    mount_detail(
        &mock_server,
        "globex",
        detail_page(&base_url, "Globex", &[], "", "https://globex.example/"),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server, &dir);
    let output = csv_path(&config);

    let first = crawl(config.clone(), CancellationToken::new())
        .await
        .expect("First crawl failed");
    assert_eq!(first.records_kept, 2);

    let second = crawl(config, CancellationToken::new())
        .await
        .expect("Second crawl failed");
    assert_eq!(second.historical_loaded, 2);
    assert_eq!(second.records_kept, 0);
    assert_eq!(second.duplicates_discarded, 2);
    assert_eq!(second.records_flushed, 0);

    let (_, rows) = read_rows(&output);
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_existing_output_is_appended() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_listing(
        &mock_server,
        1,
        listing_page(&[("acme-corp", "S1"), ("globex", "S2")]),
    )
    .await;
    mount_detail(
        &mock_server,
        "acme-corp",
        detail_page(&base_url, "ACME CORP", &[], "", ""),
    )
    .await;
    mount_detail(
        &mock_server,
        "globex",
        detail_page(&base_url, "Globex", &[], "", ""),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server, &dir);
    let output = csv_path(&config);
    std::fs::write(
        &output,
        "company_name,slug_name,url,stand,tags,overview,website\nAcme Corp,acme,,,,,\n",
    )
    .unwrap();

    let stats = crawl(config, CancellationToken::new()).await.unwrap();
    assert_eq!(stats.duplicates_discarded, 1);
    assert_eq!(stats.records_kept, 1);

    let content = std::fs::read_to_string(&output).unwrap();
    assert_eq!(content.matches("company_name").count(), 1);

    let (_, rows) = read_rows(&output);
    let names: Vec<_> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["Acme Corp", "Globex"]);
}

#[tokio::test]
async fn test_empty_listing_page_ends_crawl() {
    let mock_server = MockServer::start().await;

    mount_listing(
        &mock_server,
        1,
        "<html><body><p>No exhibitors match your search</p></body></html>".to_string(),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/exhibitors-list/acme-corp"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server, &dir);
    let output = csv_path(&config);

    let stats = crawl(config, CancellationToken::new()).await.unwrap();
    assert_eq!(stats.stop_reason, Some(StopReason::EmptyPage));
    assert_eq!(stats.pages_processed, 0);
    assert_eq!(stats.dispatched, 0);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_partial_detail_failures() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_listing(
        &mock_server,
        1,
        listing_page(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]),
    )
    .await;
    mount_detail(&mock_server, "a", detail_page(&base_url, "Alpha", &[], "", "")).await;
    mount_detail(&mock_server, "c", detail_page(&base_url, "Gamma", &[], "", "")).await;

    for slug in ["b", "d"] {
        Mock::given(method("GET"))
            .and(path(format!("/exhibitors-list/{}", slug).as_str()))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server, &dir);
    let output = csv_path(&config);

    let stats = crawl(config, CancellationToken::new()).await.unwrap();
    assert_eq!(stats.stop_reason, Some(StopReason::Exhausted));
    assert_eq!(stats.dispatched, 4);
    assert_eq!(stats.failures, 2);
    assert_eq!(stats.records_kept, 2);

    let (_, rows) = read_rows(&output);
    let names: Vec<_> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Gamma"]);
}

#[tokio::test]
async fn test_throttled_detail_is_retried() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_listing(&mock_server, 1, listing_page(&[("acme-corp", "S1")])).await;

    Mock::given(method("GET"))
        .and(path("/exhibitors-list/acme-corp"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/exhibitors-list/acme-corp"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(detail_page(&base_url, "Acme Corp", &[], "", "")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server, &dir);

    let stats = crawl(config, CancellationToken::new()).await.unwrap();
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.records_kept, 1);
}

#[tokio::test]
async fn test_persistent_soft_block_gives_up() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_listing(
        &mock_server,
        1,
        listing_page(&[("blocked", "S1"), ("open", "S2")]),
    )
    .await;
    mount_detail(&mock_server, "open", detail_page(&base_url, "Open Ltd", &[], "", "")).await;

    Mock::given(method("GET"))
        .and(path("/exhibitors-list/blocked"))
        .respond_with(ResponseTemplate::new(405))
        .expect(2)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server, &dir);

    let stats = crawl(config, CancellationToken::new()).await.unwrap();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.records_kept, 1);
}

#[tokio::test]
async fn test_requests_carry_ajax_headers() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/exhibitors"))
        .and(query_param("page", "1"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .and(header("accept", "*/*"))
        .and(header("referer", base_url.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing_page(&[("acme-corp", "S1")])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_detail(
        &mock_server,
        "acme-corp",
        detail_page(&base_url, "Acme Corp", &[], "", ""),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server, &dir);

    let stats = crawl(config, CancellationToken::new()).await.unwrap();
    assert_eq!(stats.records_kept, 1);
}

#[tokio::test]
async fn test_reduced_schema_and_page_limit() {
    let mock_server = MockServer::start().await;
    mount_two_page_site(&mock_server).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server, &dir);
    config.output.schema = SchemaVariant::Reduced;
    config.crawler.max_pages = Some(2);
    let output = csv_path(&config);

    let stats = crawl(config, CancellationToken::new()).await.unwrap();
    assert_eq!(stats.stop_reason, Some(StopReason::PageLimit));
    assert_eq!(stats.pages_processed, 2);

    let (headers, rows) = read_rows(&output);
    assert_eq!(headers, vec!["company_name", "tags", "overview", "website"]);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][1], "Radar; Avionics");
}

#[tokio::test]
async fn test_autosave_snapshot_written() {
    let mock_server = MockServer::start().await;
    mount_two_page_site(&mock_server).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server, &dir);
    config.crawler.autosave_every = 2;
    let backup_dir = PathBuf::from(&config.output.backup_dir);

    let stats = crawl(config, CancellationToken::new()).await.unwrap();
    assert_eq!(stats.snapshots_written, 1);

    let backups: Vec<_> = std::fs::read_dir(&backup_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(backups.len(), 1);

    let (_, rows) = read_rows(&backups[0]);
    assert_eq!(rows.len(), 3);
}
