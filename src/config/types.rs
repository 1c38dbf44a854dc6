use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the exhibitor harvester
///
/// Every section falls back to the built-in defaults, so an empty file
/// describes a working crawl of the DSEI exhibitor directory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Target site description
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Root of the target site; its host marks links as internal
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Listing page URL, parameterised by `{page}`
    #[serde(rename = "listing-url-template", default = "default_listing_template")]
    pub listing_url_template: String,

    /// Detail page URL, parameterised by `{slug}` and optionally `{page}`
    #[serde(rename = "detail-url-template", default = "default_detail_template")]
    pub detail_url_template: String,
}

/// How detail pages of one listing page are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// All detail fetches of a page run together under the global semaphore
    #[default]
    Concurrent,
    /// One detail fetch at a time with `between-companies` pauses
    Sequential,
}

/// Crawl scheduling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of detail fetches in flight across the whole run
    #[serde(rename = "max-concurrent-tasks", default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: u32,

    #[serde(default)]
    pub mode: ExecutionMode,

    /// First listing page to fetch
    #[serde(rename = "start-page", default = "default_start_page")]
    pub start_page: u32,

    /// Optional ceiling on the number of listing pages processed
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Pause between detail fetches in sequential mode (milliseconds)
    #[serde(rename = "between-companies", default = "default_between_companies")]
    pub between_companies: u64,

    /// Pause between listing pages (milliseconds)
    #[serde(rename = "between-pages", default = "default_between_pages")]
    pub between_pages: u64,

    /// Write a backup snapshot after this many processed pages (0 disables)
    #[serde(rename = "autosave-every", default = "default_autosave_every")]
    pub autosave_every: u32,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Total request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout", default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Idle pooled connections kept per host
    #[serde(rename = "pool-size", default = "default_pool_size")]
    pub pool_size: usize,

    /// Attempts per request, including the first one
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Unit of the exponential backoff for generic failures (milliseconds)
    #[serde(rename = "retry-base-delay", default = "default_retry_base_delay")]
    pub retry_base_delay: u64,

    /// Escalating waits after throttling responses (milliseconds)
    #[serde(rename = "throttle-backoff", default = "default_throttle_backoff")]
    pub throttle_backoff: Vec<u64>,

    /// Status codes the site uses to ask clients to slow down
    #[serde(rename = "throttle-statuses", default = "default_throttle_statuses")]
    pub throttle_statuses: Vec<u16>,
}

/// CSS selectors used by the extractor
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    #[serde(rename = "listing-container", default = "default_listing_container")]
    pub listing_container: String,

    #[serde(rename = "listing-link", default = "default_listing_link")]
    pub listing_link: String,

    #[serde(rename = "listing-stand", default = "default_listing_stand")]
    pub listing_stand: String,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_categories")]
    pub categories: String,

    #[serde(default = "default_description")]
    pub description: String,
}

/// Text patterns used by the extractor
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// Path prefix in front of the slug inside quoted link references
    #[serde(rename = "identifier-prefix", default = "default_identifier_prefix")]
    pub identifier_prefix: String,

    /// Literal label stripped from stand texts
    #[serde(rename = "stand-prefix", default = "default_stand_prefix")]
    pub stand_prefix: String,
}

/// Column layout of the output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVariant {
    /// `company_name, slug_name, url, stand, tags, overview, website`
    #[default]
    Detailed,
    /// `company_name, tags, overview, website`
    Reduced,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Main CSV file, appended to across runs
    #[serde(rename = "csv-path", default = "default_csv_path")]
    pub csv_path: String,

    #[serde(default)]
    pub schema: SchemaVariant,

    /// Directory receiving timestamped backup snapshots
    #[serde(rename = "backup-dir", default = "default_backup_dir")]
    pub backup_dir: String,

    #[serde(rename = "backup-prefix", default = "default_backup_prefix")]
    pub backup_prefix: String,

    /// Plain-text log file written next to console output
    #[serde(rename = "log-path", default = "default_log_path")]
    pub log_path: String,
}

impl CrawlerConfig {
    pub fn between_companies(&self) -> Duration {
        Duration::from_millis(self.between_companies)
    }

    pub fn between_pages(&self) -> Duration {
        Duration::from_millis(self.between_pages)
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            listing_url_template: default_listing_template(),
            detail_url_template: default_detail_template(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            mode: ExecutionMode::default(),
            start_page: default_start_page(),
            max_pages: None,
            between_companies: default_between_companies(),
            between_pages: default_between_pages(),
            autosave_every: default_autosave_every(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            pool_size: default_pool_size(),
            max_retries: default_max_retries(),
            retry_base_delay: default_retry_base_delay(),
            throttle_backoff: default_throttle_backoff(),
            throttle_statuses: default_throttle_statuses(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing_container: default_listing_container(),
            listing_link: default_listing_link(),
            listing_stand: default_listing_stand(),
            title: default_title(),
            categories: default_categories(),
            description: default_description(),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            identifier_prefix: default_identifier_prefix(),
            stand_prefix: default_stand_prefix(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            schema: SchemaVariant::default(),
            backup_dir: default_backup_dir(),
            backup_prefix: default_backup_prefix(),
            log_path: default_log_path(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.dsei.co.uk".to_string()
}

fn default_listing_template() -> String {
    "https://www.dsei.co.uk/visit/exhibiting-companies?&page={page}&searchgroup=65207D8C-exhibitors-list"
        .to_string()
}

fn default_detail_template() -> String {
    "https://www.dsei.co.uk/exhibitors-list/{slug}?=&page={page}&searchgroup=libraryentry-exhibitors-list"
        .to_string()
}

fn default_max_concurrent_tasks() -> u32 {
    15
}

fn default_start_page() -> u32 {
    1
}

fn default_between_companies() -> u64 {
    200
}

fn default_between_pages() -> u64 {
    1000
}

fn default_autosave_every() -> u32 {
    5
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:142.0) Gecko/20100101 Firefox/142.0"
        .to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_pool_size() -> usize {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_throttle_backoff() -> Vec<u64> {
    vec![30_000, 60_000, 90_000]
}

fn default_throttle_statuses() -> Vec<u16> {
    vec![405, 429]
}

fn default_listing_container() -> String {
    "li.m-exhibitors-list__items__item".to_string()
}

fn default_listing_link() -> String {
    "a.js-librarylink-entry".to_string()
}

fn default_listing_stand() -> String {
    "div.m-exhibitors-list__items__item__header__meta__stand".to_string()
}

fn default_title() -> String {
    "h1.m-exhibitor-entry__item__header__title".to_string()
}

fn default_categories() -> String {
    "li.m-exhibitor-entry__item__header__categories__item".to_string()
}

fn default_description() -> String {
    "div.m-exhibitor-entry__item__body__description".to_string()
}

fn default_identifier_prefix() -> String {
    "exhibitors-list".to_string()
}

fn default_stand_prefix() -> String {
    "Stand:".to_string()
}

fn default_csv_path() -> String {
    "data/processed/dsei_companies.csv".to_string()
}

fn default_backup_dir() -> String {
    "data/processed".to_string()
}

fn default_backup_prefix() -> String {
    "dsei_companies_backup".to_string()
}

fn default_log_path() -> String {
    "logs/scraper.log".to_string()
}
