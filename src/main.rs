//! Exhibitor Harvest main entry point
//!
//! This is the command-line interface for the exhibitor directory harvester.

use anyhow::Context;
use clap::Parser;
use exhibitor_harvest::config::{load_config_with_hash, validate, Config, ExecutionMode};
use exhibitor_harvest::crawler::crawl;
use exhibitor_harvest::output::{load_file_statistics, print_file_statistics, print_statistics};
use exhibitor_harvest::url::UrlTemplates;
use exhibitor_harvest::StopReason;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Exit status after a stop request
const EXIT_INTERRUPTED: u8 = 130;

/// Exhibitor Harvest: a polite exhibitor directory crawler
///
/// Walks the paginated exhibitor listing, fetches every exhibitor's detail
/// page under a concurrency cap and appends new companies to a CSV file.
/// Companies already present in that file are skipped, so interrupted runs
/// can simply be started again.
#[derive(Parser, Debug)]
#[command(name = "exhibitor-harvest")]
#[command(version = "1.0.0")]
#[command(about = "Harvests an exhibitor directory into CSV", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// First listing page to fetch
    #[arg(long, value_name = "PAGE")]
    start_page: Option<u32>,

    /// Maximum number of listing pages to process
    #[arg(long, value_name = "COUNT")]
    max_pages: Option<u32>,

    /// Output CSV file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Maximum number of detail pages fetched at once
    #[arg(long, value_name = "COUNT")]
    max_tasks: Option<u32>,

    /// Fetch detail pages one at a time
    #[arg(long)]
    sequential: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics of the existing output file and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, config_hash) = match load_effective_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            setup_logging(cli.verbose, cli.quiet, None);
            tracing::error!("Failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = if cli.dry_run {
        setup_logging(cli.verbose, cli.quiet, None);
        handle_dry_run(&config)
    } else if cli.stats {
        setup_logging(cli.verbose, cli.quiet, None);
        handle_stats(&config)
    } else {
        setup_logging(cli.verbose, cli.quiet, Some(Path::new(&config.output.log_path)));
        tracing::info!("Configuration loaded (hash: {})", config_hash);
        handle_crawl(config).await
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Loads the configuration file (or defaults) and applies command-line overrides
fn load_effective_config(cli: &Cli) -> anyhow::Result<(Config, String)> {
    let (mut config, hash) = match &cli.config {
        Some(path) => load_config_with_hash(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => (Config::default(), "built-in defaults".to_string()),
    };

    if let Some(page) = cli.start_page {
        config.crawler.start_page = page;
    }
    if let Some(max) = cli.max_pages {
        config.crawler.max_pages = Some(max);
    }
    if let Some(output) = &cli.output {
        config.output.csv_path = output.display().to_string();
    }
    if let Some(tasks) = cli.max_tasks {
        config.crawler.max_concurrent_tasks = tasks;
    }
    if cli.sequential {
        config.crawler.mode = ExecutionMode::Sequential;
    }

    validate(&config).context("Invalid command-line override")?;

    Ok((config, hash))
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// With a log path, a second plain-text layer mirrors console output into
/// that file.
fn setup_logging(verbose: u8, quiet: bool, log_path: Option<&Path>) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("exhibitor_harvest=info,warn"),
            1 => EnvFilter::new("exhibitor_harvest=debug,info"),
            2 => EnvFilter::new("exhibitor_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let mut file_error = None;
    let file_layer = log_path.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        ),
        Err(e) => {
            file_error = Some(format!("{}: {}", path.display(), e));
            None
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false),
        )
        .with(file_layer)
        .init();

    if let Some(error) = file_error {
        tracing::warn!("Could not open log file {}, logging to console only", error);
    }
}

fn open_log_file(path: &Path) -> std::io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<ExitCode> {
    let templates = UrlTemplates::from_config(&config.site)?;

    println!("=== Exhibitor Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!(
        "  First listing page: {}",
        templates.listing_url(config.crawler.start_page)
    );
    println!(
        "  Example detail page: {}",
        templates.detail_url("example-company", config.crawler.start_page)
    );

    println!("\nCrawler Configuration:");
    println!("  Mode: {:?}", config.crawler.mode);
    println!(
        "  Max concurrent tasks: {}",
        config.crawler.max_concurrent_tasks
    );
    println!("  Start page: {}", config.crawler.start_page);
    match config.crawler.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: unlimited"),
    }
    println!("  Between companies: {}ms", config.crawler.between_companies);
    println!("  Between pages: {}ms", config.crawler.between_pages);
    println!("  Autosave every: {} pages", config.crawler.autosave_every);

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.http.request_timeout, config.http.connect_timeout
    );
    println!("  Attempts per request: {}", config.http.max_retries);
    println!(
        "  Throttle statuses: {:?}, waits {:?}ms",
        config.http.throttle_statuses, config.http.throttle_backoff
    );

    println!("\nOutput:");
    println!("  CSV: {} ({:?})", config.output.csv_path, config.output.schema);
    println!(
        "  Backups: {}/{}_<timestamp>.csv",
        config.output.backup_dir, config.output.backup_prefix
    );
    println!("  Log: {}", config.output.log_path);

    println!("\n✓ Configuration is valid");

    Ok(ExitCode::SUCCESS)
}

/// Handles the --stats mode: summarises the existing output file
fn handle_stats(config: &Config) -> anyhow::Result<ExitCode> {
    let path = Path::new(&config.output.csv_path);
    let stats = load_file_statistics(path, 10)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    print_file_statistics(&stats);

    Ok(ExitCode::SUCCESS)
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<ExitCode> {
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let stats = crawl(config, cancel).await.context("Crawl failed")?;
    print_statistics(&stats);

    if stats.stop_reason == Some(StopReason::StopRequested) {
        tracing::info!("Crawl stopped on request, collected data was saved");
        Ok(ExitCode::from(EXIT_INTERRUPTED))
    } else {
        tracing::info!("Crawl completed successfully");
        Ok(ExitCode::SUCCESS)
    }
}

/// Cancels `token` on Ctrl+C or SIGTERM
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::warn!("Stop requested, finishing the current batch before saving");
        token.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Could not listen for SIGTERM: {}", e);
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    ctrl_c().await;
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
