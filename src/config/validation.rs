use crate::config::types::{
    Config, CrawlerConfig, ExtractConfig, HttpConfig, OutputConfig, SelectorConfig, SiteConfig,
};
use crate::url::UrlTemplates;
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_http_config(&config.http)?;
    validate_selector_config(&config.selectors)?;
    validate_extract_config(&config.extract)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the target site description
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if base.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' has no host",
            config.base_url
        )));
    }

    UrlTemplates::new(&config.listing_url_template, &config.detail_url_template)
        .map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;

    Ok(())
}

/// Validates crawl scheduling settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_tasks < 1 || config.max_concurrent_tasks > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-tasks must be between 1 and 100, got {}",
            config.max_concurrent_tasks
        )));
    }

    if config.start_page < 1 {
        return Err(ConfigError::Validation(
            "start-page must be >= 1".to_string(),
        ));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates HTTP transport settings
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout == 0 || config.connect_timeout == 0 {
        return Err(ConfigError::Validation(
            "request-timeout and connect-timeout must be >= 1 second".to_string(),
        ));
    }

    if config.max_retries < 1 || config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be between 1 and 10, got {}",
            config.max_retries
        )));
    }

    if config.throttle_backoff.is_empty() {
        return Err(ConfigError::Validation(
            "throttle-backoff needs at least one entry".to_string(),
        ));
    }

    if let Some(status) = config
        .throttle_statuses
        .iter()
        .find(|status| !(400..600).contains(*status))
    {
        return Err(ConfigError::Validation(format!(
            "throttle-statuses must be 4xx or 5xx codes, got {}",
            status
        )));
    }

    Ok(())
}

/// Validates that every selector parses
fn validate_selector_config(config: &SelectorConfig) -> Result<(), ConfigError> {
    for (name, selector) in [
        ("listing-container", &config.listing_container),
        ("listing-link", &config.listing_link),
        ("listing-stand", &config.listing_stand),
        ("title", &config.title),
        ("categories", &config.categories),
        ("description", &config.description),
    ] {
        validate_selector(name, selector)?;
    }
    Ok(())
}

fn validate_selector(name: &str, selector: &str) -> Result<(), ConfigError> {
    if selector.trim().is_empty() {
        return Err(ConfigError::InvalidSelector(format!(
            "{} selector cannot be empty",
            name
        )));
    }

    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("{} '{}': {}", name, selector, e)))?;

    Ok(())
}

fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    let prefix = config.identifier_prefix.trim_matches('/');
    if prefix.is_empty() || prefix.contains('\'') {
        return Err(ConfigError::Validation(format!(
            "identifier-prefix must be a non-empty path without quotes, got '{}'",
            config.identifier_prefix
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.csv_path.is_empty() {
        return Err(ConfigError::Validation(
            "csv-path cannot be empty".to_string(),
        ));
    }

    if config.backup_prefix.is_empty() {
        return Err(ConfigError::Validation(
            "backup-prefix cannot be empty".to_string(),
        ));
    }

    if config.backup_prefix.contains('/') || config.backup_prefix.contains('\\') {
        return Err(ConfigError::Validation(format!(
            "backup-prefix must be a file name, got '{}'",
            config.backup_prefix
        )));
    }

    Ok(())
}
