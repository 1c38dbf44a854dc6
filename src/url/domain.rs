use crate::UrlError;
use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use exhibitor_harvest::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Derives the registrable site domain from the configured base URL
///
/// A leading `www.` is dropped so that both `www.` and bare hosts, as well as
/// any other subdomain, count as the target site.
///
/// # Examples
///
/// ```
/// use exhibitor_harvest::url::site_domain;
///
/// assert_eq!(site_domain("https://www.dsei.co.uk").unwrap(), "dsei.co.uk");
/// ```
pub fn site_domain(base_url: &str) -> Result<String, UrlError> {
    let url = Url::parse(base_url).map_err(|e| UrlError::Parse(e.to_string()))?;
    let host = extract_domain(&url).ok_or(UrlError::MissingDomain)?;

    Ok(host
        .strip_prefix("www.")
        .map(str::to_string)
        .unwrap_or(host))
}

/// Returns true if `host` is the site domain itself or one of its subdomains
pub fn is_same_site(site_domain: &str, host: &str) -> bool {
    let host = host.to_lowercase();
    host == site_domain || host.ends_with(&format!(".{}", site_domain))
}

/// Returns true if `href` is an absolute http(s) link leaving the target site
pub fn is_external_link(href: &str, site_domain: &str) -> bool {
    let href = href.trim();
    if !(href.starts_with("http://") || href.starts_with("https://")) {
        return false;
    }

    match Url::parse(href).ok().as_ref().and_then(extract_domain) {
        Some(host) => !is_same_site(site_domain, &host),
        None => false,
    }
}
