use crate::config::SiteConfig;
use crate::UrlError;
use url::Url;

/// Placeholder replaced by the listing page number
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Placeholder replaced by the percent-encoded entity identifier
pub const SLUG_PLACEHOLDER: &str = "{slug}";

/// Listing and detail URL templates of the target site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplates {
    listing: String,
    detail: String,
}

impl UrlTemplates {
    /// Checks both templates and wraps them
    ///
    /// The listing template must contain `{page}`; the detail template must
    /// contain `{slug}` and may contain `{page}`. Both must render to an
    /// absolute http(s) URL.
    pub fn new(listing: &str, detail: &str) -> Result<Self, UrlError> {
        if !listing.contains(PAGE_PLACEHOLDER) {
            return Err(UrlError::MissingPlaceholder {
                template: listing.to_string(),
                placeholder: PAGE_PLACEHOLDER,
            });
        }

        if !detail.contains(SLUG_PLACEHOLDER) {
            return Err(UrlError::MissingPlaceholder {
                template: detail.to_string(),
                placeholder: SLUG_PLACEHOLDER,
            });
        }

        let templates = Self {
            listing: listing.to_string(),
            detail: detail.to_string(),
        };

        check_rendered(&templates.listing_url(1))?;
        check_rendered(&templates.detail_url("example", 1))?;

        Ok(templates)
    }

    /// Builds the templates from the site section of the configuration
    pub fn from_config(site: &SiteConfig) -> Result<Self, UrlError> {
        Self::new(&site.listing_url_template, &site.detail_url_template)
    }

    /// Renders the listing page URL for `page`
    pub fn listing_url(&self, page: u32) -> String {
        self.listing.replace(PAGE_PLACEHOLDER, &page.to_string())
    }

    /// Renders the detail page URL for `slug`, discovered on listing page `page`
    pub fn detail_url(&self, slug: &str, page: u32) -> String {
        self.detail
            .replace(SLUG_PLACEHOLDER, &encode_slug(slug))
            .replace(PAGE_PLACEHOLDER, &page.to_string())
    }
}

/// Percent-encodes a slug, keeping `/` separators intact
pub fn encode_slug(slug: &str) -> String {
    slug.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn check_rendered(rendered: &str) -> Result<(), UrlError> {
    let url = Url::parse(rendered).map_err(|e| UrlError::Parse(format!("{}: {}", rendered, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(UrlError::InvalidScheme(other.to_string())),
    }
}
