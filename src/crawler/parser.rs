//! HTML parser for listing and detail pages
//!
//! This module handles parsing HTML content to extract:
//! - Entity references (identifier and stand) from listing pages
//! - Company fields from detail pages
//! - Whether a listing page has any entries at all
//!
//! Missing elements never fail a parse; they yield empty values.

use crate::config::{ExtractConfig, SelectorConfig};
use crate::storage::CompanyRecord;
use crate::url::is_external_link;
use crate::ConfigError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;

/// An entity found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReference {
    /// Slug naming the entity's detail page
    pub identifier: String,
    /// Stand label from the listing block, empty if absent
    pub stand: String,
}

/// Fields extracted from one detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFields {
    pub name: String,
    pub tags: Vec<String>,
    pub overview: String,
    pub external_link: String,
}

impl DetailFields {
    /// Combines the detail fields with the listing data into a record
    pub fn into_record(self, reference: &EntityReference, detail_url: String) -> CompanyRecord {
        CompanyRecord {
            name: self.name,
            identifier: reference.identifier.clone(),
            detail_url,
            stand: reference.stand.clone(),
            tags: self.tags,
            overview: self.overview,
            website: self.external_link,
        }
    }
}

/// Compiled selectors and patterns for one target site
#[derive(Debug, Clone)]
pub struct Extractor {
    listing_container: Selector,
    listing_link: Selector,
    listing_stand: Selector,
    title: Selector,
    categories: Selector,
    description: Selector,
    anchor: Selector,
    identifier_pattern: Regex,
    stand_prefix: String,
    site_domain: String,
}

impl Extractor {
    /// Compiles the configured selectors
    ///
    /// # Arguments
    ///
    /// * `selectors` - CSS selectors for listing and detail pages
    /// * `extract` - Identifier prefix and stand label
    /// * `site_domain` - Host of the target site; links to it are never the website
    ///
    /// # Returns
    ///
    /// * `Ok(Extractor)` - Every selector and the identifier pattern compiled
    /// * `Err(ConfigError)` - A selector or the pattern is invalid
    pub fn new(
        selectors: &SelectorConfig,
        extract: &ExtractConfig,
        site_domain: &str,
    ) -> Result<Self, ConfigError> {
        let prefix = extract.identifier_prefix.trim_matches('/');
        let identifier_pattern = Regex::new(&format!("'{}/([^']+)'", regex::escape(prefix)))
            .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;

        Ok(Self {
            listing_container: compile(&selectors.listing_container)?,
            listing_link: compile(&selectors.listing_link)?,
            listing_stand: compile(&selectors.listing_stand)?,
            title: compile(&selectors.title)?,
            categories: compile(&selectors.categories)?,
            description: compile(&selectors.description)?,
            anchor: compile("a[href]")?,
            identifier_pattern,
            stand_prefix: extract.stand_prefix.clone(),
            site_domain: site_domain.to_lowercase(),
        })
    }

    /// Extracts entity references from a listing page
    ///
    /// Each container contributes at most one reference: the first link whose
    /// `href` embeds `'<prefix>/<identifier>'`. Containers without such a
    /// link are skipped. References are de-duplicated by identifier in
    /// first-seen order.
    pub fn parse_listing(&self, html: &str) -> Vec<EntityReference> {
        let document = Html::parse_document(html);
        let mut references = Vec::new();
        let mut seen = HashSet::new();
        let mut duplicates = 0usize;

        for container in document.select(&self.listing_container) {
            let identifier = match container
                .select(&self.listing_link)
                .find_map(|link| self.identifier_from(link))
            {
                Some(identifier) => identifier,
                None => continue,
            };

            if !seen.insert(identifier.clone()) {
                duplicates += 1;
                continue;
            }

            let stand = container
                .select(&self.listing_stand)
                .next()
                .map(|element| self.strip_stand_prefix(&element_text(element)))
                .unwrap_or_default();

            references.push(EntityReference { identifier, stand });
        }

        if duplicates > 0 {
            debug!(
                dropped = duplicates,
                kept = references.len(),
                "Dropped duplicate identifiers from listing"
            );
        }

        references
    }

    /// Extracts company fields from a detail page
    pub fn parse_detail(&self, html: &str) -> DetailFields {
        let document = Html::parse_document(html);

        let name = document
            .select(&self.title)
            .next()
            .map(element_text)
            .unwrap_or_default();

        let tags = document
            .select(&self.categories)
            .map(element_text)
            .filter(|tag| !tag.is_empty())
            .collect();

        let overview = document
            .select(&self.description)
            .next()
            .map(|element| element_text(element).replace(['\r', '\n'], " "))
            .unwrap_or_default();

        let external_link = document
            .select(&self.anchor)
            .filter_map(|anchor| anchor.value().attr("href"))
            .map(str::trim)
            .find(|href| is_external_link(href, &self.site_domain))
            .map(str::to_string)
            .unwrap_or_default();

        DetailFields {
            name,
            tags,
            overview,
            external_link,
        }
    }

    /// Returns true if the page has at least one entity link
    pub fn has_more(&self, html: &str) -> bool {
        let document = Html::parse_document(html);
        let found = document
            .select(&self.listing_link)
            .any(|link| self.identifier_from(link).is_some());
        found
    }

    fn identifier_from(&self, link: ElementRef<'_>) -> Option<String> {
        let href = link.value().attr("href")?;
        self.identifier_pattern
            .captures(href)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn strip_stand_prefix(&self, text: &str) -> String {
        if self.stand_prefix.is_empty() {
            return text.to_string();
        }
        match text.strip_prefix(self.stand_prefix.as_str()) {
            Some(rest) => rest.trim().to_string(),
            None => text.to_string(),
        }
    }
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {}", selector, e)))
}

/// Concatenated text of an element, trimmed
fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
