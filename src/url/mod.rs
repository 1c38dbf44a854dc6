//! URL handling module
//!
//! This module renders listing and detail URLs from the configured templates
//! and decides whether a link stays on the target site.

mod domain;
mod template;

pub use domain::{extract_domain, is_external_link, is_same_site, site_domain};
pub use template::{encode_slug, UrlTemplates, PAGE_PLACEHOLDER, SLUG_PLACEHOLDER};

