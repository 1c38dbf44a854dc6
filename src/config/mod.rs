//! Configuration module for the exhibitor harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a built-in default, so a missing file still yields a usable setup.
//!
//! # Example
//!
//! ```no_run
//! use exhibitor_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Listing template: {}", config.site.listing_url_template);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ExecutionMode, ExtractConfig, HttpConfig, OutputConfig,
    SchemaVariant, SelectorConfig, SiteConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
