//! CSV column layout
//!
//! Both layouts start with `company_name`, which is the column read back
//! when a later run rebuilds its ledger.

use crate::config::SchemaVariant;
use crate::storage::CompanyRecord;

pub const COL_COMPANY_NAME: &str = "company_name";
pub const COL_SLUG_NAME: &str = "slug_name";
pub const COL_URL: &str = "url";
pub const COL_STAND: &str = "stand";
pub const COL_TAGS: &str = "tags";
pub const COL_OVERVIEW: &str = "overview";
pub const COL_WEBSITE: &str = "website";

/// Separator used to flatten the tag list into one field
pub const TAG_SEPARATOR: &str = "; ";

const DETAILED_COLUMNS: &[&str] = &[
    COL_COMPANY_NAME,
    COL_SLUG_NAME,
    COL_URL,
    COL_STAND,
    COL_TAGS,
    COL_OVERVIEW,
    COL_WEBSITE,
];

const REDUCED_COLUMNS: &[&str] = &[COL_COMPANY_NAME, COL_TAGS, COL_OVERVIEW, COL_WEBSITE];

/// Returns the header row for a layout
pub fn columns(variant: SchemaVariant) -> &'static [&'static str] {
    match variant {
        SchemaVariant::Detailed => DETAILED_COLUMNS,
        SchemaVariant::Reduced => REDUCED_COLUMNS,
    }
}

/// Returns the fields of one record in header order
pub fn row(record: &CompanyRecord, variant: SchemaVariant) -> Vec<String> {
    match variant {
        SchemaVariant::Detailed => vec![
            record.name.clone(),
            record.identifier.clone(),
            record.detail_url.clone(),
            record.stand.clone(),
            record.tags_joined(),
            record.overview.clone(),
            record.website.clone(),
        ],
        SchemaVariant::Reduced => vec![
            record.name.clone(),
            record.tags_joined(),
            record.overview.clone(),
            record.website.clone(),
        ],
    }
}
