//! Hand-written documents bundled with the binary.
//!
//! They need no network access and always succeed, so a run never ends with an empty dataset.

use crate::types::{Category, ScrapedRecord};

/// The URL recorded for bundled documents.
pub const CURATED_URL: &str = "curated";

/// Title and body of every bundled document, in output order.
pub const CURATED_DOCUMENTS: [(&str, &str); 2] = [
    (
        "Comprehensive Sugarcane Cultivation Practices",
        include_str!("curated/cultivation_practices.txt"),
    ),
    (
        "Sugarcane Disease Identification and Management Guide",
        include_str!("curated/disease_management.txt"),
    ),
];

/// Returns the bundled documents as `general` records.
pub fn curated_records() -> Vec<ScrapedRecord> {
    CURATED_DOCUMENTS
        .iter()
        .map(|(title, content)| {
            ScrapedRecord::new(CURATED_URL, *title, content.trim(), Category::General)
        })
        .collect()
}
