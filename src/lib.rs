use std::time::Duration;
use thiserror::Error;

pub mod chatbot;
pub mod config;
pub mod crawler;
pub mod curated;
pub mod links;
pub mod output;
pub mod scraper;
pub mod targeted;
pub mod text;
pub mod types;

// Re-export commonly used types
pub use crate::config::{HarvesterConfig, SeedGroup};
pub use crate::crawler::Harvester;
pub use crate::targeted::{ArticleSource, DigestSource};
pub use crate::types::{Category, ScrapedRecord};

/// The `HarvestError` enum represents the errors that can occur while harvesting or smoke testing.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Represents an error that occurs during an HTTP request.
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Represents a URL that could not be parsed or resolved.
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// Represents an error that occurs during content extraction.
    #[error("Content extraction failed: {0}")]
    ExtractionError(String),
    /// Represents a filesystem error while writing output or reading payloads.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// Represents a JSON (de)serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    /// Represents an error that occurs while loading configuration.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ::config::ConfigError),
}

/// A type alias for `Result` with the `HarvestError` error type.
pub type Result<T> = std::result::Result<T, HarvestError>;

// Constants

/// The default timeout duration for crawl requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// The default pause between consecutive crawl requests.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(2);
/// The default number of link hops followed from a seed.
pub const DEFAULT_MAX_DEPTH: u32 = 2;
/// The default minimum number of characters a page must yield to be kept.
pub const DEFAULT_MIN_CONTENT_LENGTH: usize = 200;
/// The default number of relevant links followed per page.
pub const DEFAULT_MAX_LINKS_PER_PAGE: usize = 5;
