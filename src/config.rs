use crate::targeted::{default_article_sources, default_digest_sources, ArticleSource, DigestSource};
use crate::types::Category;
use crate::Result;
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "CANE_HARVEST";

/// The `HarvesterConfig` struct holds the configuration settings for a crawl run.
/// Every magic constant of the crawl (keywords, ignored tags, caps and limits) lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    /// The user agent string sent with every page request.
    pub user_agent: String,
    /// The per-request timeout, in seconds.
    pub timeout_secs: u64,
    /// The pause between consecutive requests, in milliseconds.
    pub request_delay_ms: u64,
    /// How many link hops are followed from each seed.
    pub max_depth: u32,
    /// The minimum number of characters a page must yield to become a record.
    pub min_content_length: usize,
    /// How many relevant links are followed per page.
    pub max_links_per_page: usize,
    /// Case-insensitive substrings that make a link worth following.
    pub relevance_keywords: Vec<String>,
    /// Elements whose whole subtree is ignored during extraction.
    pub ignored_tags: Vec<String>,
    /// Case-insensitive pattern matched against `div` classes and ids to find the content region.
    pub content_region_pattern: String,
    /// Whether the curated documents are appended to the output set.
    pub include_curated: bool,
    /// The directory the output tree is written to.
    pub output_dir: PathBuf,
    /// The seed URLs, grouped by category, in crawl order.
    pub seeds: Vec<SeedGroup>,
    /// Known-layout pages fetched after the crawl.
    pub article_sources: Vec<ArticleSource>,
    /// Portal pages digested into one record each, fetched after the article sources.
    pub digest_sources: Vec<DigestSource>,
}

/// A group of seed URLs sharing a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedGroup {
    /// The category inherited by every record reached from these seeds.
    pub category: Category,
    /// The seed URLs.
    pub urls: Vec<String>,
}

impl SeedGroup {
    pub fn new(category: Category, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            category,
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            user_agent: String::from(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
            ),
            timeout_secs: crate::DEFAULT_TIMEOUT.as_secs(),
            request_delay_ms: crate::DEFAULT_REQUEST_DELAY.as_millis() as u64,
            max_depth: crate::DEFAULT_MAX_DEPTH,
            min_content_length: crate::DEFAULT_MIN_CONTENT_LENGTH,
            max_links_per_page: crate::DEFAULT_MAX_LINKS_PER_PAGE,
            relevance_keywords: [
                "sugarcane",
                "cane",
                "farming",
                "cultivation",
                "crop",
                "pest",
                "disease",
                "fertilizer",
                "irrigation",
                "variety",
                "harvest",
                "management",
                "advisory",
                "practices",
                "guide",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            ignored_tags: ["script", "style", "nav", "footer", "header", "aside", "iframe"]
                .into_iter()
                .map(String::from)
                .collect(),
            content_region_pattern: String::from("content|main|article"),
            include_curated: true,
            output_dir: PathBuf::from("knowledge_base/sugarcane"),
            seeds: default_seeds(),
            article_sources: default_article_sources(),
            digest_sources: default_digest_sources(),
        }
    }
}

fn default_seeds() -> Vec<SeedGroup> {
    vec![
        SeedGroup::new(
            Category::Government,
            [
                "https://icar.org.in/content/sugarcane",
                "https://sugarcane.dac.gov.in/",
            ],
        ),
        SeedGroup::new(
            Category::Research,
            ["https://www.icar.org.in/node/3468", "https://iisr.icar.gov.in/"],
        ),
        SeedGroup::new(
            Category::Advisory,
            ["https://farmer.gov.in/", "https://agritech.tnau.ac.in/"],
        ),
        SeedGroup::new(
            Category::University,
            ["https://pau.edu/", "https://www.angrau.ac.in/"],
        ),
    ]
}

impl HarvesterConfig {
    /// Loads the configuration by layering, from lowest to highest precedence:
    /// the built-in defaults, the optional `file`, and `CANE_HARVEST__*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with_env(file, Environment::with_prefix(ENV_PREFIX).separator("__"))
    }

    fn load_with_env(file: Option<&Path>, environment: Environment) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_cover_every_category_but_general() {
        let config = HarvesterConfig::default();

        let categories: Vec<Category> = config.seeds.iter().map(|g| g.category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Government,
                Category::Research,
                Category::Advisory,
                Category::University
            ]
        );
        assert!(config.seeds.iter().all(|g| g.urls.len() == 2));
        assert_eq!(config.relevance_keywords.len(), 15);
        assert_eq!(config.max_links_per_page, 5);
        assert_eq!(config.request_delay(), Duration::from_secs(2));
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_without_file_matches_defaults() {
        let config = HarvesterConfig::load(None).unwrap();
        let defaults = HarvesterConfig::default();

        assert_eq!(config.seeds, defaults.seeds);
        assert_eq!(config.ignored_tags, defaults.ignored_tags);
        assert_eq!(config.min_content_length, defaults.min_content_length);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
max_depth = 1
request_delay_ms = 0
include_curated = false

[[seeds]]
category = "research"
urls = ["https://example.org/sugarcane"]
"#
        )
        .unwrap();

        let config = HarvesterConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.max_depth, 1);
        assert_eq!(config.request_delay(), Duration::ZERO);
        assert!(!config.include_curated);
        assert_eq!(
            config.seeds,
            vec![SeedGroup::new(Category::Research, ["https://example.org/sugarcane"])]
        );
        // untouched keys keep their defaults
        assert_eq!(config.max_links_per_page, 5);
    }

    #[test]
    fn test_environment_overrides_file_and_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_depth = 1\nrequest_delay_ms = 0").unwrap();

        let variables: ::config::Map<String, String> = [
            ("CANE_HARVEST__MAX_DEPTH", "0"),
            ("CANE_HARVEST__MIN_CONTENT_LENGTH", "50"),
            ("CANE_HARVEST__INCLUDE_CURATED", "false"),
            ("OTHER__MAX_DEPTH", "7"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
        let environment = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .source(Some(variables));

        let config = HarvesterConfig::load_with_env(Some(file.path()), environment).unwrap();

        assert_eq!(config.max_depth, 0);
        assert_eq!(config.min_content_length, 50);
        assert!(!config.include_curated);
        // set by the file only
        assert_eq!(config.request_delay(), Duration::ZERO);
        assert_eq!(config.max_links_per_page, 5);
    }

    #[test]
    fn test_targeted_sources_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[[digest_sources]]
name = "State portal"
category = "advisory"
url = "https://example.org/schemes"
title = "State Schemes"
card_class_pattern = "tile"
max_cards = 3
keywords = ["ratoon"]
"#
        )
        .unwrap();

        let config = HarvesterConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.digest_sources.len(), 1);
        assert_eq!(config.digest_sources[0].category, Category::Advisory);
        assert_eq!(config.digest_sources[0].max_cards, 3);
        assert_eq!(config.article_sources, HarvesterConfig::default().article_sources);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = HarvesterConfig::load(Some(Path::new("/nonexistent/harvest.toml")));
        assert!(matches!(result, Err(crate::HarvestError::ConfigError(_))));
    }
}
