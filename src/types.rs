use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The coarse source label attached to every record.
///
/// Pages reached by following links inherit the category of the seed they were reached from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Government,
    Research,
    Advisory,
    University,
    General,
}

impl Category {
    /// The lowercase name used in JSON, directory names and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Government => "government",
            Category::Research => "research",
            Category::Advisory => "advisory",
            Category::University => "university",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single harvested document, either scraped from a page or taken from the curated set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    /// The page URL, or `curated` for bundled documents.
    pub url: String,
    /// The page title.
    pub title: String,
    /// The normalized plain-text content.
    pub content: String,
    /// The category of the seed the page was reached from.
    pub category: Category,
    /// When the record was produced.
    pub scraped_at: DateTime<Local>,
    /// The number of whitespace-separated words in `content`.
    pub word_count: usize,
}

impl ScrapedRecord {
    /// Creates a record stamped with the current time, counting the words of `content`.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        category: Category,
    ) -> Self {
        let content = content.into();
        let word_count = content.split_whitespace().count();

        Self {
            url: url.into(),
            title: title.into(),
            content,
            category,
            scraped_at: Local::now(),
            word_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_ignores_layout() {
        let record = ScrapedRecord::new(
            "https://example.com",
            "Title",
            "Ratoon  management\n\nearthing up\tand gap filling",
            Category::Advisory,
        );

        assert_eq!(record.word_count, 7);
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_string(&Category::University).unwrap();
        assert_eq!(json, "\"university\"");

        let parsed: Category = serde_json::from_str("\"government\"").unwrap();
        assert_eq!(parsed, Category::Government);
        assert_eq!(Category::Research.to_string(), "research");
    }

    #[test]
    fn test_record_json_shape() {
        let record = ScrapedRecord::new("curated", "Guide", "red rot smut wilt", Category::General);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["category"], "general");
        assert_eq!(value["word_count"], 3);
        assert!(value["scraped_at"].is_string());
    }
}
