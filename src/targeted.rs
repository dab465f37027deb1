use crate::scraper::parse_selector;
use crate::text::clean_text;
use crate::types::{Category, ScrapedRecord};
use crate::{HarvestError, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Pages with a known layout, read with fixed selectors instead of the generic candidate regions.
/// Each URL yields at most one record; links are not followed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSource {
    /// A label used in logs.
    pub name: String,
    pub category: Category,
    pub urls: Vec<String>,
    /// Selects the page title. The first match with text wins.
    pub title_selector: String,
    /// Selects the article body. Only the first match is read.
    pub content_selector: String,
    /// The title used when `title_selector` matches nothing.
    pub fallback_title: String,
    /// A page is kept only when its normalized body is longer than this many characters.
    pub min_content_length: usize,
}

/// A portal page whose matching cards are filtered by keyword and merged into a single record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestSource {
    /// A label used in logs.
    pub name: String,
    pub category: Category,
    pub url: String,
    /// The title of the merged record.
    pub title: String,
    /// Pattern matched against the `class` attribute of every `div`.
    pub card_class_pattern: String,
    /// How many matching cards are inspected, in document order.
    pub max_cards: usize,
    /// A card is kept when its text contains one of these, case-insensitively.
    pub keywords: Vec<String>,
}

impl ArticleSource {
    /// Reads the title and body of an article page.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the body is missing or too short, or an error if a selector is invalid.
    #[instrument(skip(self, html), fields(source = %self.name))]
    pub fn extract(&self, html: &str, url: &str) -> Result<Option<ScrapedRecord>> {
        let title_selector = parse_selector(&self.title_selector)?;
        let content_selector = parse_selector(&self.content_selector)?;
        let document = Html::parse_document(html);

        let Some(body) = document.select(&content_selector).next() else {
            debug!("No element matches {}", self.content_selector);
            return Ok(None);
        };

        let content = element_text(body);
        let length = content.chars().count();
        if length <= self.min_content_length {
            debug!("Skipping {}: {} characters", url, length);
            return Ok(None);
        }

        let title = document
            .select(&title_selector)
            .map(|title| title.text().collect::<String>().trim().to_string())
            .find(|title| !title.is_empty())
            .unwrap_or_else(|| self.fallback_title.clone());

        Ok(Some(ScrapedRecord::new(url, title, content, self.category)))
    }
}

impl DigestSource {
    /// Collects the keyword-bearing cards of a portal page into one record.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no inspected card mentions a keyword, or an error if the pattern is invalid.
    #[instrument(skip(self, html), fields(source = %self.name))]
    pub fn extract(&self, html: &str) -> Result<Option<ScrapedRecord>> {
        let pattern = Regex::new(&self.card_class_pattern).map_err(|e| {
            HarvestError::ExtractionError(format!("invalid card class pattern: {e}"))
        })?;
        let keywords: Vec<String> = self.keywords.iter().map(|k| k.to_lowercase()).collect();
        let div = parse_selector("div")?;
        let document = Html::parse_document(html);

        let cards: Vec<String> = document
            .select(&div)
            .filter(|div| {
                div.value()
                    .attr("class")
                    .is_some_and(|class| pattern.is_match(class))
            })
            .take(self.max_cards)
            .map(element_text)
            .filter(|text| {
                let lower = text.to_lowercase();
                keywords.iter().any(|keyword| lower.contains(keyword.as_str()))
            })
            .collect();

        debug!("{} cards mention a keyword", cards.len());
        if cards.is_empty() {
            return Ok(None);
        }

        Ok(Some(ScrapedRecord::new(
            self.url.as_str(),
            self.title.as_str(),
            cards.join("\n\n"),
            self.category,
        )))
    }
}

fn element_text(element: ElementRef) -> String {
    let parts: Vec<&str> = element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect();

    clean_text(&parts.join("\n"))
}

pub(crate) fn default_article_sources() -> Vec<ArticleSource> {
    vec![ArticleSource {
        name: String::from("Vikaspedia"),
        category: Category::Government,
        urls: vec![
            String::from("https://vikaspedia.in/agriculture/crop-production/package-of-practices/sugarcane"),
            String::from("https://vikaspedia.in/agriculture/crop-production/integrated-pest-management/ipm-for-crops/ipm-strategies-for-sugarcane"),
        ],
        title_selector: String::from("h1.page-title"),
        content_selector: String::from("div.field-item.even"),
        fallback_title: String::from("Vikaspedia Content"),
        min_content_length: 500,
    }]
}

pub(crate) fn default_digest_sources() -> Vec<DigestSource> {
    vec![DigestSource {
        name: String::from("Farmer Portal"),
        category: Category::Government,
        url: String::from("https://farmer.gov.in/"),
        title: String::from("Government Schemes for Sugarcane Farmers"),
        card_class_pattern: String::from("scheme|card|info"),
        max_cards: 10,
        keywords: vec![String::from("sugar"), String::from("cane")],
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vikaspedia() -> ArticleSource {
        default_article_sources().remove(0)
    }

    fn farmer_portal() -> DigestSource {
        default_digest_sources().remove(0)
    }

    #[test]
    fn test_article_reads_layout_selectors() {
        let body = "Sugarcane is planted in furrows 90 cm apart. ".repeat(15);
        let html = format!(
            r#"<html><head><title>Vikaspedia</title></head><body>
            <h1 class="page-title"> Package of Practices </h1>
            <div class="field-item odd">Sidebar</div>
            <div class="field-item even"><p>{body}</p></div>
            </body></html>"#
        );

        let record = vikaspedia()
            .extract(&html, "https://vikaspedia.in/sugarcane")
            .unwrap()
            .unwrap();

        assert_eq!(record.title, "Package of Practices");
        assert_eq!(record.category, Category::Government);
        assert!(record.content.starts_with("Sugarcane is planted"));
        assert!(!record.content.contains("Sidebar"));
    }

    #[test]
    fn test_article_needs_more_than_minimum() {
        let source = vikaspedia();
        let exact = "a".repeat(source.min_content_length);
        let html = format!(r#"<div class="field-item even">{exact}</div>"#);
        assert!(source.extract(&html, "https://vikaspedia.in/").unwrap().is_none());

        let longer = "a".repeat(source.min_content_length + 1);
        let html = format!(r#"<div class="field-item even">{longer}</div>"#);
        let record = source.extract(&html, "https://vikaspedia.in/").unwrap().unwrap();
        assert_eq!(record.title, "Vikaspedia Content");
    }

    #[test]
    fn test_article_without_body() {
        let html = r#"<h1 class="page-title">Title</h1><div class="field-item">Text</div>"#;
        assert!(vikaspedia().extract(html, "https://vikaspedia.in/").unwrap().is_none());
    }

    #[test]
    fn test_article_invalid_selector() {
        let source = ArticleSource {
            content_selector: String::from("div[["),
            ..vikaspedia()
        };
        let result = source.extract("<div></div>", "https://vikaspedia.in/");
        assert!(matches!(result, Err(HarvestError::ExtractionError(_))));
    }

    #[test]
    fn test_digest_filters_cards() {
        let html = r#"<body>
            <div class="scheme-card">Sugarcane price support scheme</div>
            <div class="banner">Sugar mill news</div>
            <div class="info">Soil health card for all crops</div>
            <div class="card">CANE development programme</div>
        </body>"#;

        let record = farmer_portal().extract(html).unwrap().unwrap();

        assert_eq!(record.title, "Government Schemes for Sugarcane Farmers");
        assert_eq!(record.url, "https://farmer.gov.in/");
        assert_eq!(
            record.content,
            "Sugarcane price support scheme\n\nCANE development programme"
        );
        assert_eq!(record.word_count, 7);
    }

    #[test]
    fn test_digest_inspects_first_cards_only() {
        let source = DigestSource {
            max_cards: 2,
            ..farmer_portal()
        };
        let html = r#"<div class="card">Weather</div><div class="card">Market</div>
            <div class="card">Sugarcane</div>"#;

        assert!(source.extract(html).unwrap().is_none());
    }
}
