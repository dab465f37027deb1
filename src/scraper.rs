use crate::config::HarvesterConfig;
use crate::text::clean_text;
use crate::{HarvestError, Result};
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, instrument};

/// The title used when a page has neither a `<title>` nor a visible `<h1>`.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// An anchor found in the content-bearing part of a page, before resolution and filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    /// The `href` attribute as written in the page.
    pub href: String,
    /// The anchor's text, concatenated.
    pub text: String,
}

/// What a single page yields: its title, its main text (if any), and its anchors.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub title: String,
    /// The normalized main-region text, `None` when no candidate region had any text.
    pub content: Option<String>,
    pub links: Vec<RawLink>,
}

/// The `ContentScraper` struct is responsible for extracting the main text, title and links of an HTML page.
///
/// Elements named in `ignored_tags` are treated as if they were removed from the document:
/// nothing inside them contributes text, candidate regions or links.
pub struct ContentScraper {
    /// Tag names whose subtrees are ignored.
    ignored_tags: HashSet<String>,
    /// Pattern matched against `div` classes and ids.
    region_pattern: Regex,
    main: Selector,
    article: Selector,
    div: Selector,
    body: Selector,
    title: Selector,
    h1: Selector,
    anchor: Selector,
}

impl ContentScraper {
    /// Creates a new `ContentScraper` with the given ignored tags and content-region pattern.
    ///
    /// # Arguments
    ///
    /// * `ignored_tags` - Tag names whose whole subtree is ignored.
    /// * `region_pattern` - Case-insensitive regex matched against `div` classes and ids.
    ///
    /// # Returns
    ///
    /// A `Result` containing the scraper, or an error if the pattern does not compile.
    pub fn new(
        ignored_tags: impl IntoIterator<Item = impl AsRef<str>>,
        region_pattern: &str,
    ) -> Result<Self> {
        let region_pattern = RegexBuilder::new(region_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| HarvestError::ExtractionError(format!("invalid region pattern: {e}")))?;

        Ok(Self {
            ignored_tags: ignored_tags
                .into_iter()
                .map(|tag| tag.as_ref().to_ascii_lowercase())
                .collect(),
            region_pattern,
            main: parse_selector("main")?,
            article: parse_selector("article")?,
            div: parse_selector("div")?,
            body: parse_selector("body")?,
            title: parse_selector("title")?,
            h1: parse_selector("h1")?,
            anchor: parse_selector("a[href]")?,
        })
    }

    /// Builds a scraper from the extraction settings of a `HarvesterConfig`.
    pub fn from_config(config: &HarvesterConfig) -> Result<Self> {
        Self::new(&config.ignored_tags, &config.content_region_pattern)
    }

    /// Extracts the title, main text and links from the given HTML string.
    ///
    /// # Arguments
    ///
    /// * `html` - The HTML string to be parsed.
    /// * `url` - The URL of the HTML document, used for logging only.
    #[instrument(skip(self, html), fields(html_length = html.len()))]
    pub fn extract(&self, html: &str, url: &str) -> ExtractedPage {
        let document = Html::parse_document(html);

        let content = self.extract_content(&document);
        if content.is_none() {
            debug!("No candidate region yielded text");
        }

        ExtractedPage {
            title: self.extract_title(&document),
            content,
            links: self.extract_links(&document),
        }
    }

    /// Walks the candidate regions in priority order (`main`, `article`, content-like `div` by
    /// class, then by id, `body`) and returns the first non-empty normalized text.
    fn extract_content(&self, document: &Html) -> Option<String> {
        self.candidate_regions(document)
            .into_iter()
            .map(|region| clean_text(&self.visible_text(region)))
            .find(|text| !text.is_empty())
    }

    fn candidate_regions<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        let first_visible = |selector: &Selector| {
            document
                .select(selector)
                .find(|element| !self.is_ignored(*element))
        };

        let by_class = document.select(&self.div).find(|div| {
            !self.is_ignored(*div)
                && (div.value().classes().any(|class| self.region_pattern.is_match(class))
                    || div
                        .value()
                        .attr("class")
                        .is_some_and(|class| self.region_pattern.is_match(class)))
        });
        let by_id = document.select(&self.div).find(|div| {
            !self.is_ignored(*div)
                && div
                    .value()
                    .id()
                    .is_some_and(|id| self.region_pattern.is_match(id))
        });

        [
            first_visible(&self.main),
            first_visible(&self.article),
            by_class,
            by_id,
            first_visible(&self.body),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Collects the text nodes under `element`, each trimmed, empty ones dropped, newline-separated.
    fn visible_text(&self, element: ElementRef) -> String {
        let mut parts = Vec::new();
        self.collect_text(element, &mut parts);
        parts.join("\n")
    }

    fn collect_text(&self, element: ElementRef, parts: &mut Vec<String>) {
        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                if !self.ignored_tags.contains(child_element.value().name()) {
                    self.collect_text(child_element, parts);
                }
            } else if let Some(text) = child.value().as_text() {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
        }
    }

    /// Returns the trimmed `<title>`, falling back to the first visible `<h1>`.
    fn extract_title(&self, document: &Html) -> String {
        let title = document
            .select(&self.title)
            .map(|title| title.text().collect::<String>().trim().to_string())
            .find(|title| !title.is_empty());

        title
            .or_else(|| {
                document
                    .select(&self.h1)
                    .filter(|h1| !self.is_ignored(*h1))
                    .map(|h1| h1.text().collect::<String>().trim().to_string())
                    .find(|h1| !h1.is_empty())
            })
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
    }

    /// Returns every anchor with an `href` outside ignored regions, in document order.
    fn extract_links(&self, document: &Html) -> Vec<RawLink> {
        document
            .select(&self.anchor)
            .filter(|anchor| !self.is_ignored(*anchor))
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                Some(RawLink {
                    href: href.to_string(),
                    text: anchor.text().collect::<String>(),
                })
            })
            .collect()
    }

    /// Whether the element or one of its ancestors is an ignored tag.
    fn is_ignored(&self, element: ElementRef) -> bool {
        self.ignored_tags.contains(element.value().name())
            || element.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|e| self.ignored_tags.contains(e.name()))
            })
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| HarvestError::ExtractionError(format!("invalid selector '{selector}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Default for ContentScraper {
        fn default() -> Self {
            Self::from_config(&HarvesterConfig::default()).unwrap()
        }
    }

    /// Tests that ignored elements never contribute text.
    #[test]
    fn test_ignored_elements_are_dropped() {
        let html = r#"
            <html>
                <head><title> Sugarcane Guide </title><style>p { color: red }</style></head>
                <body>
                    <header><h1>Site header</h1></header>
                    <nav><a href="/crop">Crop menu</a></nav>
                    <main>
                        <h2>Planting</h2>
                        <p>Plant three-budded setts.</p>
                        <script>var tracking = 1;</script>
                        <aside>Advertisement</aside>
                    </main>
                    <footer>Copyright</footer>
                </body>
            </html>
        "#;

        let page = ContentScraper::default().extract(html, "https://example.com");

        assert_eq!(page.title, "Sugarcane Guide");
        assert_eq!(
            page.content.as_deref(),
            Some("Planting\nPlant three-budded setts.")
        );
        assert!(page.links.is_empty(), "nav links must be ignored");
    }

    /// Tests the priority order of candidate regions.
    #[test]
    fn test_region_priority() {
        let scraper = ContentScraper::default();

        let html = r#"<body><div class="content">From div</div><article>From article</article></body>"#;
        let page = scraper.extract(html, "https://example.com");
        assert_eq!(page.content.as_deref(), Some("From article"));

        let html = r#"<body><p>Loose text</p><div id="mainContent">From id</div></body>"#;
        let page = scraper.extract(html, "https://example.com");
        assert_eq!(page.content.as_deref(), Some("From id"));

        let html = r#"<body><div id="x-CONTENT">From id</div><div class="page-Article">From class</div></body>"#;
        let page = scraper.extract(html, "https://example.com");
        assert_eq!(page.content.as_deref(), Some("From class"));

        let html = r#"<body><p>Only body text</p></body>"#;
        let page = scraper.extract(html, "https://example.com");
        assert_eq!(page.content.as_deref(), Some("Only body text"));
    }

    /// Tests that an empty candidate falls through to the next one.
    #[test]
    fn test_empty_region_falls_through() {
        let html = r#"<body><main>   </main><article><p>Article body</p></article></body>"#;
        let page = ContentScraper::default().extract(html, "https://example.com");

        assert_eq!(page.content.as_deref(), Some("Article body"));
    }

    /// Tests that a candidate inside an ignored element is not selected.
    #[test]
    fn test_region_inside_ignored_element_is_skipped() {
        let html = r#"<body><header><main>Header main</main></header><p>Body text</p></body>"#;
        let page = ContentScraper::default().extract(html, "https://example.com");

        assert_eq!(page.content.as_deref(), Some("Body text"));
    }

    /// Tests the content extraction functionality when no content is found.
    #[test]
    fn test_empty_content() {
        let html = "<html><body><nav>Menu</nav></body></html>";
        let page = ContentScraper::default().extract(html, "https://example.com");

        assert!(page.content.is_none());
        assert_eq!(page.title, UNKNOWN_TITLE);
    }

    #[test]
    fn test_title_falls_back_to_h1() {
        let html = r#"<html><head><title>  </title></head><body><h1> Red Rot </h1></body></html>"#;
        let page = ContentScraper::default().extract(html, "https://example.com");

        assert_eq!(page.title, "Red Rot");
    }

    #[test]
    fn test_links_in_document_order() {
        let html = r#"
            <body>
                <a href="/pest">Pest <b>control</b></a>
                <a>no href</a>
                <footer><a href="/crop-footer">Crop</a></footer>
                <a href="https://other.org/guide">Guide</a>
            </body>
        "#;
        let page = ContentScraper::default().extract(html, "https://example.com");

        assert_eq!(
            page.links,
            vec![
                RawLink {
                    href: "/pest".to_string(),
                    text: "Pest control".to_string()
                },
                RawLink {
                    href: "https://other.org/guide".to_string(),
                    text: "Guide".to_string()
                },
            ]
        );
    }

    /// Tests the extraction with custom ignored tags and region pattern.
    #[test]
    fn test_custom_configuration() {
        let scraper = ContentScraper::new(["table"], "story").unwrap();
        let html = r#"<body><div class="story"><p>Kept</p><table><tr><td>Dropped</td></tr></table></div></body>"#;

        let page = scraper.extract(html, "https://example.com");
        assert_eq!(page.content.as_deref(), Some("Kept"));
    }

    #[test]
    fn test_invalid_region_pattern() {
        let result = ContentScraper::new(["nav"], "(unclosed");
        assert!(matches!(result, Err(HarvestError::ExtractionError(_))));
    }
}
