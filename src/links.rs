use crate::scraper::RawLink;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// The `LinkFilter` decides which anchors of a page are worth following.
///
/// A link is followed when it resolves against the page URL, has not been visited yet, mentions a
/// relevance keyword in its URL or anchor text, and stays on the page's host.
pub struct LinkFilter {
    /// Lowercase keywords.
    keywords: Vec<String>,
    /// The maximum number of links returned per page.
    max_links: usize,
}

impl LinkFilter {
    pub fn new(keywords: impl IntoIterator<Item = impl AsRef<str>>, max_links: usize) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            max_links,
        }
    }

    /// Returns the links of `page` worth following, in document order, capped at `max_links`.
    ///
    /// # Arguments
    ///
    /// * `page` - The URL of the page the links were found on.
    /// * `links` - The raw anchors of the page.
    /// * `visited` - The URLs already fetched during this run.
    ///
    /// Fragments are dropped, so in-page anchors resolve to the page they point into and
    /// each target appears at most once.
    pub fn relevant_links(
        &self,
        page: &Url,
        links: &[RawLink],
        visited: &HashSet<String>,
    ) -> Vec<Url> {
        let mut seen = HashSet::new();

        links
            .iter()
            .filter_map(|link| match page.join(link.href.trim()) {
                Ok(resolved) => Some((without_fragment(resolved), link)),
                Err(e) => {
                    debug!("Skipping unresolvable link {}: {}", link.href, e);
                    None
                }
            })
            .filter(|(resolved, _)| !visited.contains(resolved.as_str()))
            .filter(|(resolved, link)| self.is_relevant(resolved, &link.text))
            .filter(|(resolved, _)| same_host(page, resolved))
            .map(|(resolved, _)| resolved)
            .filter(|resolved| seen.insert(resolved.to_string()))
            .take(self.max_links)
            .collect()
    }

    /// Whether the URL or the anchor text contains one of the keywords, case-insensitively.
    pub fn is_relevant(&self, url: &Url, text: &str) -> bool {
        let url = url.as_str().to_lowercase();
        let text = text.to_lowercase();

        self.keywords
            .iter()
            .any(|keyword| url.contains(keyword.as_str()) || text.contains(keyword.as_str()))
    }
}

/// Strips the `#fragment`, which never reaches the server.
pub fn without_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// Whether both URLs name the same host and port. Subdomains count as different hosts.
pub fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str().is_some() && a.host_str() == b.host_str() && a.port() == b.port()
}
