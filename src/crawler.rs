use crate::config::{HarvesterConfig, SeedGroup};
use crate::curated::curated_records;
use crate::links::{without_fragment, LinkFilter};
use crate::scraper::ContentScraper;
use crate::targeted::{ArticleSource, DigestSource};
use crate::types::{Category, ScrapedRecord};
use crate::{HarvestError, Result};
use futures::future::{FutureExt, LocalBoxFuture};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

/// The `Harvester` struct crawls the seed table and accumulates `ScrapedRecord`s.
///
/// A run is sequential: one request at a time, each link fetch preceded by the configured delay.
/// The visited-set lives as long as the harvester, so every URL is fetched at most once per run.
pub struct Harvester {
    /// The HTTP client used for making requests.
    client: Client,
    /// The configuration settings for the run.
    config: HarvesterConfig,
    scraper: ContentScraper,
    link_filter: LinkFilter,
    /// Every URL a fetch was attempted for.
    visited: HashSet<String>,
    /// Records in the order they were produced.
    records: Vec<ScrapedRecord>,
    /// URLs read by a targeted source.
    targeted_urls: HashSet<String>,
    /// Bodies of targeted URLs the crawl already fetched, so they are not fetched twice.
    targeted_pages: HashMap<String, String>,
    /// The spinner showing the page being fetched.
    progress: ProgressBar,
}

impl Harvester {
    /// Creates a new `Harvester` with the given configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Harvester`, or an error if the client or the scraper could not be created.
    pub fn new(config: HarvesterConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .build()?;

        let scraper = ContentScraper::from_config(&config)?;
        let link_filter = LinkFilter::new(&config.relevance_keywords, config.max_links_per_page);

        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        let targeted_urls = config
            .article_sources
            .iter()
            .flat_map(|source| source.urls.iter())
            .chain(config.digest_sources.iter().map(|source| &source.url))
            .filter_map(|url| Url::parse(url).ok())
            .map(|url| without_fragment(url).to_string())
            .collect();

        Ok(Self {
            client,
            config,
            scraper,
            link_filter,
            visited: HashSet::new(),
            records: Vec::new(),
            targeted_urls,
            targeted_pages: HashMap::new(),
            progress,
        })
    }

    /// Crawls every configured seed group, reads the targeted sources, then appends the curated
    /// documents if enabled.
    ///
    /// Failures never abort the run: unreachable pages are skipped and failing categories or
    /// sources are logged, so the returned set holds at least the curated documents.
    pub async fn run(&mut self) -> &[ScrapedRecord] {
        info!("Starting sugarcane farming knowledge harvest");
        self.progress.enable_steady_tick(Duration::from_millis(120));

        let seeds = self.config.seeds.clone();
        self.crawl(&seeds).await;

        let articles = self.config.article_sources.clone();
        let digests = self.config.digest_sources.clone();
        self.harvest_targeted(&articles, &digests).await;

        if self.config.include_curated {
            info!("Adding curated documents");
            self.records.extend(curated_records());
        }

        self.progress.finish_with_message(format!(
            "Completed: {} records from {} fetched URLs",
            self.records.len(),
            self.visited.len()
        ));
        info!("Harvest complete! Total records: {}", self.records.len());

        &self.records
    }

    /// Crawls the given seed groups in order, pausing after each group.
    pub async fn crawl(&mut self, seeds: &[SeedGroup]) {
        for group in seeds {
            info!("Harvesting {} sources", group.category);

            match self.harvest_category(group).await {
                Ok(added) => info!("{} sources yielded {} records", group.category, added),
                Err(e) => warn!("Error harvesting {} sources: {}", group.category, e),
            }

            sleep(self.config.request_delay()).await;
        }
    }

    /// Crawls the seeds of a single group. Fails without fetching anything if a seed URL is invalid.
    ///
    /// # Returns
    ///
    /// A `Result` containing the number of records the group added.
    async fn harvest_category(&mut self, group: &SeedGroup) -> Result<usize> {
        let seeds = parse_urls(&group.urls)?;

        let before = self.records.len();
        for seed in seeds {
            self.scrape_page(seed, group.category, self.config.max_depth)
                .await;
        }

        Ok(self.records.len() - before)
    }

    /// Fetches a page, records its content, and follows its relevant links down to `depth` hops.
    ///
    /// Depth-first: every followed link is fully explored before the next one is fetched.
    fn scrape_page(&mut self, url: Url, category: Category, depth: u32) -> LocalBoxFuture<'_, ()> {
        async move {
            let url = without_fragment(url);
            if !self.visited.insert(url.to_string()) {
                debug!("Already visited: {}", url);
                return;
            }

            info!("Scraping: {}", url);
            self.progress.set_message(format!("Fetching {}", url));

            let html = match self.fetch_html(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Request failed for {}: {}", url, e);
                    return;
                }
            };

            if self.targeted_urls.contains(url.as_str()) {
                self.targeted_pages.insert(url.to_string(), html.clone());
            }

            let page = self.scraper.extract(&html, url.as_str());

            match page.content {
                Some(content)
                    if content.chars().count() >= self.config.min_content_length =>
                {
                    let record = ScrapedRecord::new(url.as_str(), page.title, content, category);
                    info!(
                        "Extracted {} words from: {}",
                        record.word_count, record.title
                    );
                    self.records.push(record);
                }
                Some(content) => debug!(
                    "Skipping {}: {} characters is below the minimum",
                    url,
                    content.chars().count()
                ),
                None => debug!("Skipping {}: no content found", url),
            }

            if depth == 0 {
                return;
            }

            let links = self
                .link_filter
                .relevant_links(&url, &page.links, &self.visited);
            debug!("Following {} links from {}", links.len(), url);

            for link in links {
                sleep(self.config.request_delay()).await;
                self.scrape_page(link, category, depth - 1).await;
            }
        }
        .boxed_local()
    }

    /// Reads the article sources, then the digest sources, each isolated from the others' failures.
    pub async fn harvest_targeted(&mut self, articles: &[ArticleSource], digests: &[DigestSource]) {
        for source in articles {
            info!("Harvesting {} articles", source.name);

            match self.harvest_articles(source).await {
                Ok(added) => info!("{} yielded {} records", source.name, added),
                Err(e) => warn!("Error harvesting {}: {}", source.name, e),
            }
        }

        for source in digests {
            info!("Harvesting {} digest", source.name);

            match self.harvest_digest(source).await {
                Ok(true) => info!("{} yielded a digest", source.name),
                Ok(false) => info!("{} had no matching cards", source.name),
                Err(e) => warn!("Error harvesting {}: {}", source.name, e),
            }

            sleep(self.config.request_delay()).await;
        }
    }

    async fn harvest_articles(&mut self, source: &ArticleSource) -> Result<usize> {
        let urls = parse_urls(&source.urls)?;

        let before = self.records.len();
        for url in urls {
            match self.fetch_targeted(&url).await {
                Ok(html) => {
                    if let Some(record) = source.extract(&html, url.as_str())? {
                        info!("Extracted {} words from: {}", record.word_count, record.title);
                        self.records.push(record);
                    }
                }
                Err(e) => warn!("Request failed for {}: {}", url, e),
            }

            sleep(self.config.request_delay()).await;
        }

        Ok(self.records.len() - before)
    }

    async fn harvest_digest(&mut self, source: &DigestSource) -> Result<bool> {
        let url = parse_urls(std::slice::from_ref(&source.url))?.remove(0);
        let html = self.fetch_targeted(&url).await?;

        match source.extract(&html)? {
            Some(record) => {
                self.records.push(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns the body of a targeted URL, reusing the crawl's fetch when there was one.
    async fn fetch_targeted(&mut self, url: &Url) -> Result<String> {
        if let Some(html) = self.targeted_pages.get(url.as_str()) {
            debug!("Reusing crawled page: {}", url);
            return Ok(html.clone());
        }

        if !self.visited.insert(url.to_string()) {
            return Err(HarvestError::ExtractionError(format!(
                "{url} was already fetched without a usable response"
            )));
        }

        info!("Scraping: {}", url);
        self.progress.set_message(format!("Fetching {}", url));
        self.fetch_html(url).await
    }

    /// Performs a single GET and returns the body, treating non-2xx statuses as errors.
    async fn fetch_html(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }

    /// The records produced so far, in production order.
    pub fn records(&self) -> &[ScrapedRecord] {
        &self.records
    }

    /// The URLs fetched (or attempted) so far.
    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }
}

/// Parses every URL, failing on the first invalid one. Fragments are dropped.
fn parse_urls(urls: &[String]) -> Result<Vec<Url>> {
    urls.iter()
        .map(|url| {
            Url::parse(url)
                .map(without_fragment)
                .map_err(|source| HarvestError::InvalidUrl {
                    url: url.clone(),
                    source,
                })
        })
        .collect()
}
