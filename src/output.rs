use crate::types::ScrapedRecord;
use crate::Result;
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// The format of the run stamp appended to every output file name.
pub const RUN_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
/// The maximum number of characters of a title kept in a file name.
pub const MAX_TITLE_CHARS: usize = 50;

static UNSAFE_TITLE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static SEPARATOR_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").expect("valid regex"));

fn rule() -> String {
    "=".repeat(80)
}

/// The files written by one `OutputWriter::write_all` call.
#[derive(Debug, Clone, Default)]
pub struct WrittenFiles {
    pub json: PathBuf,
    pub documents: Vec<PathBuf>,
    pub summary: PathBuf,
}

/// Writes a run's records to disk: one JSON dump, one text file per record under a
/// per-category directory, and a summary report. Every name carries the run stamp.
pub struct OutputWriter {
    output_dir: PathBuf,
    started_at: DateTime<Local>,
}

impl OutputWriter {
    /// Creates a writer for a run that started at `started_at`.
    pub fn new(output_dir: impl Into<PathBuf>, started_at: DateTime<Local>) -> Self {
        Self {
            output_dir: output_dir.into(),
            started_at,
        }
    }

    /// The `YYYYMMDD_HHMMSS` stamp of the run.
    pub fn run_stamp(&self) -> String {
        self.started_at.format(RUN_STAMP_FORMAT).to_string()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes every output file, creating directories as needed.
    pub async fn write_all(&self, records: &[ScrapedRecord]) -> Result<WrittenFiles> {
        fs::create_dir_all(&self.output_dir).await?;

        let json = self.write_json(records).await?;
        let documents = self.write_documents(records).await?;
        let summary = self.write_summary(records).await?;

        Ok(WrittenFiles {
            json,
            documents,
            summary,
        })
    }

    async fn write_json(&self, records: &[ScrapedRecord]) -> Result<PathBuf> {
        let path = self
            .output_dir
            .join(format!("scraped_data_{}.json", self.run_stamp()));

        fs::write(&path, serde_json::to_string_pretty(records)?).await?;
        info!("Saved JSON: {}", path.display());

        Ok(path)
    }

    async fn write_documents(&self, records: &[ScrapedRecord]) -> Result<Vec<PathBuf>> {
        let stamp = self.run_stamp();
        let mut taken = HashSet::new();
        let mut paths = Vec::with_capacity(records.len());

        for record in records {
            let category_dir = self.output_dir.join(record.category.as_str());
            fs::create_dir_all(&category_dir).await?;

            let base = format!("{}_{}", safe_title(&record.title), stamp);
            let mut path = category_dir.join(format!("{base}.txt"));
            let mut n = 1;
            while !taken.insert(path.clone()) {
                n += 1;
                path = category_dir.join(format!("{base}_{n}.txt"));
            }

            fs::write(&path, render_document(record)).await?;
            paths.push(path);
        }

        Ok(paths)
    }

    async fn write_summary(&self, records: &[ScrapedRecord]) -> Result<PathBuf> {
        let path = self
            .output_dir
            .join(format!("scraping_summary_{}.txt", self.run_stamp()));

        fs::write(&path, render_summary(records, Local::now())).await?;
        info!("Saved summary: {}", path.display());

        Ok(path)
    }
}

/// Turns a title into a file-name stem: unsafe characters dropped, first 50 characters kept,
/// `-`/whitespace runs replaced by `_`. Empty results become `untitled`.
pub fn safe_title(title: &str) -> String {
    let stripped = UNSAFE_TITLE_CHARS.replace_all(title, "");
    let truncated: String = stripped.chars().take(MAX_TITLE_CHARS).collect();
    let joined = SEPARATOR_RUNS.replace_all(&truncated, "_");

    if joined.trim_matches('_').is_empty() {
        String::from("untitled")
    } else {
        joined.into_owned()
    }
}

/// Renders a record as its text file: a header block, a rule, then the raw content.
pub fn render_document(record: &ScrapedRecord) -> String {
    format!(
        "Title: {}\nURL: {}\nCategory: {}\nScraped: {}\nWord Count: {}\n\n{}\n\n{}",
        record.title,
        record.url,
        record.category,
        record.scraped_at.to_rfc3339(),
        record.word_count,
        rule(),
        record.content
    )
}

/// Renders the summary report: totals, counts per category, and a title/URL listing.
pub fn render_summary(records: &[ScrapedRecord], completed_at: DateTime<Local>) -> String {
    let total_words: usize = records.iter().map(|r| r.word_count).sum();

    let mut by_category: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *by_category.entry(record.category.as_str()).or_default() += 1;
    }

    let mut lines = vec![
        String::from("SUGARCANE FARMING KNOWLEDGE SCRAPING SUMMARY"),
        rule(),
        String::new(),
        format!("Total articles scraped: {}", records.len()),
        format!("Total words collected: {}", total_words),
        format!(
            "Scraping completed: {}",
            completed_at.format("%Y-%m-%d %H:%M:%S")
        ),
        String::new(),
        String::from("Articles by category:"),
    ];
    lines.extend(
        by_category
            .into_iter()
            .map(|(category, count)| format!("  {}: {}", category, count)),
    );

    lines.extend([String::new(), rule(), String::new(), String::from("Scraped URLs:")]);
    lines.extend(
        records
            .iter()
            .map(|record| format!("  - {} ({})", record.title, record.url)),
    );

    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use chrono::TimeZone;

    fn record(title: &str, category: Category) -> ScrapedRecord {
        ScrapedRecord::new(
            format!("https://example.com/{}", title.len()),
            title,
            "Drip irrigation saves water",
            category,
        )
    }

    #[test]
    fn test_safe_title() {
        assert_eq!(safe_title("Sugarcane: Red Rot & Smut"), "Sugarcane_Red_Rot_Smut");
        assert_eq!(safe_title("crop -- management  guide"), "crop_management_guide");
        assert_eq!(safe_title("★★★"), "untitled");
        assert_eq!(safe_title(""), "untitled");

        let long = "a".repeat(80);
        assert_eq!(safe_title(&long).chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_run_stamp_format() {
        let started = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        let writer = OutputWriter::new("out", started);

        assert_eq!(writer.run_stamp(), "20240307_090501");
    }

    #[test]
    fn test_render_document_header() {
        let record = record("Pest Guide", Category::Advisory);
        let rendered = render_document(&record);

        assert!(rendered.starts_with("Title: Pest Guide\nURL: https://example.com/10\nCategory: advisory\n"));
        assert!(rendered.contains("Word Count: 4\n"));
        assert!(rendered.ends_with(&format!("{}\n\nDrip irrigation saves water", rule())));
    }

    #[test]
    fn test_render_summary() {
        let records = vec![
            record("B", Category::Research),
            record("A", Category::Advisory),
            record("C", Category::Research),
        ];
        let summary = render_summary(&records, Local::now());

        assert!(summary.contains("Total articles scraped: 3\n"));
        assert!(summary.contains("Total words collected: 12\n"));
        assert!(summary.contains("Articles by category:\n  advisory: 1\n  research: 2\n"));
        assert!(summary.contains("  - B (https://example.com/1)\n"));
    }

    #[tokio::test]
    async fn test_write_all_creates_tree() {
        let dir = tempfile::tempdir().unwrap();
        let started = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let writer = OutputWriter::new(dir.path().join("kb"), started);

        let records = vec![
            record("Same Title", Category::Government),
            record("Same Title", Category::Government),
            record("Other", Category::General),
        ];
        let written = writer.write_all(&records).await.unwrap();

        assert_eq!(
            written.json,
            dir.path().join("kb/scraped_data_20240102_030405.json")
        );
        let json = std::fs::read_to_string(&written.json).unwrap();
        let parsed: Vec<ScrapedRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(
            written.documents,
            vec![
                dir.path().join("kb/government/Same_Title_20240102_030405.txt"),
                dir.path().join("kb/government/Same_Title_20240102_030405_2.txt"),
                dir.path().join("kb/general/Other_20240102_030405.txt"),
            ]
        );
        assert!(written.documents.iter().all(|p| p.exists()));

        let summary = std::fs::read_to_string(&written.summary).unwrap();
        assert!(summary.contains("Total articles scraped: 3"));
        assert!(written
            .summary
            .ends_with("scraping_summary_20240102_030405.txt"));
    }
}
