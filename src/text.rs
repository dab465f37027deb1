//! Plain-text normalization applied to every extracted page.

use once_cell::sync::Lazy;
use regex::Regex;

static DISALLOWED_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^\w\s.,;:!?()\-'"°%/]"#).expect("valid regex"));
static BLANK_LINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));
static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").expect("valid regex"));

/// Normalizes extracted text.
///
/// Characters outside the allow-list (word characters, whitespace, basic punctuation, `°`, `%`
/// and `/`) become spaces, blank-line runs shrink to a single blank line, space runs shrink to
/// one space, and the result is trimmed.
///
/// The character filter runs first so that the collapsing steps see every space it introduces,
/// which keeps the function idempotent.
pub fn clean_text(text: &str) -> String {
    let text = DISALLOWED_CHARS.replace_all(text, " ");
    let text = BLANK_LINE_RUNS.replace_all(&text, "\n\n");
    let text = SPACE_RUNS.replace_all(&text, " ");

    text.trim().to_string()
}
