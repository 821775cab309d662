//! Boilerplate-stripping text extraction for fetched article pages.
//!
//! This is a best-effort heuristic built on ordered regular expressions, not an
//! HTML parser. It never fails: malformed markup produces an empty or garbled
//! string, which the enrichment stage treats as insufficient content.
//!
//! # Algorithm
//!
//! 1. Remove `<script>` and `<style>` elements together with their content.
//! 2. Try each container pattern in [`CONTAINER_PATTERNS`] order; the first one
//!    matching anywhere in the document supplies the content region.
//! 3. Without a container match, use the `<body>` region, then the whole document.
//! 4. Replace tags with spaces, decode a few common entities, collapse
//!    whitespace and trim.
//! 5. Hard-cut to the character limit.

use crate::utils::truncate_chars;
use once_cell::sync::Lazy;
use regex::Regex;

/// Default cap on extracted text, in characters.
pub const DEFAULT_MAX_CHARS: usize = 5000;

static SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
        .expect("script/style pattern")
});

/// Structural containers, highest priority first.
static CONTAINER_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("article", r"(?is)<article\b[^>]*>.*?</article\s*>"),
        (
            "content-class",
            r#"(?is)<div\b[^>]*class\s*=\s*"[^"]*content[^"]*"[^>]*>.*?</div\s*>"#,
        ),
        (
            "article-class",
            r#"(?is)<div\b[^>]*class\s*=\s*"[^"]*article[^"]*"[^>]*>.*?</div\s*>"#,
        ),
        ("main", r"(?is)<main\b[^>]*>.*?</main\s*>"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("container pattern")))
    .collect()
});

static BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<body\b[^>]*>.*?</body\s*>").expect("body pattern"));

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

static TRUNCATION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*(?:…|\.\.\.)?\s*\[\+\d+ chars\]\s*$").expect("truncation marker pattern")
});

/// Extract readable article text from an HTML document.
///
/// # Arguments
///
/// * `html` - The raw page, which may be malformed or not HTML at all
/// * `max_chars` - Upper bound on the result, in characters
///
/// # Returns
///
/// Normalized plain text, never longer than `max_chars`. Running the result
/// through `extract_text` again returns it unchanged only when it contains no
/// entities: decoding is a single pass, so `&amp;lt;` becomes `&lt;` now and
/// `<` on a second run.
pub fn extract_text(html: &str, max_chars: usize) -> String {
    let cleaned = SCRIPT_STYLE.replace_all(html, "");
    let region = content_region(&cleaned);
    let text = normalize(region);
    truncate_chars(&text, max_chars).trim_end().to_string()
}

/// Pick the span of the document that most likely holds the article.
fn content_region(html: &str) -> &str {
    for (name, pattern) in CONTAINER_PATTERNS.iter() {
        if let Some(m) = pattern.find(html) {
            tracing::trace!(container = *name, bytes = m.len(), "Matched content container");
            return m.as_str();
        }
    }
    BODY.find(html).map(|m| m.as_str()).unwrap_or(html)
}

fn normalize(fragment: &str) -> String {
    let without_tags = TAG.replace_all(fragment, " ");
    let decoded = decode_entities(&without_tags);
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

/// Decode the handful of entities that show up in nearly every news page.
///
/// `&amp;` goes last so an escaped entity such as `&amp;lt;` stays literal text.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// Remove the `[+1234 chars]` suffix NewsAPI appends to truncated `content`.
pub fn strip_truncation_marker(content: &str) -> &str {
    match TRUNCATION_MARKER.find(content) {
        Some(m) => &content[..m.start()],
        None => content,
    }
}
