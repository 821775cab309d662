//! Utility functions for time classification, string manipulation, and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - Time classification for edition naming
//! - Character-safe truncation for logging and for bounding LLM input
//! - Slugification for turning cache keys into file names
//! - File system validation for output directories

use chrono::{Local, NaiveTime};
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Classify current local time into morning, afternoon, or evening.
///
/// The time boundaries are:
/// - **Morning**: 00:00 - 08:00
/// - **Afternoon**: 08:00 - 16:00
/// - **Evening**: 16:00 - 24:00
#[instrument]
pub fn time_of_day() -> String {
    let which = classify_time(Local::now().time());
    tracing::debug!(%which, "Computed time_of_day");
    which.to_string()
}

fn classify_time(tod: NaiveTime) -> &'static str {
    let morning_high = NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default();
    let afternoon_high = NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default();

    if tod < morning_high {
        "morning"
    } else if tod < afternoon_high {
        "afternoon"
    } else {
        "evening"
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the dropped bytes appended.
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let kept = truncate_chars(s, max);
    if kept.len() == s.len() {
        s.to_string()
    } else {
        format!("{}…(+{} bytes)", kept, s.len() - kept.len())
    }
}

/// Return the longest prefix of `s` holding at most `max` characters.
///
/// Cuts on a character boundary, never inside a multi-byte sequence.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Convert arbitrary text to a lowercase, hyphenated, file-name-safe slug.
///
/// Anything outside `[a-z0-9_-]` (`:`, `/`, `.`, spaces) becomes a hyphen, so
/// the result can never escape the directory it is joined onto.
///
/// ```ignore
/// assert_eq!(slugify("News-Bite:Top Headlines"), "news-bite-top-headlines");
/// ```
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then writes and removes a
/// scratch file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let check_path = format!("{}/..__write_check__", path.trim_end_matches('/'));
    match stdfs::File::create(&check_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&check_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
