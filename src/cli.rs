//! Command-line interface definitions for News Bite.
//!
//! Credentials and the listing query can come from flags or environment
//! variables. Everything else lives in the optional YAML config file.

use crate::config::AppConfig;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the News Bite application.
///
/// # Examples
///
/// ```sh
/// # Print the current digest to stdout
/// news_bite
///
/// # Write {dir}/{date}/{time_of_day}.json, bypassing the cache
/// news_bite -j ./json --refresh
///
/// # Inspect the cache without fetching anything
/// news_bite --status -c config.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for the JSON digest (stdout when omitted)
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Invalidate the cached batch before aggregating
    #[arg(long, conflicts_with = "status")]
    pub refresh: bool,

    /// Report cache freshness and exit without fetching
    #[arg(long)]
    pub status: bool,

    /// Remove every cached batch and exit
    #[arg(long, conflicts_with_all = ["status", "refresh"])]
    pub clear_cache: bool,

    /// NewsAPI key
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: Option<String>,

    /// OpenRouter API key (mock summaries are used when absent)
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    /// Two-letter country code for top headlines
    #[arg(long, env = "NEWS_COUNTRY")]
    pub country: Option<String>,

    /// Headline category (business, technology, ...)
    #[arg(long, env = "NEWS_CATEGORY")]
    pub category: Option<String>,
}

impl Cli {
    /// Layer CLI and environment values over the file configuration.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(key) = non_blank(&self.news_api_key) {
            config.news.api_key = Some(key);
        }
        if let Some(key) = non_blank(&self.openrouter_api_key) {
            config.summarizer.api_key = Some(key);
        }
        if let Some(country) = non_blank(&self.country) {
            config.news.country = country;
        }
        if let Some(category) = non_blank(&self.category) {
            config.news.category = Some(category);
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
