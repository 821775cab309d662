//! Runtime configuration loaded from YAML.
//!
//! Every field has a default, so a missing or partial file is fine:
//!
//! ```yaml
//! news:
//!   country: us
//!   category: technology
//!   page_size: 12
//! summarizer:
//!   model: google/gemma-3-12b-it:free
//! enrichment:
//!   concurrency: 4
//!   content_policy: remote_page
//! cache:
//!   ttl_secs: 7200
//!   dir: /var/cache/news_bite
//! ```
//!
//! Credentials are never read from this file; they come from the CLI or the
//! environment (see [`crate::cli::Cli`]).

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub news: NewsConfig,
    pub summarizer: SummarizerConfig,
    pub enrichment: EnrichmentConfig,
    pub page: PageConfig,
    pub cache: CacheConfig,
    pub fallback: FallbackConfig,
}

/// Primary listing source (NewsAPI top-headlines).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub endpoint: String,
    pub country: String,
    pub category: Option<String>,
    pub page_size: u32,
    pub timeout_secs: u64,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://newsapi.org/v2/top-headlines".to_string(),
            country: "us".to_string(),
            category: None,
            page_size: 12,
            timeout_secs: 10,
            api_key: None,
        }
    }
}

/// OpenAI-compatible chat completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Content is cut to this many characters before it is sent.
    pub max_input_chars: usize,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    pub referer: String,
    pub app_title: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "google/gemma-3-12b-it:free".to_string(),
            temperature: 0.3,
            max_tokens: 400,
            max_input_chars: 5000,
            timeout_secs: 30,
            max_retries: 2,
            retry_base_delay_ms: 1000,
            referer: "https://news-bite.example".to_string(),
            app_title: "News Bite".to_string(),
            api_key: None,
        }
    }
}

/// Where the text handed to the summarizer comes from.
///
/// One policy applies to every item in a process; it is never chosen per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPolicy {
    /// Use the listing's own `content`, `description` or `title`.
    #[default]
    Listing,
    /// Fetch and extract each item's page, falling back to the listing fields.
    RemotePage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Items summarized at once. `1` processes the batch sequentially.
    pub concurrency: usize,
    pub content_policy: ContentPolicy,
    /// Text shorter than this (after trimming) is never sent to the summarizer.
    pub min_content_chars: usize,
    /// Outer bound on one item's enrichment, retries included.
    pub item_timeout_secs: u64,
    /// Summarize the static fallback dataset too.
    pub enrich_fallback: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            content_policy: ContentPolicy::Listing,
            min_content_chars: 50,
            item_timeout_secs: 90,
            enrich_fallback: true,
        }
    }
}

/// Raw article page fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub timeout_secs: u64,
    pub max_chars: usize,
    pub user_agent: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_chars: crate::extract::DEFAULT_MAX_CHARS,
            user_agent: "Mozilla/5.0 (compatible; NewsBot/1.0)".to_string(),
        }
    }
}

/// Where batches persist between runs unless configured otherwise.
pub const DEFAULT_CACHE_DIR: &str = ".cache/news_bite";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub key: String,
    pub ttl_secs: u64,
    /// Durable tier directory, relative to the working directory unless
    /// absolute. `null` keeps the cache in memory only, which a one-shot CLI
    /// run never reuses.
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key: "news-bite:top-headlines".to_string(),
            ttl_secs: 3600,
            dir: Some(PathBuf::from(DEFAULT_CACHE_DIR)),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub path: PathBuf,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/fallback-news.json"),
        }
    }
}

/// Load configuration from `path`, or defaults when no path is given.
#[instrument(level = "info")]
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn Error>> {
    let Some(path) = path else {
        info!("No config file given; using defaults");
        return Ok(AppConfig::default());
    };
    let raw = std::fs::read_to_string(path)?;
    let config = parse_config(&raw)?;
    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

pub fn parse_config(raw: &str) -> Result<AppConfig, serde_yaml::Error> {
    serde_yaml::from_str(raw)
}
