//! NewsAPI top-headlines listing source.
//!
//! Calls `GET /v2/top-headlines?country=..&category=..&pageSize=..` with the
//! key in the `X-Api-Key` header. The response's `articles` array already has
//! the [`ContentItem`] shape.

use super::ListingSource;
use crate::config::NewsConfig;
use crate::error::{PipelineError, Result};
use crate::models::ContentItem;
use itertools::Itertools;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

const TARGET: &str = "newsapi";

/// Title NewsAPI substitutes for articles pulled by the publisher.
const REMOVED_TITLE: &str = "[Removed]";

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Option<Vec<serde_json::Value>>,
}

/// Primary listing source backed by NewsAPI.
#[derive(Debug)]
pub struct NewsApiSource {
    http: reqwest::Client,
    config: NewsConfig,
}

impl NewsApiSource {
    pub fn new(config: NewsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("NewsBite/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::from_reqwest(TARGET, e))?;
        Ok(Self { http, config })
    }

    fn request_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.config.endpoint).map_err(|e| PipelineError::InvalidPayload {
            target: TARGET.to_string(),
            reason: format!("bad endpoint {}: {e}", self.config.endpoint),
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("country", &self.config.country);
            if let Some(category) = self.config.category.as_deref().filter(|c| !c.is_empty()) {
                query.append_pair("category", category);
            }
            query.append_pair("pageSize", &self.config.page_size.to_string());
        }
        Ok(url)
    }
}

impl ListingSource for NewsApiSource {
    #[instrument(level = "info", skip_all, fields(country = %self.config.country, category = ?self.config.category))]
    async fn fetch_listing(&self) -> Result<Vec<ContentItem>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(PipelineError::MissingCredential("NEWS_API_KEY"))?;

        let url = self.request_url()?;
        let t0 = Instant::now();
        let response = self
            .http
            .get(url)
            .header("X-Api-Key", api_key)
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(TARGET, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::UpstreamStatus {
                target: TARGET.to_string(),
                status: status.as_u16(),
            });
        }

        let body: NewsApiResponse = response.json().await.map_err(|e| PipelineError::InvalidPayload {
            target: TARGET.to_string(),
            reason: e.to_string(),
        })?;

        if body.status != "ok" {
            return Err(PipelineError::InvalidPayload {
                target: TARGET.to_string(),
                reason: format!(
                    "status {}: {}",
                    body.status,
                    body.message.unwrap_or_default()
                ),
            });
        }

        let articles = body.articles.ok_or_else(|| PipelineError::InvalidPayload {
            target: TARGET.to_string(),
            reason: "response has no articles".to_string(),
        })?;

        let received = articles.len();
        let items = dedupe_listing(decode_articles(articles));
        if items.len() != received {
            warn!(received, kept = items.len(), "Dropped undecodable, duplicate or removed listing items");
        }

        info!(
            count = items.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched NewsAPI headlines"
        );
        debug!(urls = ?items.iter().map(|i| i.url.as_str()).collect::<Vec<_>>(), "NewsAPI URLs");
        Ok(items)
    }
}

/// Decode each article on its own so one malformed entry costs only itself.
fn decode_articles(raw: Vec<serde_json::Value>) -> Vec<ContentItem> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<ContentItem>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(index, error = %e, "Skipping undecodable listing item");
                None
            }
        })
        .collect()
}

/// Keep the first item per URL and drop articles the publisher removed.
fn dedupe_listing(articles: Vec<ContentItem>) -> Vec<ContentItem> {
    articles
        .into_iter()
        .filter(|a| a.title != REMOVED_TITLE)
        .unique_by(|a| a.url.clone())
        .collect()
}
