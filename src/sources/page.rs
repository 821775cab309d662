//! Raw article page fetch for the `remote_page` content policy.

use super::PageSource;
use crate::config::PageConfig;
use crate::error::{PipelineError, Result};
use crate::extract::extract_text;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const TARGET: &str = "article page";

/// Downloads article HTML with browser-like headers and extracts its text.
#[derive(Debug)]
pub struct PageFetcher {
    http: reqwest::Client,
    max_chars: usize,
}

impl PageFetcher {
    pub fn new(config: &PageConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| PipelineError::from_reqwest(TARGET, e))?;
        Ok(Self {
            http,
            max_chars: config.max_chars,
        })
    }
}

impl PageSource for PageFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch_page_text(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| PipelineError::InvalidPayload {
                target: TARGET.to_string(),
                reason: format!("not an http(s) URL: {url}"),
            })?;

        let response = self
            .http
            .get(parsed)
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

        let html = response.text().await.map_err(|e| PipelineError::from_reqwest(TARGET, e))?;
        let text = extract_text(&html, self.max_chars);
        debug!(html_bytes = html.len(), text_chars = text.chars().count(), "Extracted page text");
        Ok(text)
    }
}
