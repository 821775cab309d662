//! LLM summarization client with exponential backoff retry logic.
//!
//! This module talks to an OpenAI-compatible chat completion endpoint
//! (OpenRouter by default) and turns one article's text into exactly three
//! bullet points.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`Summarizer`]: core trait for turning content into a summary
//! - [`OpenRouterClient`]: the HTTP implementation
//! - [`RetrySummarizer`]: decorator that adds retry logic to any [`Summarizer`]
//! - [`MockSummarizer`]: deterministic stand-in used when no API key is configured
//! - [`SummarizerBackend`]: the concrete choice made at startup
//!
//! # Retry Strategy
//!
//! - Configurable number of retries (default 2)
//! - Exponential backoff from a configurable base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::SummarizerConfig;
use crate::error::{PipelineError, Result};
use crate::utils::{truncate_chars, truncate_for_log};
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Instruction sent as the system message on every request.
pub const SYSTEM_PROMPT: &str = "You are an assistant that always responds in exactly 3 concise bullet points. \
Do not add introductions like 'Here is your summary' or 'Summary:' - only output the bullet points directly.";

/// Trait for turning article text into a short summary.
pub trait Summarizer {
    /// Summarize `content`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Summarization`] when the provider call fails,
    /// answers with a non-success status, or produces no usable text.
    async fn summarize(&self, content: &str) -> Result<String>;
}

/// Wrapper that adds exponential backoff retry logic to any [`Summarizer`].
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetrySummarizer<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetrySummarizer<T>
where
    T: Summarizer,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetrySummarizer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySummarizer")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Summarizer for RetrySummarizer<T>
where
    T: Summarizer,
{
    #[instrument(level = "debug", skip_all)]
    async fn summarize(&self, content: &str) -> Result<String> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.summarize(content).await {
                Ok(summary) => return Ok(summary),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "summarize() exhausted retries"
                        );
                        return Err(e);
                    }

                    let shift = u32::try_from(attempt - 1).unwrap_or(u32::MAX).min(16);
                    let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "summarize() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completion client for OpenRouter or any OpenAI-compatible endpoint.
pub struct OpenRouterClient {
    http: reqwest::Client,
    config: SummarizerConfig,
    api_key: String,
}

impl fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl OpenRouterClient {
    pub fn new(config: SummarizerConfig, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::from_reqwest("summarizer", e))?;
        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    fn prompt_for(&self, content: &str) -> String {
        let bounded = truncate_chars(content.trim(), self.config.max_input_chars);
        format!("Summarize this article in 3 bullet points:\n\n{bounded}")
    }
}

impl Summarizer for OpenRouterClient {
    #[instrument(level = "debug", skip_all, fields(model = %self.config.model))]
    async fn summarize(&self, content: &str) -> Result<String> {
        let t0 = Instant::now();
        let user_prompt = self.prompt_for(content);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.app_title)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let err = PipelineError::from_reqwest("summarizer", e);
                PipelineError::Summarization(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %truncate_for_log(&body, 300),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Summarizer returned non-success status"
            );
            return Err(PipelineError::Summarization(format!("provider responded with HTTP {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Summarization(format!("undecodable response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| PipelineError::Summarization("response had no message content".to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::Summarization("provider returned an empty summary".to_string()));
        }

        debug!(elapsed_ms = t0.elapsed().as_millis() as u64, chars = text.len(), "Summary received");
        Ok(text.to_string())
    }
}

/// Deterministic summarizer used when no provider credential is configured.
///
/// Builds up to three bullets from the leading sentences of the content.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockSummarizer;

impl MockSummarizer {
    const MAX_BULLET_CHARS: usize = 160;
}

impl Summarizer for MockSummarizer {
    async fn summarize(&self, content: &str) -> Result<String> {
        let bullets: Vec<String> = content
            .split_inclusive(['.', '!', '?'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(3)
            .map(|s| format!("- {}", truncate_chars(s, Self::MAX_BULLET_CHARS)))
            .collect();

        if bullets.is_empty() {
            return Err(PipelineError::Summarization("nothing to summarize".to_string()));
        }
        Ok(bullets.join("\n"))
    }
}

/// The summarizer chosen at startup.
#[derive(Debug)]
pub enum SummarizerBackend {
    Live(RetrySummarizer<OpenRouterClient>),
    Mock(MockSummarizer),
}

impl SummarizerBackend {
    /// Build the live client when an API key is present, otherwise the mock.
    pub fn from_config(config: &SummarizerConfig) -> Result<Self> {
        match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                let client = OpenRouterClient::new(config.clone(), key.to_string())?;
                let retrying = RetrySummarizer::new(
                    client,
                    config.max_retries,
                    StdDuration::from_millis(config.retry_base_delay_ms),
                );
                info!(model = %config.model, endpoint = %config.endpoint, "Using live summarizer");
                Ok(Self::Live(retrying))
            }
            _ => {
                warn!("No summarizer API key configured; using mock summaries");
                Ok(Self::Mock(MockSummarizer))
            }
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, Self::Mock(_))
    }
}

impl Summarizer for SummarizerBackend {
    async fn summarize(&self, content: &str) -> Result<String> {
        match self {
            Self::Live(client) => client.summarize(content).await,
            Self::Mock(mock) => mock.summarize(content).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> SummarizerConfig {
        SummarizerConfig {
            endpoint: format!("{}/api/v1/chat/completions", server.uri()),
            max_retries: 0,
            retry_base_delay_ms: 1,
            timeout_secs: 5,
            api_key: Some("test-key".to_string()),
            ..SummarizerConfig::default()
        }
    }

    fn completion(content: serde_json::Value) -> serde_json::Value {
        serde_json::json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
    }

    #[tokio::test]
    async fn test_summarize_sends_contract_and_trims_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(header("x-title", "News Bite"))
            .and(body_partial_json(serde_json::json!({
                "model": "google/gemma-3-12b-it:free",
                "temperature": 0.3,
                "max_tokens": 400,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("\n- a\n- b\n- c\n".into())))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(config_for(&server), "test-key".to_string()).unwrap();
        let summary = client.summarize("Some article text").await.unwrap();
        assert_eq!(summary, "- a\n- b\n- c");
    }

    #[tokio::test]
    async fn test_content_is_truncated_before_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("- ok".into())))
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.max_input_chars = 10;
        let client = OpenRouterClient::new(config, "test-key".to_string()).unwrap();
        client.summarize(&"x".repeat(500)).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert_eq!(user, format!("Summarize this article in 3 bullet points:\n\n{}", "x".repeat(10)));
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_non_success_status_is_summarization_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(config_for(&server), "test-key".to_string()).unwrap();
        let err = client.summarize("text").await.unwrap_err();
        assert_eq!(err.kind(), "summarization");
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_missing_or_empty_content_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("   \n ".into())))
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(config_for(&server), "test-key".to_string()).unwrap();
        let first = client.summarize("text").await.unwrap_err();
        assert!(first.to_string().contains("no message content"));
        let second = client.summarize("text").await.unwrap_err();
        assert!(second.to_string().contains("empty summary"));
    }

    #[tokio::test]
    async fn test_null_content_is_failure_not_empty_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(serde_json::Value::Null)))
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(config_for(&server), "test-key".to_string()).unwrap();
        assert!(client.summarize("text").await.is_err());
    }

    #[derive(Debug, Default)]
    struct Flaky {
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    impl Summarizer for Flaky {
        async fn summarize(&self, _content: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(PipelineError::Summarization("transient".to_string()));
            }
            Ok("- done".to_string())
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let flaky = Flaky {
            failures_left: AtomicUsize::new(2),
            calls: AtomicUsize::new(0),
        };
        let retrying = RetrySummarizer::new(flaky, 2, StdDuration::from_millis(1));
        assert_eq!(retrying.summarize("x").await.unwrap(), "- done");
        assert_eq!(retrying.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let flaky = Flaky {
            failures_left: AtomicUsize::new(10),
            calls: AtomicUsize::new(0),
        };
        let retrying = RetrySummarizer::new(flaky, 1, StdDuration::from_millis(1));
        assert!(retrying.summarize("x").await.is_err());
        assert_eq!(retrying.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mock_summarizer_builds_three_bullets() {
        let text = "First point. Second point! Third point? Fourth point.";
        let summary = MockSummarizer.summarize(text).await.unwrap();
        assert_eq!(summary, "- First point.\n- Second point!\n- Third point?");
        assert!(MockSummarizer.summarize("   ").await.is_err());
    }

    #[test]
    fn test_backend_without_key_is_mock() {
        let backend = SummarizerBackend::from_config(&SummarizerConfig::default()).unwrap();
        assert!(backend.is_mock());

        let config = SummarizerConfig {
            api_key: Some("  ".to_string()),
            ..SummarizerConfig::default()
        };
        assert!(SummarizerBackend::from_config(&config).unwrap().is_mock());
    }
}
