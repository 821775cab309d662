//! Error taxonomy for the aggregation pipeline.
//!
//! Every variant here has a defined degraded outcome further up the stack:
//! listing failures fall back to the static dataset, summarization failures
//! become a sentinel summary, and cache failures are treated as misses.
//! Nothing in this enum is ever shown to the display layer.

use thiserror::Error;

/// Errors produced by pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Upstream was unreachable, the connection failed, or the call timed out.
    #[error("transport error calling {target}: {message}")]
    Transport { target: String, message: String },

    /// Upstream answered with a non-success HTTP status.
    #[error("{target} responded with HTTP {status}")]
    UpstreamStatus { target: String, status: u16 },

    /// Upstream answered 2xx but the body did not have the expected shape.
    #[error("invalid payload from {target}: {reason}")]
    InvalidPayload { target: String, reason: String },

    /// A credential needed for a live call is not configured.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// Not enough text to produce a meaningful summary.
    #[error("insufficient content: {chars} chars (minimum {min})")]
    ContentInsufficient { chars: usize, min: usize },

    /// The summarization provider failed or returned nothing usable.
    #[error("summarization failed: {0}")]
    Summarization(String),

    /// A durable cache record could not be decoded.
    #[error("corrupt cache record for {key}: {reason}")]
    CacheCorruption { key: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The static fallback dataset could not be loaded.
    #[error("fallback dataset {path} unavailable: {reason}")]
    FallbackUnavailable { path: String, reason: String },
}

impl PipelineError {
    /// Build a transport or upstream-status error from a `reqwest` failure.
    pub fn from_reqwest(target: &str, e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::UpstreamStatus {
                target: target.to_string(),
                status: status.as_u16(),
            },
            None => Self::Transport {
                target: target.to_string(),
                message: if e.is_timeout() {
                    format!("timed out: {e}")
                } else {
                    e.to_string()
                },
            },
        }
    }

    /// Short stable label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::UpstreamStatus { .. } => "upstream_status",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::MissingCredential(_) => "missing_credential",
            Self::ContentInsufficient { .. } => "content_insufficient",
            Self::Summarization(_) => "summarization",
            Self::CacheCorruption { .. } => "cache_corruption",
            Self::Io(_) => "io",
            Self::FallbackUnavailable { .. } => "fallback_unavailable",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
