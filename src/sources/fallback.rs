//! Static fallback dataset.
//!
//! A local JSON file in the same shape as the live listing, read whenever the
//! primary source fails. Records may optionally carry a pre-written `summary`,
//! used when the fallback batch is not re-summarized.
//!
//! Both `{"articles": [...]}` and a bare `[...]` array are accepted. If the
//! file is missing or unreadable, a single placeholder item is returned so the
//! display layer always has something to show.

use crate::error::{PipelineError, Result};
use crate::models::{ContentItem, SourceRef};
use chrono::Utc;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// One entry of the fallback file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FallbackRecord {
    #[serde(flatten)]
    pub item: ContentItem,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FallbackFile {
    Wrapped { articles: Vec<FallbackRecord> },
    Bare(Vec<FallbackRecord>),
}

/// Loader for the static fallback dataset.
#[derive(Debug, Clone)]
pub struct StaticDataset {
    path: PathBuf,
}

impl StaticDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the dataset, substituting a placeholder if the file is unusable.
    ///
    /// # Returns
    ///
    /// The records in file order. A missing or malformed file yields a single
    /// placeholder record instead.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub fn load(&self) -> Vec<FallbackRecord> {
        match self.try_load() {
            Ok(records) => {
                info!(count = records.len(), "Loaded fallback dataset");
                records
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Fallback dataset unusable; serving placeholder");
                vec![placeholder()]
            }
        }
    }

    pub fn try_load(&self) -> Result<Vec<FallbackRecord>> {
        let unavailable = |reason: String| PipelineError::FallbackUnavailable {
            path: self.path.display().to_string(),
            reason,
        };
        let raw = fs::read_to_string(&self.path).map_err(|e| unavailable(e.to_string()))?;
        let parsed: FallbackFile = serde_json::from_str(&raw).map_err(|e| unavailable(e.to_string()))?;
        Ok(match parsed {
            FallbackFile::Wrapped { articles } => articles,
            FallbackFile::Bare(articles) => articles,
        })
    }
}

fn placeholder() -> FallbackRecord {
    FallbackRecord {
        item: ContentItem {
            source: Some(SourceRef {
                id: None,
                name: "Fallback News".to_string(),
            }),
            author: Some("System".to_string()),
            title: "News service temporarily unavailable".to_string(),
            description: Some("Please try again later.".to_string()),
            url: "#".to_string(),
            url_to_image: None,
            published_at: Some(Utc::now()),
            content: Some("News service is temporarily unavailable. Please try again later.".to_string()),
        },
        summary: None,
    }
}
