// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fetch::Fetcher;

/// Which adapter produced a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Origin {
    /// Feed display name, e.g. "GitHub Blog".
    Feed(String),
    Trending,
}

impl Origin {
    pub fn is_trending(&self) -> bool {
        matches!(self, Origin::Trending)
    }

    pub fn name(&self) -> &str {
        match self {
            Origin::Feed(n) => n,
            Origin::Trending => "trending",
        }
    }
}

/// A link candidate as produced by an adapter. `url` is already canonical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String, // host label, e.g. "github.blog"
    pub tags_seed: Vec<String>,
    pub origin: Origin,
    pub trending_score: Option<f64>,
    pub author: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl CandidateRecord {
    /// Text the classifier scores: title, summary, source and seed tags.
    pub fn classifier_text(&self) -> String {
        let mut parts = vec![self.title.as_str(), self.summary.as_str(), self.source.as_str()];
        parts.extend(self.tags_seed.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// One explicit adapter contract per source kind.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self, fetcher: &dyn Fetcher) -> Result<Vec<CandidateRecord>>;
    fn name(&self) -> &str;
}
