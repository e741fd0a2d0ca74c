// src/ingest/providers/trending.rs
//! Trending-search adapter (Algolia `search_by_date` story search).
//!
//! One provider per topical query so the ingest runner can fetch queries
//! concurrently and time them out independently.

use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;
use url::Url;

use crate::canonical::{canonicalize, source_host};
use crate::config::TrendingCfg;
use crate::error::{CurateError, FetchError, Result};
use crate::fetch::Fetcher;
use crate::ingest::types::{CandidateRecord, Origin, SourceProvider};
use crate::ingest::{normalize_text, parse_timestamp};

pub const TRENDING_SEED_TAG: &str = "trending-tech";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    title: Option<String>,
    url: Option<String>,
    points: Option<f64>,
    created_at: Option<String>,
}

pub struct TrendingProvider {
    name: String,
    endpoint: String,
    display_name: String,
    label: String,
    query: String,
    hits_per_page: usize,
}

impl TrendingProvider {
    pub fn new(cfg: &TrendingCfg, query: &str, hits_per_page: usize) -> Self {
        Self {
            name: format!("{} `{}`", cfg.display_name, query),
            endpoint: cfg.endpoint.clone(),
            display_name: cfg.display_name.clone(),
            label: cfg.label.clone(),
            query: query.to_string(),
            hits_per_page,
        }
    }

    /// One provider per configured query.
    pub fn all(cfg: &TrendingCfg, hits_per_page: usize) -> Vec<Self> {
        cfg.queries
            .iter()
            .map(|q| Self::new(cfg, q, hits_per_page))
            .collect()
    }

    pub fn request_url(&self) -> std::result::Result<String, FetchError> {
        let hits = self.hits_per_page.to_string();
        Url::parse_with_params(
            &self.endpoint,
            [
                ("query", self.query.as_str()),
                ("tags", "story"),
                ("hitsPerPage", hits.as_str()),
            ],
        )
        .map(String::from)
        .map_err(|_| FetchError::InvalidUrl {
            url: self.endpoint.clone(),
        })
    }

    pub fn parse_hits(&self, payload: &[u8]) -> Result<Vec<CandidateRecord>> {
        let resp: SearchResponse =
            serde_json::from_slice(payload).map_err(|e| CurateError::parse(&self.name, e))?;

        let mut out = Vec::with_capacity(resp.hits.len());
        for hit in resp.hits {
            let Some(url) = hit.url.as_deref().and_then(canonicalize) else {
                continue;
            };
            let title = normalize_text(hit.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            let points = hit.points.filter(|p| p.is_finite()).unwrap_or(0.0).max(0.0);
            out.push(CandidateRecord {
                title,
                summary: format!("Trending on {} ({} points).", self.display_name, points as u64),
                published_at: hit.created_at.as_deref().and_then(parse_timestamp),
                source: source_host(&url),
                url,
                tags_seed: vec![TRENDING_SEED_TAG.to_string(), self.label.clone()],
                origin: Origin::Trending,
                trending_score: Some(points),
                author: None,
                thumbnail_url: None,
            });
        }
        counter!("curator_candidates_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for TrendingProvider {
    async fn fetch_latest(&self, fetcher: &dyn Fetcher) -> Result<Vec<CandidateRecord>> {
        let url = self.request_url()?;
        let body = fetcher.fetch(&url).await?;
        self.parse_hits(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
