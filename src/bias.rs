// src/bias.rs
//! Historical bias estimator.
//!
//! Reads previously published items with vote aggregates from the community
//! content API, attributes a vote signal to each item's tags, and normalizes
//! the per-tag average into `[-1, 1]`. The same pass collects every URL that is
//! already published so the selector can skip it.
//!
//! Pagination is offset-based, stops on a short page, and never exceeds
//! `remote_max_pages` requests whatever the server returns.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::canonical::canonicalize;
use crate::config::{BiasWeights, CuratorConfig};
use crate::error::{CurateError, FetchError, Result};
use crate::fetch::Fetcher;
use crate::ingest::normalize_text;

/// Lowercased tag → bias in `[-1, 1]`.
pub type TagBias = HashMap<String, f64>;

/// Remote payloads use `null` and absent fields interchangeably.
fn null_as_default<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct VoteCounts {
    #[serde(default, deserialize_with = "null_as_default")]
    pub must_see: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommended: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub not_for_me: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PublishedItem {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vote_counts: VoteCounts,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<PublishedItem>,
}

/// Read-only contract for the remote publishing system.
#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn page(&self, offset: usize, limit: usize) -> Result<ContentPage>;
}

/// `GET {api_base}/api/community/content?view=new&limit=L&offset=N`
pub struct CommunityContentApiV1<'a> {
    api_base: String,
    fetcher: &'a dyn Fetcher,
}

impl<'a> CommunityContentApiV1<'a> {
    pub fn new(api_base: &str, fetcher: &'a dyn Fetcher) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            fetcher,
        }
    }

    pub fn page_url(&self, offset: usize, limit: usize) -> std::result::Result<String, FetchError> {
        let base = format!("{}/api/community/content", self.api_base);
        let limit = limit.to_string();
        let offset = offset.to_string();
        Url::parse_with_params(
            &base,
            [
                ("view", "new"),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ],
        )
        .map(String::from)
        .map_err(|_| FetchError::InvalidUrl { url: base })
    }
}

#[async_trait]
impl ContentApi for CommunityContentApiV1<'_> {
    async fn page(&self, offset: usize, limit: usize) -> Result<ContentPage> {
        let url = self.page_url(offset, limit)?;
        let body = self.fetcher.fetch(&url).await?;
        serde_json::from_slice(&body).map_err(|e| CurateError::parse("community content api", e))
    }
}

/// What the remote system already knows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteHistory {
    pub existing_urls: HashSet<String>,
    pub tag_bias: TagBias,
    pub pages_read: usize,
}

impl RemoteHistory {
    pub fn is_cold(&self) -> bool {
        self.existing_urls.is_empty() && self.tag_bias.is_empty()
    }

    /// Highest biases first (ties by tag name), for logging.
    pub fn top_bias(&self, n: usize) -> Vec<(String, f64)> {
        let mut v: Vec<(String, f64)> = self
            .tag_bias
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        v.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        v.truncate(n);
        v
    }
}

pub fn vote_signal(votes: &VoteCounts, w: &BiasWeights) -> f64 {
    w.must_see * votes.must_see + w.recommended * votes.recommended + w.not_for_me * votes.not_for_me
}

fn tag_key(raw: &serde_json::Value) -> String {
    let text = match raw {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    normalize_text(&text).to_lowercase()
}

/// Walk the paginated API and build the bias map plus the existing-URL set.
pub async fn estimate(api: &dyn ContentApi, cfg: &CuratorConfig) -> Result<RemoteHistory> {
    let page_size = cfg.remote_page_size.max(1);
    let mut out = RemoteHistory::default();
    let mut signals: HashMap<String, Vec<f64>> = HashMap::new();
    let mut offset = 0usize;

    for _ in 0..cfg.remote_max_pages {
        let page = api.page(offset, page_size).await?;
        out.pages_read += 1;
        let count = page.items.len();

        for item in page.items {
            if let Some(url) = item.url.as_deref().and_then(canonicalize) {
                out.existing_urls.insert(url);
            }
            let signal = vote_signal(&item.vote_counts, &cfg.bias);
            for tag in &item.tags {
                let key = tag_key(tag);
                if !key.is_empty() {
                    signals.entry(key).or_default().push(signal);
                }
            }
        }

        if count < page_size {
            break;
        }
        offset += page_size;
    }

    for (tag, values) in signals {
        if values.is_empty() {
            continue;
        }
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        out.tag_bias
            .insert(tag, (avg / cfg.bias.divisor).clamp(-1.0, 1.0));
    }
    Ok(out)
}

/// Like `estimate`, but any failure degrades to an empty (cold start) history.
pub async fn estimate_or_cold_start(api: &dyn ContentApi, cfg: &CuratorConfig) -> RemoteHistory {
    match estimate(api, cfg).await {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!(error = %e, "unable to read existing remote content; continuing in cold-start mode");
            RemoteHistory::default()
        }
    }
}
