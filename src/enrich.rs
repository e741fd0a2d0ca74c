// src/enrich.rs
//! Enricher: turns a selected candidate into a publishable `CuratedItem`.
//!
//! Media type comes from the host tables first, then from keywords. A page
//! preview (meta description / og:image) is fetched only when the summary is
//! short or the thumbnail is missing; preview failures are never fatal.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use url::Url;

use crate::canonical::{canonicalize, host_matches, source_host};
use crate::config::CuratorConfig;
use crate::fetch::Fetcher;
use crate::ingest::normalize_text;
use crate::ingest::types::CandidateRecord;
use crate::score::ScoredCandidate;

const SHORT_SUMMARY_CHARS: usize = 60;
const MIN_PREVIEW_DESCRIPTION_CHARS: usize = 40;
const ELLIPSIS: &str = "...";
const ID_HEX_LEN: usize = 12;

const VIDEO_KEYWORDS: [&str; 3] = ["video", "livestream", "shorts"];
const PODCAST_KEYWORDS: [&str; 3] = ["podcast", "episode", "audio"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Podcast,
    Article,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Podcast => "podcast",
            MediaType::Article => "article",
        }
    }
}

/// Record written once per curated item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub media_type: MediaType,
    pub thumbnail_url: Option<String>,
    pub tags: Vec<String>,
    pub author: Option<String>,
}

/// First 12 hex chars of SHA-256 over the canonical URL.
pub fn item_id(canonical_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_url.as_bytes());
    let digest = hasher.finalize();
    let mut hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex.truncate(ID_HEX_LEN);
    hex
}

/// ASCII alphanumerics joined by single dashes, lowercase; `item` when empty.
pub fn slugify(text: &str) -> String {
    static RE_NON_ALNUM: OnceCell<Regex> = OnceCell::new();
    let re = RE_NON_ALNUM.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]+").unwrap());
    let slug = re
        .replace_all(text, "-")
        .trim_matches('-')
        .to_ascii_lowercase();
    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}

pub fn infer_media_type(
    candidate: &CandidateRecord,
    inferred_tags: &[String],
    cfg: &CuratorConfig,
) -> MediaType {
    let host = source_host(&candidate.url);
    if cfg.video_hosts.iter().any(|h| host_matches(&host, h)) {
        return MediaType::Video;
    }
    if cfg.podcast_hosts.iter().any(|h| host_matches(&host, h)) {
        return MediaType::Podcast;
    }

    let text = [
        candidate.title.as_str(),
        candidate.summary.as_str(),
        candidate.tags_seed.join(" ").as_str(),
        inferred_tags.join(" ").as_str(),
    ]
    .join(" ")
    .to_lowercase();

    if VIDEO_KEYWORDS.iter().any(|k| text.contains(k)) {
        MediaType::Video
    } else if PODCAST_KEYWORDS.iter().any(|k| text.contains(k)) {
        MediaType::Podcast
    } else {
        MediaType::Article
    }
}

/// `https://i.ytimg.com/vi/{id}/hqdefault.jpg` for youtu.be and youtube.com watch links.
pub fn youtube_thumbnail(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let video_id = if host_matches(&host, "youtu.be") {
        parsed.path().trim_matches('/').to_string()
    } else if host_matches(&host, "youtube.com") {
        parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())?
    } else {
        return None;
    };
    if video_id.is_empty() {
        return None;
    }
    Some(format!("https://i.ytimg.com/vi/{video_id}/hqdefault.jpg"))
}

/// Cap at `max_chars` characters, ellipsis included.
pub fn truncate_summary(summary: &str, max_chars: usize) -> String {
    if summary.chars().count() <= max_chars {
        return summary.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let head: String = summary.chars().take(keep).collect();
    format!("{}{ELLIPSIS}", head.trim_end())
}

/// Inferred topics, then the default tags; cleaned, lowercase, unique, capped.
pub fn build_tags(inferred_tags: &[String], cfg: &CuratorConfig) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for raw in inferred_tags.iter().chain(cfg.default_tags.iter()) {
        let cleaned = normalize_text(raw).to_lowercase();
        if !cleaned.is_empty() && seen.insert(cleaned.clone()) {
            tags.push(cleaned);
        }
    }
    tags.truncate(cfg.max_tags);
    tags
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preview {
    pub description: String,
    pub image: Option<String>,
}

pub fn parse_preview(html: &str) -> Preview {
    static RE_DESC: OnceCell<Regex> = OnceCell::new();
    static RE_IMAGE: OnceCell<Regex> = OnceCell::new();
    let re_desc = RE_DESC.get_or_init(|| {
        Regex::new(
            r#"(?i)<meta[^>]+(?:name|property)=["'](?:description|og:description)["'][^>]+content=["']([^"']+)["'][^>]*>"#,
        )
        .unwrap()
    });
    let re_image = RE_IMAGE.get_or_init(|| {
        Regex::new(
            r#"(?i)<meta[^>]+(?:name|property)=["'](?:og:image|twitter:image)["'][^>]+content=["']([^"']+)["'][^>]*>"#,
        )
        .unwrap()
    });

    let description = re_desc
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| normalize_text(m.as_str()))
        .unwrap_or_default();
    let image = re_image
        .captures(html)
        .and_then(|c| c.get(1))
        .and_then(|m| canonicalize(&html_escape::decode_html_entities(m.as_str())));
    Preview { description, image }
}

/// Binds the configuration, fetcher and run timestamp for one run.
pub struct Enricher<'a> {
    cfg: &'a CuratorConfig,
    fetcher: &'a dyn Fetcher,
    created_at: DateTime<Utc>,
    deadline: Option<Instant>,
}

impl<'a> Enricher<'a> {
    pub fn new(cfg: &'a CuratorConfig, fetcher: &'a dyn Fetcher, created_at: DateTime<Utc>) -> Self {
        Self {
            cfg,
            fetcher,
            created_at,
            deadline: None,
        }
    }

    /// Past `deadline` no preview is fetched; items keep their adapter summary.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    async fn preview(&self, url: &str) -> Preview {
        let http = &self.cfg.http;
        let fetch = self
            .fetcher
            .fetch_limited(url, http.preview_timeout(), Some(http.preview_max_bytes));
        let fetched = match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                tracing::debug!(url, "run budget spent; preview skipped");
                return Preview::default();
            }
            Some(deadline) => match tokio::time::timeout_at(deadline, fetch).await {
                Ok(res) => res,
                Err(_) => {
                    tracing::debug!(url, "run budget spent during preview");
                    return Preview::default();
                }
            },
            None => fetch.await,
        };
        match fetched {
            Ok(body) => parse_preview(&String::from_utf8_lossy(&body)),
            Err(e) => {
                tracing::debug!(url, error = %e, "preview unavailable");
                Preview::default()
            }
        }
    }

    pub async fn enrich(&self, scored: &ScoredCandidate) -> CuratedItem {
        let c = &scored.candidate;
        let media_type = infer_media_type(c, &scored.inferred_tags, self.cfg);

        let mut summary = normalize_text(&c.summary);
        let mut thumbnail = c.thumbnail_url.as_deref().and_then(canonicalize);

        let short = summary.chars().count() < SHORT_SUMMARY_CHARS;
        if short || thumbnail.is_none() {
            let preview = self.preview(&c.url).await;
            if short && preview.description.chars().count() >= MIN_PREVIEW_DESCRIPTION_CHARS {
                summary = preview.description;
            }
            if thumbnail.is_none() {
                thumbnail = preview.image;
            }
        }
        if thumbnail.is_none() && media_type == MediaType::Video {
            thumbnail = youtube_thumbnail(&c.url);
        }

        let mut summary = truncate_summary(&summary, self.cfg.summary_max_chars);
        if summary.is_empty() {
            summary = self.cfg.default_summary.clone();
        }

        let source = if c.source.is_empty() {
            source_host(&c.url)
        } else {
            c.source.clone()
        };

        CuratedItem {
            id: item_id(&c.url),
            title: c.title.clone(),
            url: c.url.clone(),
            summary,
            source,
            published_at: c.published_at,
            created_at: self.created_at,
            media_type,
            thumbnail_url: thumbnail,
            tags: build_tags(&scored.inferred_tags, self.cfg),
            author: c.author.clone(),
        }
    }
}
