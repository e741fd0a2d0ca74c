// src/output.rs
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::RunOptions;
use crate::enrich::{slugify, CuratedItem, MediaType};
use crate::error::{CurateError, Result};

pub const MANIFEST_FILE: &str = "manifest.json";
const SLUG_MAX_CHARS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub title: String,
    pub url: String,
    pub source: String,
    pub media_type: MediaType,
    pub thumbnail_url: Option<String>,
    pub score: f64,
    pub tags: Vec<String>,
    pub file: String,
}

impl ManifestEntry {
    pub fn new(item: &CuratedItem, score: f64, file: String) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            url: item.url.clone(),
            source: item.source.clone(),
            media_type: item.media_type,
            thumbnail_url: item.thumbnail_url.clone(),
            score: round3(score),
            tags: item.tags.clone(),
            file,
        }
    }
}

/// Per-run summary of every selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_at: DateTime<Utc>,
    pub api_base: String,
    pub limit: usize,
    pub min_score: f64,
    pub max_per_source: usize,
    pub dry_run: bool,
    pub selected: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(opts: &RunOptions, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            api_base: opts.api_base.clone(),
            limit: opts.limit,
            min_score: opts.min_score,
            max_per_source: opts.max_per_source,
            dry_run: opts.dry_run,
            selected: Vec::new(),
        }
    }
}

pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// `{YYYYMMDD}-{slug}-{id}.json`, slug capped at 64 chars.
pub fn item_file_name(item: &CuratedItem, created_at: DateTime<Utc>) -> String {
    let slug: String = slugify(&item.title).chars().take(SLUG_MAX_CHARS).collect();
    format!("{}-{}-{}.json", created_at.format("%Y%m%d"), slug, item.id)
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let persistence = |source: std::io::Error| CurateError::Persistence {
        path: path.to_path_buf(),
        source,
    };
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| persistence(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    fs::write(path, body).await.map_err(persistence)
}

pub async fn write_item(dir: &Path, file: &str, item: &CuratedItem) -> Result<()> {
    write_json(&dir.join(file), item).await
}

pub async fn write_manifest(dir: &Path, manifest: &Manifest) -> Result<()> {
    write_json(&dir.join(MANIFEST_FILE), manifest).await
}
