//! history.rs: durable cross-run record of selected URLs.
//!
//! On disk: `{updated_at, urls: [..sorted..], records: [..]}`. A missing or
//! unparseable file is treated as empty state. Each part is decoded on its own:
//! a malformed record is dropped without costing the `urls` list. Writes go
//! through a temp file and a rename so a crash never leaves a half-written
//! state file.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;

use crate::canonical::canonicalize;
use crate::error::{CurateError, Result};
use crate::output::ManifestEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub score: f64,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryState {
    pub updated_at: Option<DateTime<Utc>>,
    pub urls: Vec<String>,
    pub records: Vec<HistoryRecord>,
}

impl HistoryState {
    /// Canonical form of every stored URL; unusable entries are skipped.
    pub fn known_urls(&self) -> HashSet<String> {
        self.urls.iter().filter_map(|u| canonicalize(u)).collect()
    }

    /// Union the selected URLs in, append their records and keep the newest `cap`.
    pub fn merge(&mut self, selected: &[ManifestEntry], added_at: DateTime<Utc>, cap: usize) {
        let mut urls: BTreeSet<String> = self.urls.drain(..).collect();
        urls.extend(selected.iter().map(|e| e.url.clone()));
        self.urls = urls.into_iter().collect();

        self.records.extend(selected.iter().map(|e| HistoryRecord {
            id: e.id.clone(),
            title: e.title.clone(),
            url: e.url.clone(),
            source: e.source.clone(),
            tags: e.tags.clone(),
            score: e.score,
            added_at,
        }));
        if self.records.len() > cap {
            let excess = self.records.len() - cap;
            self.records.drain(0..excess);
        }
        self.updated_at = Some(added_at);
    }
}

/// Read the state file; absence or corruption yields an empty state.
pub async fn load(path: &Path) -> HistoryState {
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HistoryState::default(),
        Err(e) => {
            let err = CurateError::Persistence {
                path: path.to_path_buf(),
                source: e,
            };
            tracing::warn!(error = %err, "history unreadable; starting from empty state");
            return HistoryState::default();
        }
    };
    match serde_json::from_slice::<Value>(&raw) {
        Ok(doc) => decode(&doc, path),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "history corrupt; starting from empty state");
            HistoryState::default()
        }
    }
}

fn decode(doc: &Value, path: &Path) -> HistoryState {
    if !doc.is_object() {
        tracing::warn!(path = %path.display(), "history is not an object; starting from empty state");
        return HistoryState::default();
    }

    let urls: Vec<String> = doc
        .get("urls")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default();

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for raw in doc.get("records").and_then(Value::as_array).into_iter().flatten() {
        match HistoryRecord::deserialize(raw) {
            Ok(record) => records.push(record),
            Err(e) => {
                dropped += 1;
                tracing::debug!(error = %e, "history record malformed");
            }
        }
    }
    if dropped > 0 {
        tracing::warn!(path = %path.display(), dropped, "malformed history records dropped");
    }

    let updated_at = doc
        .get("updated_at")
        .and_then(|v| DateTime::<Utc>::deserialize(v).ok());

    HistoryState {
        updated_at,
        urls,
        records,
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub async fn save(path: &Path, state: &HistoryState) -> Result<()> {
    let persistence = |source: std::io::Error| CurateError::Persistence {
        path: path.to_path_buf(),
        source,
    };
    let body = serde_json::to_vec_pretty(state)
        .map_err(|e| persistence(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    let tmp = temp_path(path);
    fs::write(&tmp, body).await.map_err(persistence)?;
    fs::rename(&tmp, path).await.map_err(persistence)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::MediaType;
    use chrono::TimeZone;

    fn entry(n: usize) -> ManifestEntry {
        ManifestEntry {
            id: format!("id{n}"),
            title: format!("t{n}"),
            url: format!("https://example.com/{n}"),
            source: "example.com".into(),
            media_type: MediaType::Article,
            thumbnail_url: None,
            score: 3.0,
            tags: vec!["technology".into()],
            file: format!("f{n}.json"),
        }
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn merge_sorts_union_and_caps_records() {
        let mut state = HistoryState {
            updated_at: None,
            urls: vec!["https://example.com/z".into(), "https://example.com/1".into()],
            records: vec![],
        };
        let selected: Vec<ManifestEntry> = (0..5).map(entry).collect();
        state.merge(&selected, ts(), 3);
        assert_eq!(state.urls.len(), 6);
        assert!(state.urls.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(state.records.len(), 3);
        assert_eq!(state.records[0].id, "id2");
        assert_eq!(state.updated_at, Some(ts()));
    }

    #[test]
    fn known_urls_are_canonicalized() {
        let state = HistoryState {
            urls: vec!["https://Example.com/a?utm_source=x#top".into(), "ftp://nope".into()],
            ..Default::default()
        };
        let known = state.known_urls();
        assert_eq!(known.len(), 1);
        assert!(known.contains("https://example.com/a"));
    }

    #[tokio::test]
    async fn missing_and_corrupt_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        assert_eq!(load(&path).await, HistoryState::default());
        std::fs::write(&path, b"{not json").unwrap();
        assert_eq!(load(&path).await, HistoryState::default());
    }

    #[tokio::test]
    async fn malformed_record_keeps_urls_and_other_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let body = serde_json::json!({
            "updated_at": "not a timestamp",
            "urls": ["https://example.com/a", 42, "https://example.com/b"],
            "records": [
                {"id": "x", "title": "X", "url": "https://example.com/a", "source": "example.com",
                 "score": null, "added_at": "2024-10-01T00:00:00Z"},
                {"id": "y", "title": "Y", "url": "https://example.com/b", "source": "example.com",
                 "tags": ["devops"], "score": 2.5, "added_at": "2024-10-01T00:00:00Z"}
            ]
        });
        std::fs::write(&path, serde_json::to_vec(&body).unwrap()).unwrap();

        let state = load(&path).await;
        assert_eq!(state.urls, vec!["https://example.com/a", "https://example.com/b"]);
        assert_eq!(state.records.len(), 1);
        assert_eq!(state.records[0].id, "y");
        assert_eq!(state.updated_at, None);
        assert_eq!(state.known_urls().len(), 2);
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut state = HistoryState::default();
        state.merge(&[entry(1)], ts(), 2000);
        save(&path, &state).await.unwrap();
        assert!(!temp_path(&path).exists());
        assert_eq!(load(&path).await, state);
    }
}
