// src/ingest/mod.rs
pub mod providers;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::config::{CuratorConfig, HttpCfg};
use crate::fetch::Fetcher;
use crate::ingest::providers::{FeedProvider, TrendingProvider};
use crate::ingest::types::{CandidateRecord, SourceProvider};

/// One-time metrics registration.
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "curator_candidates_total",
            "Candidates produced by source adapters."
        );
        describe_counter!(
            "curator_source_errors_total",
            "Sources that failed, timed out or were cancelled."
        );
        describe_counter!(
            "curator_selected_total",
            "Candidates selected for publication."
        );
        describe_histogram!("curator_parse_ms", "Feed parse time in milliseconds.");
        describe_histogram!("curator_fetch_ms", "HTTP fetch time in milliseconds.");
    });
}

/// Strip markup to plain text: tags become spaces, entities are decoded and
/// whitespace is collapsed.
pub fn normalize_text(s: &str) -> String {
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?s)<[^>]+>").unwrap());
    let stripped = re_tags.replace_all(s, " ");

    let decoded = html_escape::decode_html_entities(&stripped);

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Parse feed/API timestamps: RFC 2822, RFC 3339, or naive ISO (assumed UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

/// Build the fixed provider list: every configured feed, then one provider
/// per trending query.
pub fn build_providers(cfg: &CuratorConfig, max_per_source: usize) -> Vec<Arc<dyn SourceProvider>> {
    let mut out: Vec<Arc<dyn SourceProvider>> = Vec::new();
    for feed in &cfg.feeds {
        out.push(Arc::new(FeedProvider::new(feed.clone(), max_per_source)));
    }
    for p in TrendingProvider::all(&cfg.trending, max_per_source) {
        out.push(Arc::new(p));
    }
    out
}

#[derive(Clone, Copy, Debug)]
pub struct IngestLimits {
    pub concurrency: usize,
    pub source_timeout: Duration,
    pub run_budget: Duration,
}

impl From<&HttpCfg> for IngestLimits {
    fn from(h: &HttpCfg) -> Self {
        Self {
            concurrency: h.concurrency.max(1),
            source_timeout: h.source_timeout(),
            run_budget: h.run_budget(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Ok(usize),
    Failed(String),
    TimedOut,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    /// Candidates in provider order (independent of completion order).
    pub candidates: Vec<CandidateRecord>,
    pub outcomes: Vec<(String, SourceStatus)>,
    /// Sources still running when the run budget expired.
    pub cancelled: usize,
}

impl IngestReport {
    pub fn failed_sources(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, s)| !matches!(s, SourceStatus::Ok(_)))
            .count()
            + self.cancelled
    }
}

/// Fetch every provider concurrently (bounded by `limits.concurrency`).
///
/// A provider that errors or exceeds `source_timeout` contributes nothing and
/// is logged; the others are unaffected. When `run_budget` expires, pending
/// providers are aborted. The candidate accumulator is the only shared state.
pub async fn collect_candidates(
    providers: Vec<Arc<dyn SourceProvider>>,
    fetcher: Arc<dyn Fetcher>,
    limits: IngestLimits,
) -> IngestReport {
    ensure_metrics_described();

    let accumulator: Arc<Mutex<Vec<(usize, Vec<CandidateRecord>)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let semaphore = Arc::new(Semaphore::new(limits.concurrency.max(1)));
    let mut set = JoinSet::new();

    for (idx, provider) in providers.into_iter().enumerate() {
        let fetcher = fetcher.clone();
        let sem = semaphore.clone();
        let acc = accumulator.clone();
        let source_timeout = limits.source_timeout;
        set.spawn(async move {
            let name = provider.name().to_string();
            let Ok(_permit) = sem.acquire().await else {
                return (name, SourceStatus::Failed("worker pool closed".into()));
            };
            match tokio::time::timeout(source_timeout, provider.fetch_latest(fetcher.as_ref())).await {
                Ok(Ok(found)) => {
                    let n = found.len();
                    acc.lock().await.push((idx, found));
                    (name, SourceStatus::Ok(n))
                }
                Ok(Err(e)) => (name, SourceStatus::Failed(e.to_string())),
                Err(_) => (name, SourceStatus::TimedOut),
            }
        });
    }

    let mut report = IngestReport::default();
    let deadline = tokio::time::Instant::now() + limits.run_budget;
    loop {
        let next = tokio::time::timeout_at(deadline, set.join_next()).await;
        match next {
            Ok(Some(Ok((name, status)))) => {
                match &status {
                    SourceStatus::Ok(n) => tracing::info!(source = %name, count = n, "source fetched"),
                    SourceStatus::Failed(err) => {
                        counter!("curator_source_errors_total").increment(1);
                        tracing::warn!(source = %name, error = %err, "source failed; contributing zero candidates");
                    }
                    SourceStatus::TimedOut => {
                        counter!("curator_source_errors_total").increment(1);
                        tracing::warn!(
                            source = %name,
                            timeout_secs = limits.source_timeout.as_secs(),
                            "source timed out; contributing zero candidates"
                        );
                    }
                }
                report.outcomes.push((name, status));
            }
            Ok(Some(Err(join_err))) => {
                counter!("curator_source_errors_total").increment(1);
                tracing::warn!(error = %join_err, "source task aborted");
                report.cancelled += 1;
            }
            Ok(None) => break,
            Err(_) => {
                report.cancelled += set.len();
                counter!("curator_source_errors_total").increment(set.len() as u64);
                tracing::warn!(
                    pending = set.len(),
                    budget_secs = limits.run_budget.as_secs(),
                    "ingest budget exhausted; cancelling remaining sources"
                );
                set.abort_all();
                break;
            }
        }
    }

    let mut parts = std::mem::take(&mut *accumulator.lock().await);
    parts.sort_by_key(|(idx, _)| *idx);
    report.candidates = parts.into_iter().flat_map(|(_, v)| v).collect();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_markup_and_collapses_ws() {
        let s = "  <p>Hello&nbsp;&nbsp;<b>world</b>!</p>\n\t ";
        assert_eq!(normalize_text(s), "Hello world !");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("AT&amp;T"), "AT&T");
    }

    #[test]
    fn timestamps_in_common_feed_formats() {
        let rfc2822 = parse_timestamp("Wed, 02 Oct 2024 15:00:00 +0200").unwrap();
        assert_eq!(rfc2822.to_rfc3339(), "2024-10-02T13:00:00+00:00");
        let rfc3339 = parse_timestamp("2024-10-02T13:00:00Z").unwrap();
        assert_eq!(rfc2822, rfc3339);
        let naive = parse_timestamp("2024-10-02T13:00:00").unwrap();
        assert_eq!(naive, rfc3339);
        assert!(parse_timestamp("2024-10-02").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("  ").is_none());
    }

    #[test]
    fn providers_cover_feeds_and_queries() {
        let cfg = CuratorConfig::default_seed();
        let ps = build_providers(&cfg, 12);
        assert_eq!(ps.len(), cfg.feeds.len() + cfg.trending.queries.len());
        assert_eq!(ps[0].name(), "GitHub Blog");
    }
}
