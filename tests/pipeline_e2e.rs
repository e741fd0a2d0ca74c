// tests/pipeline_e2e.rs
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use community_curator::bias::CommunityContentApiV1;
use community_curator::config::FeedSource;
use community_curator::enrich::MediaType;
use community_curator::history::{self, HistoryState};
use community_curator::ingest::providers::TrendingProvider;
use community_curator::output::{Manifest, MANIFEST_FILE};
use community_curator::{run_at, CuratorConfig, FetchError, Fetcher, RunOptions, StaticFetcher};

const FEED_XML: &str = include_str!("fixtures/curation_feed.rss.xml");
const TRENDING_JSON: &str = include_str!("fixtures/curation_trending.json");
const API_BASE: &str = "https://api.test";
const FEED_URL: &str = "https://feeds.test/rss.xml";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 8, 0, 0).unwrap()
}

fn config() -> CuratorConfig {
    let mut cfg = CuratorConfig::default_seed();
    cfg.feeds = vec![FeedSource {
        name: "Test Blog".into(),
        url: FEED_URL.into(),
        source: "blog.test".into(),
    }];
    cfg.trending.endpoint = "https://hn.test/api/v1/search_by_date".into();
    cfg.trending.queries = vec!["kubernetes".into()];
    cfg
}

fn options(root: &Path) -> RunOptions {
    let mut opts = RunOptions::new(root.join("out"));
    opts.state_file = root.join("state").join("history.json");
    opts.api_base = API_BASE.into();
    opts
}

fn remote_url() -> String {
    let dummy = StaticFetcher::new();
    CommunityContentApiV1::new(API_BASE, &dummy)
        .page_url(0, 100)
        .unwrap()
}

fn trending_url(cfg: &CuratorConfig, opts: &RunOptions) -> String {
    TrendingProvider::new(&cfg.trending, "kubernetes", opts.max_per_source)
        .request_url()
        .unwrap()
}

fn fetcher(cfg: &CuratorConfig, opts: &RunOptions) -> StaticFetcher {
    let remote = r#"{"items":[
        {"url":"https://blog.test/helm","vote_counts":{"must_see":0,"recommended":0,"not_for_me":0},"tags":["Security"]}
    ]}"#;
    StaticFetcher::new()
        .with(remote_url(), remote)
        .with(FEED_URL, FEED_XML)
        .with(trending_url(cfg, opts), TRENDING_JSON)
}

async fn seed_history(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let state = HistoryState {
        urls: vec!["https://example.com/a".into()],
        ..Default::default()
    };
    history::save(path, &state).await.unwrap();
}

fn read_manifest(dir: &Path) -> Manifest {
    serde_json::from_slice(&std::fs::read(dir.join(MANIFEST_FILE)).unwrap()).unwrap()
}

#[tokio::test]
async fn full_run_selects_filters_and_persists() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config();
    let opts = options(tmp.path());
    seed_history(&opts.state_file).await;

    let report = run_at(&opts, &cfg, Arc::new(fetcher(&cfg, &opts)), now())
        .await
        .expect("run ok");

    assert_eq!(report.failed_sources, 0);
    assert_eq!(report.remote_known, 1);
    assert_eq!(report.history_known, 1);
    assert_eq!(report.selection.known, 2, "history + remote duplicates");
    assert_eq!(report.selection.noise, 1, "untrusted trending link");

    let manifest = read_manifest(&opts.output_dir);
    assert_eq!(manifest, report.manifest);
    let urls: Vec<&str> = manifest.selected.iter().map(|e| e.url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["https://kubernetes.io/blog/2024/obs/", "https://blog.test/sbom"]
    );

    // same URL from the feed (2.0) and trending (6.0): only the better one survives
    let top = &manifest.selected[0];
    assert!((top.score - 6.0).abs() < 1e-9, "got {}", top.score);
    assert_eq!(top.source, "kubernetes.io");
    assert_eq!(top.media_type, MediaType::Article);
    assert!(!urls.contains(&"https://example.com/a"));
    assert!(!urls.contains(&"https://random.dev/post"));
    assert!(!urls.contains(&"https://blog.test/helm"));

    for entry in &manifest.selected {
        assert!(entry.file.starts_with("20241001-"));
        assert!(entry.file.ends_with(&format!("-{}.json", entry.id)));
        assert!(opts.output_dir.join(&entry.file).exists());
        assert!(entry.tags.len() <= 6);
    }

    let item: serde_json::Value = serde_json::from_slice(
        &std::fs::read(opts.output_dir.join(&manifest.selected[1].file)).unwrap(),
    )
    .unwrap();
    assert_eq!(item["author"], "Jo Doe");
    assert_eq!(item["tags"][0], "security");
    assert_eq!(item["created_at"], "2024-10-01T08:00:00Z");

    let state = history::load(&opts.state_file).await;
    assert_eq!(
        state.urls,
        vec![
            "https://blog.test/sbom".to_string(),
            "https://example.com/a".into(),
            "https://kubernetes.io/blog/2024/obs/".into(),
        ]
    );
    assert_eq!(state.records.len(), 2);
    assert_eq!(state.updated_at, Some(now()));
}

#[tokio::test]
async fn second_run_selects_nothing_new() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config();
    let opts = options(tmp.path());
    seed_history(&opts.state_file).await;

    run_at(&opts, &cfg, Arc::new(fetcher(&cfg, &opts)), now())
        .await
        .unwrap();
    let again = run_at(&opts, &cfg, Arc::new(fetcher(&cfg, &opts)), now())
        .await
        .unwrap();

    assert!(again.manifest.selected.is_empty());
    assert_eq!(history::load(&opts.state_file).await.records.len(), 2);
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config();
    let mut opts = options(tmp.path());
    opts.dry_run = true;

    let report = run_at(&opts, &cfg, Arc::new(fetcher(&cfg, &opts)), now())
        .await
        .unwrap();

    assert!(!report.manifest.selected.is_empty());
    assert!(report.manifest.dry_run);
    assert!(!opts.output_dir.exists());
    assert!(!opts.state_file.parent().unwrap().exists());
}

#[tokio::test]
async fn malformed_history_record_keeps_known_urls() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config();
    let opts = options(tmp.path());
    std::fs::create_dir_all(opts.state_file.parent().unwrap()).unwrap();
    let seeded = serde_json::json!({
        "urls": ["https://example.com/a", "https://example.com/b"],
        "records": [{
            "id": "x", "title": "X", "url": "https://example.com/a", "source": "example.com",
            "score": null, "added_at": "2024-09-30T00:00:00Z"
        }]
    });
    std::fs::write(&opts.state_file, serde_json::to_vec(&seeded).unwrap()).unwrap();

    let report = run_at(&opts, &cfg, Arc::new(StaticFetcher::new()), now())
        .await
        .unwrap();

    assert_eq!(report.history_known, 2);
    let state = history::load(&opts.state_file).await;
    assert!(state.urls.contains(&"https://example.com/a".to_string()));
    assert!(state.urls.contains(&"https://example.com/b".to_string()));
}

#[tokio::test]
async fn remote_outage_is_a_cold_start() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config();
    let opts = options(tmp.path());
    let fetcher = StaticFetcher::new()
        .with(FEED_URL, FEED_XML)
        .with(trending_url(&cfg, &opts), TRENDING_JSON);

    let report = run_at(&opts, &cfg, Arc::new(fetcher), now()).await.unwrap();

    assert_eq!(report.remote_known, 0);
    // without history or remote, the helm notes and example.com post are eligible
    let urls: Vec<&str> = report.manifest.selected.iter().map(|e| e.url.as_str()).collect();
    assert!(urls.contains(&"https://example.com/a"));
    assert!(urls.contains(&"https://blog.test/helm"));
}

#[tokio::test]
async fn failing_source_does_not_affect_others() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = config();
    cfg.feeds.push(FeedSource {
        name: "Broken Feed".into(),
        url: "https://broken.test/feed.xml".into(),
        source: "broken.test".into(),
    });
    let opts = options(tmp.path());

    let report = run_at(&opts, &cfg, Arc::new(fetcher(&cfg, &opts)), now())
        .await
        .unwrap();

    assert_eq!(report.failed_sources, 1);
    assert_eq!(report.manifest.selected.len(), 2);
}

/// Delegates to a static fetcher but stalls on one URL.
struct StallingFetcher {
    inner: StaticFetcher,
    stall: HashMap<String, Duration>,
}

#[async_trait]
impl Fetcher for StallingFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(d) = self.stall.get(url) {
            tokio::time::sleep(*d).await;
        }
        self.inner.fetch(url).await
    }

    async fn fetch_limited(
        &self,
        url: &str,
        timeout: Duration,
        max_bytes: Option<usize>,
    ) -> Result<Vec<u8>, FetchError> {
        if let Some(d) = self.stall.get(url) {
            tokio::time::sleep(*d).await;
        }
        self.inner.fetch_limited(url, timeout, max_bytes).await
    }
}

#[tokio::test]
async fn slow_source_times_out_and_contributes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = config();
    cfg.http.source_timeout_secs = 1;
    let opts = options(tmp.path());

    let fetcher = StallingFetcher {
        inner: fetcher(&cfg, &opts),
        stall: HashMap::from([(trending_url(&cfg, &opts), Duration::from_secs(10))]),
    };
    let report = run_at(&opts, &cfg, Arc::new(fetcher), now()).await.unwrap();

    assert_eq!(report.failed_sources, 1);
    // the feed's own copy of the kubernetes.io post wins now, at its lower score
    let urls: Vec<&str> = report.manifest.selected.iter().map(|e| e.url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["https://blog.test/sbom", "https://kubernetes.io/blog/2024/obs/"]
    );
    assert!((report.manifest.selected[1].score - 2.0).abs() < 1e-9);
}

#[tokio::test]
async fn stalled_remote_api_is_cut_off_by_run_budget() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = config();
    cfg.http.run_budget_secs = 1;
    let opts = options(tmp.path());

    let fetcher = StallingFetcher {
        inner: fetcher(&cfg, &opts),
        stall: HashMap::from([(remote_url(), Duration::from_secs(10))]),
    };
    let started = std::time::Instant::now();
    let report = run_at(&opts, &cfg, Arc::new(fetcher), now()).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    assert_eq!(report.remote_known, 0);
    assert!(opts.output_dir.join(MANIFEST_FILE).exists());
}

#[tokio::test]
async fn uncreatable_output_dir_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let blocker = tmp.path().join("file");
    std::fs::write(&blocker, b"x").unwrap();
    let cfg = config();
    let mut opts = options(tmp.path());
    opts.output_dir = blocker.join("out");

    let err = run_at(&opts, &cfg, Arc::new(StaticFetcher::new()), now())
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}
