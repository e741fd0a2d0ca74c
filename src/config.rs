// src/config.rs
//! Curator configuration.
//!
//! `CuratorConfig` holds every fixed table the pipeline consults (taxonomy,
//! trusted hosts, media host hints, feed list, bias weights, HTTP limits). It is
//! built once at start from the built-in seed, optionally overridden by a TOML
//! file, and passed by reference into the classifier, scorer, selector and
//! enricher. Nothing reads these tables from globals.
//!
//! Lookup order for the override file:
//! 1) explicit path (CLI `--config`)
//! 2) `$CURATOR_CONFIG_PATH`
//! 3) `config/curator.toml`
//! 4) built-in seed

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "CURATOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/curator.toml";

/// One taxonomy entry. `aliases` are the remote tag names that feed this
/// topic's historical bias.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TopicCfg {
    pub name: String,
    pub terms: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// (display name, feed URL, canonical source label)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    pub source: String,
}

/// Vote weighting for the historical bias estimator.
/// signal = must_see*ms + recommended*rec + not_for_me*nfm; bias = clamp(avg/divisor, -1, 1)
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct BiasWeights {
    pub must_see: f64,
    pub recommended: f64,
    pub not_for_me: f64,
    pub divisor: f64,
}

impl Default for BiasWeights {
    fn default() -> Self {
        Self {
            must_see: 3.0,
            recommended: 1.0,
            not_for_me: -0.5,
            divisor: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrendingCfg {
    pub endpoint: String,
    pub display_name: String,
    /// Seed tag naming the trending source, next to `trending-tech`.
    pub label: String,
    pub queries: Vec<String>,
}

impl Default for TrendingCfg {
    fn default() -> Self {
        Self {
            endpoint: "https://hn.algolia.com/api/v1/search_by_date".to_string(),
            display_name: "Hacker News".to_string(),
            label: "hn".to_string(),
            queries: [
                "platform engineering",
                "open source ai",
                "developer tools",
                "kubernetes",
                "llmops",
                "agentic coding",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Network limits. Every outbound call carries its own timeout; sources also
/// get a per-source timeout, and the ingest phase a total budget.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpCfg {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub preview_timeout_secs: u64,
    pub source_timeout_secs: u64,
    pub run_budget_secs: u64,
    pub concurrency: usize,
    pub preview_max_bytes: usize,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            user_agent: "homedir-community-curator/1.0 (+https://homedir.opensourcesantiago.io)"
                .to_string(),
            request_timeout_secs: 12,
            preview_timeout_secs: 8,
            source_timeout_secs: 20,
            run_budget_secs: 120,
            concurrency: 6,
            preview_max_bytes: 220_000,
        }
    }
}

impl HttpCfg {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.preview_timeout_secs.max(1))
    }
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs.max(1))
    }
    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CuratorConfig {
    pub topics: Vec<TopicCfg>,
    pub feeds: Vec<FeedSource>,
    pub trending: TrendingCfg,
    /// Per-host trust bonus added to the score.
    pub source_bonus: HashMap<String, f64>,
    /// Hosts whose trending links skip the noise guard.
    pub trusted_trending_domains: Vec<String>,
    /// Trending links from other hosts need at least this score.
    pub trending_noise_threshold: f64,
    pub video_hosts: Vec<String>,
    pub podcast_hosts: Vec<String>,
    pub bias: BiasWeights,
    pub remote_page_size: usize,
    pub remote_max_pages: usize,
    pub history_cap: usize,
    pub default_tags: Vec<String>,
    pub default_summary: String,
    pub summary_max_chars: usize,
    pub max_tags: usize,
    pub http: HttpCfg,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self::default_seed()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl CuratorConfig {
    /// Built-in tables for open-source / AI / platform engineering curation.
    pub fn default_seed() -> Self {
        let topics = vec![
            TopicCfg {
                name: "ai-engineering".into(),
                terms: strings(&[
                    "ai",
                    "artificial intelligence",
                    "llm",
                    "llmops",
                    "agent",
                    "model",
                    "inference",
                    "genai",
                    "machine learning",
                ]),
                aliases: strings(&["ai", "llmops", "genai"]),
            },
            TopicCfg {
                name: "platform-engineering".into(),
                terms: strings(&[
                    "platform engineering",
                    "platform team",
                    "developer platform",
                    "internal developer platform",
                    "idp",
                    "golden path",
                    "backstage",
                ]),
                aliases: strings(&["platform-engineering", "platform", "open-source", "developers"]),
            },
            TopicCfg {
                name: "cloud-native".into(),
                terms: strings(&[
                    "cloud native",
                    "kubernetes",
                    "k8s",
                    "devops",
                    "sre",
                    "ci/cd",
                    "observability",
                    "terraform",
                    "helm",
                    "argo",
                ]),
                aliases: strings(&["cloud-native", "devops", "kubernetes", "sre"]),
            },
            TopicCfg {
                name: "security".into(),
                terms: strings(&[
                    "security",
                    "secops",
                    "appsec",
                    "supply chain",
                    "zero trust",
                    "sbom",
                    "slsa",
                    "cve",
                    "vulnerability",
                ]),
                aliases: strings(&["security", "security-supply-chain", "appsec"]),
            },
            TopicCfg {
                name: "developer-experience".into(),
                terms: strings(&[
                    "developer",
                    "developers",
                    "developer experience",
                    "devex",
                    "programming",
                    "coding",
                    "sdk",
                    "api",
                    "framework",
                    "tooling",
                    "open source",
                    "oss",
                    "github",
                    "gitlab",
                    "maintainer",
                ]),
                aliases: strings(&["developer-experience", "developers", "open-source"]),
            },
            TopicCfg {
                name: "trending-tech".into(),
                terms: strings(&[
                    "release",
                    "announcing",
                    "launch",
                    "state of",
                    "benchmark",
                    "roadmap",
                    "new",
                ]),
                aliases: Vec::new(),
            },
        ];

        let feeds = [
            ("GitHub Blog", "https://github.blog/feed/", "github.blog"),
            ("CNCF Blog", "https://www.cncf.io/feed/", "cncf.io"),
            ("Kubernetes Blog", "https://kubernetes.io/feed.xml", "kubernetes.io"),
            ("Docker Blog", "https://www.docker.com/blog/feed/", "docker.com"),
            (
                "AWS Open Source Blog",
                "https://aws.amazon.com/blogs/opensource/feed/",
                "aws.amazon.com",
            ),
            ("Stack Overflow Blog", "https://stackoverflow.blog/feed/", "stackoverflow.blog"),
            ("Hugging Face Blog", "https://huggingface.co/blog/feed.xml", "huggingface.co"),
            ("OpenAI News", "https://openai.com/news/rss.xml", "openai.com"),
        ]
        .into_iter()
        .map(|(name, url, source)| FeedSource {
            name: name.into(),
            url: url.into(),
            source: source.into(),
        })
        .collect();

        let source_bonus = [
            ("github.blog", 0.6),
            ("openai.com", 0.6),
            ("cncf.io", 0.5),
            ("kubernetes.io", 0.5),
            ("docker.com", 0.4),
            ("aws.amazon.com", 0.4),
            ("stackoverflow.blog", 0.3),
            ("huggingface.co", 0.4),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            topics,
            feeds,
            trending: TrendingCfg::default(),
            source_bonus,
            trusted_trending_domains: strings(&[
                "github.blog",
                "openai.com",
                "cncf.io",
                "kubernetes.io",
                "docker.com",
                "aws.amazon.com",
                "huggingface.co",
                "stackoverflow.blog",
                "cloudflare.com",
                "microsoft.com",
                "googleblog.com",
                "research.google",
                "arxiv.org",
            ]),
            trending_noise_threshold: 8.0,
            video_hosts: strings(&[
                "youtube.com",
                "youtu.be",
                "vimeo.com",
                "tiktok.com",
                "x.com",
                "twitter.com",
            ]),
            podcast_hosts: strings(&[
                "spotify.com",
                "open.spotify.com",
                "soundcloud.com",
                "podcasts.apple.com",
                "anchor.fm",
            ]),
            bias: BiasWeights::default(),
            remote_page_size: 100,
            remote_max_pages: 15,
            history_cap: 2000,
            default_tags: strings(&["technology", "community-curated"]),
            default_summary: "Curated technology content relevant for modern software teams."
                .to_string(),
            summary_max_chars: 320,
            max_tags: 6,
            http: HttpCfg::default(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: CuratorConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading curator config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing curator config {}", path.display()))
    }

    /// Resolve the override file (explicit → env → default path) or fall back to the seed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load_from(p);
        }
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default_seed())
    }

    pub fn topic(&self, name: &str) -> Option<&TopicCfg> {
        self.topics.iter().find(|t| t.name == name)
    }

    pub fn source_bonus_for(&self, host: &str) -> f64 {
        self.source_bonus.get(host).copied().unwrap_or(0.0)
    }

    pub fn is_trusted_trending(&self, host: &str) -> bool {
        self.trusted_trending_domains.iter().any(|d| d == host)
    }

    fn sanitize(&mut self) {
        for t in &mut self.topics {
            t.name = t.name.trim().to_lowercase();
            t.terms = t
                .terms
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            t.aliases = t.aliases.iter().map(|s| s.trim().to_lowercase()).collect();
        }
        self.topics.retain(|t| !t.name.is_empty());
        if self.bias.divisor.abs() < f64::EPSILON {
            self.bias.divisor = BiasWeights::default().divisor;
        }
        self.remote_page_size = self.remote_page_size.max(1);
        self.http.concurrency = self.http.concurrency.max(1);
    }
}

/// CLI-equivalent parameters for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub state_file: PathBuf,
    pub api_base: String,
    pub limit: usize,
    pub max_per_source: usize,
    pub min_score: f64,
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            state_file: PathBuf::from("state/history.json"),
            api_base: "https://homedir.opensourcesantiago.io".to_string(),
            limit: 15,
            max_per_source: 12,
            min_score: 2.0,
            dry_run: false,
        }
    }

    /// Selection size; never below one.
    pub fn effective_limit(&self) -> usize {
        self.limit.max(1)
    }
}
