// src/select.rs
//! Deduplicator & selector.
//!
//! Order of filters:
//! 1) already known (local history or remote existing-URL set)
//! 2) below the minimum score
//! 3) noise guard: trending links from untrusted hosts need the high threshold
//! 4) one candidate per canonical URL (strictly higher score wins, first on ties)
//! 5) stable sort by score, descending; keep the top `limit` (at least one)

use std::collections::{HashMap, HashSet};

use crate::config::CuratorConfig;
use crate::score::ScoredCandidate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionStats {
    pub considered: usize,
    pub known: usize,
    pub below_min: usize,
    pub noise: usize,
    pub duplicates: usize,
    pub truncated: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SelectionParams {
    pub limit: usize,
    pub min_score: f64,
}

/// Trending-origin candidates from hosts outside the trusted set must clear
/// `trending_noise_threshold`.
pub fn passes_noise_guard(c: &ScoredCandidate, cfg: &CuratorConfig) -> bool {
    !c.candidate.origin.is_trending()
        || cfg.is_trusted_trending(&c.candidate.source)
        || c.score >= cfg.trending_noise_threshold
}

pub fn select(
    scored: Vec<ScoredCandidate>,
    known_local: &HashSet<String>,
    known_remote: &HashSet<String>,
    params: SelectionParams,
    cfg: &CuratorConfig,
) -> (Vec<ScoredCandidate>, SelectionStats) {
    let mut stats = SelectionStats {
        considered: scored.len(),
        ..Default::default()
    };

    let mut best: Vec<ScoredCandidate> = Vec::new();
    let mut slot_by_url: HashMap<String, usize> = HashMap::new();

    for c in scored {
        let url = &c.candidate.url;
        if known_local.contains(url) || known_remote.contains(url) {
            stats.known += 1;
            continue;
        }
        if c.score < params.min_score {
            stats.below_min += 1;
            continue;
        }
        if !passes_noise_guard(&c, cfg) {
            stats.noise += 1;
            continue;
        }
        match slot_by_url.get(url) {
            Some(&slot) => {
                stats.duplicates += 1;
                if c.score > best[slot].score {
                    best[slot] = c;
                }
            }
            None => {
                slot_by_url.insert(url.clone(), best.len());
                best.push(c);
            }
        }
    }

    best.sort_by(|a, b| b.score.total_cmp(&a.score));
    let limit = params.limit.max(1);
    stats.truncated = best.len().saturating_sub(limit);
    best.truncate(limit);
    (best, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{CandidateRecord, Origin};
    use crate::score::ScoreBreakdown;

    fn sc(url: &str, score: f64, origin: Origin, source: &str) -> ScoredCandidate {
        ScoredCandidate {
            candidate: CandidateRecord {
                title: format!("t {url}"),
                url: url.into(),
                summary: String::new(),
                published_at: None,
                source: source.into(),
                tags_seed: vec![],
                origin,
                trending_score: None,
                author: None,
                thumbnail_url: None,
            },
            score,
            inferred_tags: vec![],
            breakdown: ScoreBreakdown::default(),
        }
    }

    fn feed(url: &str, score: f64) -> ScoredCandidate {
        sc(url, score, Origin::Feed("Blog".into()), "github.blog")
    }

    fn params() -> SelectionParams {
        SelectionParams {
            limit: 15,
            min_score: 2.0,
        }
    }

    #[test]
    fn ties_keep_first_and_higher_replaces() {
        let cfg = CuratorConfig::default_seed();
        let mut first = feed("https://a.test/x", 4.0);
        first.candidate.title = "first".into();
        let mut tie = feed("https://a.test/x", 4.0);
        tie.candidate.title = "tie".into();
        let (out, stats) = select(
            vec![first, tie],
            &HashSet::new(),
            &HashSet::new(),
            params(),
            &cfg,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].candidate.title, "first");
        assert_eq!(stats.duplicates, 1);

        let (out, _) = select(
            vec![feed("https://a.test/x", 3.0), feed("https://a.test/x", 3.5)],
            &HashSet::new(),
            &HashSet::new(),
            params(),
            &cfg,
        );
        assert!((out[0].score - 3.5).abs() < 1e-9);
    }

    #[test]
    fn trusted_trending_host_bypasses_noise_guard() {
        let cfg = CuratorConfig::default_seed();
        let trusted = sc("https://arxiv.org/abs/1", 3.0, Origin::Trending, "arxiv.org");
        let untrusted = sc("https://random.dev/p", 7.9, Origin::Trending, "random.dev");
        let loud = sc("https://random.dev/q", 8.0, Origin::Trending, "random.dev");
        let (out, stats) = select(
            vec![trusted, untrusted, loud],
            &HashSet::new(),
            &HashSet::new(),
            params(),
            &cfg,
        );
        let urls: Vec<&str> = out.iter().map(|c| c.candidate.url.as_str()).collect();
        assert_eq!(urls, vec!["https://random.dev/q", "https://arxiv.org/abs/1"]);
        assert_eq!(stats.noise, 1);
    }

    #[test]
    fn sorts_desc_and_truncates_with_min_one() {
        let cfg = CuratorConfig::default_seed();
        let input = vec![
            feed("https://a.test/1", 2.5),
            feed("https://a.test/2", 6.0),
            feed("https://a.test/3", 1.0),
            feed("https://a.test/4", 4.0),
        ];
        let (out, stats) = select(
            input.clone(),
            &HashSet::new(),
            &HashSet::new(),
            SelectionParams {
                limit: 2,
                min_score: 2.0,
            },
            &cfg,
        );
        let scores: Vec<f64> = out.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![6.0, 4.0]);
        assert_eq!(stats.below_min, 1);
        assert_eq!(stats.truncated, 1);

        let (out, _) = select(
            input,
            &HashSet::new(),
            &HashSet::new(),
            SelectionParams {
                limit: 0,
                min_score: 0.0,
            },
            &cfg,
        );
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn remote_known_urls_are_excluded() {
        let cfg = CuratorConfig::default_seed();
        let remote: HashSet<String> = ["https://a.test/r".to_string()].into();
        let (out, stats) = select(
            vec![feed("https://a.test/r", 9.0)],
            &HashSet::new(),
            &remote,
            params(),
            &cfg,
        );
        assert!(out.is_empty());
        assert_eq!(stats.known, 1);
    }
}
