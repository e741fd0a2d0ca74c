// src/score.rs
//! # Scorer
//! Pure, deterministic scoring of one candidate:
//!
//! score = Σ topic hits + recency + source trust + trending + evaluation bias
//!
//! - recency: `max(0, (30 - age_days) / 30) * 1.2`, 0 without a timestamp
//! - source trust: per-host table, 0 for unknown hosts
//! - trending: `min(1, points / 100)`
//! - evaluation bias: mean over inferred topics of the best bias among the
//!   topic key and its aliases (missing aliases count as 0)
//!
//! The run timestamp is an input, so identical inputs give identical scores.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bias::TagBias;
use crate::classify::{TopicClassifier, TopicHits};
use crate::config::CuratorConfig;
use crate::ingest::types::CandidateRecord;

const RECENCY_WINDOW_DAYS: f64 = 30.0;
const RECENCY_WEIGHT: f64 = 1.2;
const TRENDING_POINTS_SCALE: f64 = 100.0;

/// Per-component contributions, kept for logs and the manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub topics: f64,
    pub recency: f64,
    pub source: f64,
    pub trending: f64,
    pub bias: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.topics + self.recency + self.source + self.trending + self.bias
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: CandidateRecord,
    pub score: f64,
    pub inferred_tags: Vec<String>,
    pub breakdown: ScoreBreakdown,
}

pub fn recency_bonus(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(ts) = published else {
        return 0.0;
    };
    let age_days = ((now - ts).num_seconds() as f64 / 86_400.0).max(0.0);
    ((RECENCY_WINDOW_DAYS - age_days) / RECENCY_WINDOW_DAYS).max(0.0) * RECENCY_WEIGHT
}

pub fn trending_bonus(points: Option<f64>) -> f64 {
    points
        .filter(|p| p.is_finite() && *p > 0.0)
        .map_or(0.0, |p| (p / TRENDING_POINTS_SCALE).min(1.0))
}

pub fn evaluation_bias(inferred: &[String], bias: &TagBias, cfg: &CuratorConfig) -> f64 {
    if inferred.is_empty() {
        return 0.0;
    }
    let per_topic: Vec<f64> = inferred
        .iter()
        .map(|topic| {
            let aliases = cfg.topic(topic).map(|t| t.aliases.as_slice()).unwrap_or_default();
            std::iter::once(topic)
                .chain(aliases.iter())
                .map(|alias| bias.get(alias).copied().unwrap_or(0.0))
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .collect();
    per_topic.iter().sum::<f64>() / per_topic.len() as f64
}

/// Score a candidate given its classifier output.
pub fn score_candidate(
    candidate: &CandidateRecord,
    hits: &TopicHits,
    bias: &TagBias,
    cfg: &CuratorConfig,
    now: DateTime<Utc>,
) -> (f64, Vec<String>, ScoreBreakdown) {
    let inferred = hits.inferred_tags();
    let breakdown = ScoreBreakdown {
        topics: hits.total() as f64,
        recency: recency_bonus(candidate.published_at, now),
        source: cfg.source_bonus_for(&candidate.source),
        trending: trending_bonus(candidate.trending_score),
        bias: evaluation_bias(&inferred, bias, cfg),
    };
    (breakdown.total(), inferred, breakdown)
}

/// Classifier + scorer bound to one run's configuration, bias map and timestamp.
pub struct Scorer<'a> {
    cfg: &'a CuratorConfig,
    classifier: TopicClassifier<'a>,
    bias: &'a TagBias,
    now: DateTime<Utc>,
}

impl<'a> Scorer<'a> {
    pub fn new(cfg: &'a CuratorConfig, bias: &'a TagBias, now: DateTime<Utc>) -> Self {
        Self {
            cfg,
            classifier: TopicClassifier::new(cfg),
            bias,
            now,
        }
    }

    pub fn score(&self, candidate: CandidateRecord) -> ScoredCandidate {
        let hits = self.classifier.classify(&candidate.classifier_text());
        let (score, inferred_tags, breakdown) =
            score_candidate(&candidate, &hits, self.bias, self.cfg, self.now);
        ScoredCandidate {
            candidate,
            score,
            inferred_tags,
            breakdown,
        }
    }

    pub fn score_all(&self, candidates: Vec<CandidateRecord>) -> Vec<ScoredCandidate> {
        candidates.into_iter().map(|c| self.score(c)).collect()
    }
}
