// src/classify.rs
//! Topic classifier: counts distinct taxonomy terms found (case-insensitive
//! substring match) in a candidate's text.

use crate::config::{CuratorConfig, TopicCfg};

/// Topic → hit count, in taxonomy declaration order, zero-hit topics excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicHits(pub Vec<(String, usize)>);

impl TopicHits {
    pub fn total(&self) -> usize {
        self.0.iter().map(|(_, n)| n).sum()
    }

    pub fn get(&self, topic: &str) -> usize {
        self.0
            .iter()
            .find(|(t, _)| t == topic)
            .map_or(0, |(_, n)| *n)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Topics by hit count, descending; ties keep declaration order.
    pub fn inferred_tags(&self) -> Vec<String> {
        let mut ranked: Vec<&(String, usize)> = self.0.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.into_iter().map(|(t, _)| t.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct TopicClassifier<'a> {
    topics: &'a [TopicCfg],
}

impl<'a> TopicClassifier<'a> {
    pub fn new(cfg: &'a CuratorConfig) -> Self {
        Self {
            topics: &cfg.topics,
        }
    }

    pub fn classify(&self, text: &str) -> TopicHits {
        let lowered = text.to_lowercase();
        let mut hits = Vec::new();
        for topic in self.topics {
            let mut seen: Vec<&str> = Vec::new();
            for term in &topic.terms {
                let term = term.as_str();
                if !term.is_empty() && !seen.contains(&term) && lowered.contains(term) {
                    seen.push(term);
                }
            }
            if !seen.is_empty() {
                hits.push((topic.name.clone(), seen.len()));
            }
        }
        TopicHits(hits)
    }
}
