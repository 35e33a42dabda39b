//! Discovery phase results and the cross-agent merge

use super::query::ResearchQuery;
use super::source::{Contribution, SourceStats, phase_confidence};
use crate::agent::AgentType;
use crate::aggregation::ConfidenceLevel;
use crate::aggregation::finding::normalize_entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReference {
    pub path: String,
    pub relevance: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: Option<AgentType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern: String,
    pub path: String,
    pub line: usize,
    #[serde(default)]
    pub snippet: String,
    pub relevance: f64,
    #[serde(default)]
    pub source: Option<AgentType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocReference {
    pub path: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    pub relevance: f64,
    #[serde(default)]
    pub source: Option<AgentType>,
}

/// What a discovery agent returns as its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DiscoveryPayload {
    #[serde(default)]
    pub files: Vec<FileReference>,
    #[serde(default)]
    pub patterns: Vec<PatternMatch>,
    #[serde(default)]
    pub docs: Vec<DocReference>,
}

impl DiscoveryPayload {
    pub fn len(&self) -> usize {
        self.files.len() + self.patterns.len() + self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Merged output of every discovery agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub files: Vec<FileReference>,
    pub patterns: Vec<PatternMatch>,
    pub docs: Vec<DocReference>,
    pub sources: Vec<SourceStats>,
    pub confidence: ConfidenceLevel,
    pub confidence_score: f64,
}

impl DiscoveryResult {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.patterns.is_empty() && self.docs.is_empty()
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceStats> {
        self.sources.iter().filter(|s| !s.success)
    }

    /// Every distinct path mentioned by any reference.
    pub fn paths(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.files
            .iter()
            .map(|f| f.path.as_str())
            .chain(self.docs.iter().map(|d| d.path.as_str()))
            .chain(self.patterns.iter().map(|p| p.path.as_str()))
            .filter(|p| seen.insert(normalize_entity(p)))
            .collect()
    }
}

/// Merge discovery contributions, given in declaration order.
///
/// Overlapping paths are deduplicated with the first occurrence winning;
/// the merged file list is then ranked by relevance and capped at the
/// query's file limit.
pub fn merge_discovery(
    query: &ResearchQuery,
    contributions: Vec<Contribution<DiscoveryPayload>>,
) -> DiscoveryResult {
    let mut files = Vec::new();
    let mut patterns = Vec::new();
    let mut docs = Vec::new();
    let mut sources = Vec::with_capacity(contributions.len());

    let mut seen_files = HashSet::new();
    let mut seen_docs = HashSet::new();
    let mut seen_patterns = HashSet::new();

    for Contribution { mut stats, payload } in contributions {
        if let Some(payload) = payload.filter(|_| stats.success) {
            stats.items = payload.len();
            let source = Some(stats.agent_type);

            for mut file in payload.files {
                if seen_files.insert(normalize_entity(&file.path)) {
                    file.source = file.source.or(source);
                    files.push(file);
                }
            }
            for mut doc in payload.docs {
                if seen_docs.insert(normalize_entity(&doc.path)) {
                    doc.source = doc.source.or(source);
                    docs.push(doc);
                }
            }
            for mut pattern in payload.patterns {
                let key = (
                    normalize_entity(&pattern.path),
                    pattern.line,
                    pattern.pattern.clone(),
                );
                if seen_patterns.insert(key) {
                    pattern.source = pattern.source.or(source);
                    patterns.push(pattern);
                }
            }
        }
        sources.push(stats);
    }

    files.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    files.truncate(query.max_files());
    docs.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    docs.truncate(query.max_files());
    patterns.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

    let confidence_score = phase_confidence(&sources);
    DiscoveryResult {
        files,
        patterns,
        docs,
        sources,
        confidence: ConfidenceLevel::from_score(confidence_score),
        confidence_score,
    }
}

/// Relevance in `[0, 1]` of a candidate path for the given query terms.
///
/// Terms appearing in the path weigh as much as term coverage in the
/// content; raw hit count adds a small density bonus.
pub fn relevance_score(terms: &[String], path: &str, matched_terms: usize, hits: usize) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let lower = path.to_lowercase();
    let total = terms.len() as f64;
    let in_path = terms.iter().filter(|t| lower.contains(t.as_str())).count() as f64;
    let coverage = matched_terms.min(terms.len()) as f64;
    let density = hits.min(20) as f64 / 20.0;
    (0.4 * in_path / total + 0.4 * coverage / total + 0.2 * density).clamp(0.0, 1.0)
}
