//! Analysis phase results

use super::source::{Contribution, SourceStats, phase_confidence};
use crate::agent::AgentType;
use crate::aggregation::ConfidenceLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ImpactLevel {
    /// Severity factor used for risk scoring.
    pub fn severity(&self) -> f64 {
        match self {
            ImpactLevel::Low => 0.25,
            ImpactLevel::Medium => 0.5,
            ImpactLevel::High => 0.75,
            ImpactLevel::Critical => 1.0,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
            ImpactLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A piece of supporting material, usually an excerpt from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    pub source: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub impact: ImpactLevel,
    pub confidence: ConfidenceLevel,
    #[serde(default)]
    pub evidence_ids: Vec<String>,
    #[serde(default)]
    pub source: Option<AgentType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    DependsOn,
    References,
    Documents,
    SimilarTo,
}

/// A directed link between two entities (paths or insight ids).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    pub kind: RelationshipKind,
    #[serde(default)]
    pub description: String,
}

/// What an analysis agent returns as its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AnalysisPayload {
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// Accumulated output of the analysis agents, in the order they ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AnalysisResult {
    pub insights: Vec<Insight>,
    pub evidence: Vec<Evidence>,
    pub relationships: Vec<Relationship>,
    pub sources: Vec<SourceStats>,
    pub confidence: ConfidenceLevel,
    pub confidence_score: f64,
}

impl AnalysisResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one analyzer's contribution. Ids already present are kept as
    /// they were; later analyzers may reference but not overwrite them.
    pub fn absorb(&mut self, contribution: Contribution<AnalysisPayload>) {
        let Contribution { mut stats, payload } = contribution;
        if let Some(payload) = payload.filter(|_| stats.success) {
            let mut insight_ids: HashSet<String> =
                self.insights.iter().map(|i| i.id.clone()).collect();
            let mut evidence_ids: HashSet<String> =
                self.evidence.iter().map(|e| e.id.clone()).collect();

            stats.items = payload.insights.len();
            for mut insight in payload.insights {
                if insight_ids.insert(insight.id.clone()) {
                    insight.source = insight.source.or(Some(stats.agent_type));
                    self.insights.push(insight);
                }
            }
            for evidence in payload.evidence {
                if evidence_ids.insert(evidence.id.clone()) {
                    self.evidence.push(evidence);
                }
            }
            for relationship in payload.relationships {
                if !self.relationships.contains(&relationship) {
                    self.relationships.push(relationship);
                }
            }
        }
        self.sources.push(stats);
        self.confidence_score = phase_confidence(&self.sources);
        self.confidence = ConfidenceLevel::from_score(self.confidence_score);
    }

    pub fn from_contributions(contributions: Vec<Contribution<AnalysisPayload>>) -> Self {
        let mut result = Self::new();
        for contribution in contributions {
            result.absorb(contribution);
        }
        result
    }

    pub fn insight(&self, id: &str) -> Option<&Insight> {
        self.insights.iter().find(|i| i.id == id)
    }

    pub fn evidence(&self, id: &str) -> Option<&Evidence> {
        self.evidence.iter().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insight(id: &str, title: &str) -> Insight {
        Insight {
            id: id.to_string(),
            category: "architecture".to_string(),
            title: title.to_string(),
            description: String::new(),
            impact: ImpactLevel::Medium,
            confidence: ConfidenceLevel::High,
            evidence_ids: vec![],
            source: None,
        }
    }

    fn contribution(agent_type: AgentType, insights: Vec<Insight>) -> Contribution<AnalysisPayload> {
        Contribution {
            stats: SourceStats {
                task_id: agent_type.to_string(),
                agent_type,
                success: true,
                execution_time_ms: 5,
                confidence: Some(ConfidenceLevel::High),
                items: 0,
                error: None,
            },
            payload: Some(AnalysisPayload {
                insights,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_absorb_is_append_only() {
        let result = AnalysisResult::from_contributions(vec![
            contribution(AgentType::CodebaseAnalyzer, vec![insight("i1", "original")]),
            contribution(
                AgentType::ResearchAnalyzer,
                vec![insight("i1", "rewritten"), insight("i2", "new")],
            ),
        ]);
        assert_eq!(result.insights.len(), 2);
        assert_eq!(result.insight("i1").map(|i| i.title.as_str()), Some("original"));
        assert_eq!(
            result.insight("i2").and_then(|i| i.source),
            Some(AgentType::ResearchAnalyzer)
        );
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.confidence, ConfidenceLevel::High);
    }

    #[test]
    fn test_empty_analysis_has_zero_confidence() {
        let result = AnalysisResult::new();
        assert_eq!(result.confidence_score, 0.0);
        assert_eq!(result.confidence, ConfidenceLevel::Low);
    }
}
