//! Synthesis: fold discovery and analysis into a final report.

use super::analysis::{AnalysisResult, ImpactLevel, Insight};
use super::discovery::DiscoveryResult;
use super::query::ResearchQuery;
use crate::aggregation::ConfidenceLevel;
use serde::{Deserialize, Serialize};

/// Categories whose insights are always treated as risks.
const RISK_CATEGORIES: &[&str] = &[
    "risk",
    "security",
    "complexity",
    "technical-debt",
    "reliability",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Immediate,
    ShortTerm,
    LongTerm,
}

impl Horizon {
    /// Bucket a risk score (`probability × severity`).
    pub fn from_risk(score: f64, impact: ImpactLevel) -> Self {
        if impact == ImpactLevel::Critical || score >= 0.5 {
            Horizon::Immediate
        } else if score >= 0.25 {
            Horizon::ShortTerm
        } else {
            Horizon::LongTerm
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Horizon::Immediate => "immediate",
            Horizon::ShortTerm => "short-term",
            Horizon::LongTerm => "long-term",
        }
    }
}

impl std::fmt::Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Insights of one category, by id, highest impact first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySection {
    pub category: String,
    pub insight_ids: Vec<String>,
    pub top_impact: ImpactLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub horizon: Horizon,
    pub title: String,
    pub rationale: String,
    pub insight_ids: Vec<String>,
    pub priority_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub id: String,
    pub insight_id: String,
    pub description: String,
    pub probability: f64,
    pub severity: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisReport {
    pub summary: String,
    pub sections: Vec<CategorySection>,
    pub recommendations: Vec<Recommendation>,
    pub risks: Vec<Risk>,
    pub open_questions: Vec<String>,
    pub confidence: ConfidenceLevel,
    /// Never above the discovery or analysis score
    pub confidence_score: f64,
}

pub fn synthesize(
    query: &ResearchQuery,
    discovery: &DiscoveryResult,
    analysis: &AnalysisResult,
) -> SynthesisReport {
    let ranked = rank_insights(&analysis.insights);
    let sections = build_sections(&ranked);
    let risks = extract_risks(&ranked);
    let recommendations = derive_recommendations(&ranked);
    let open_questions = open_questions(query, discovery, analysis);

    let internal = ConfidenceLevel::mean(analysis.insights.iter().map(|i| i.confidence))
        .unwrap_or(analysis.confidence_score);
    let confidence_score = internal
        .min(discovery.confidence_score)
        .min(analysis.confidence_score);

    let summary = format!(
        "{} insight(s) across {} categor{} from {} file(s); {} recommendation(s), {} risk(s), {} open question(s)",
        analysis.insights.len(),
        sections.len(),
        if sections.len() == 1 { "y" } else { "ies" },
        discovery.files.len() + discovery.docs.len(),
        recommendations.len(),
        risks.len(),
        open_questions.len(),
    );

    SynthesisReport {
        summary,
        sections,
        recommendations,
        risks,
        open_questions,
        confidence: ConfidenceLevel::from_score(confidence_score),
        confidence_score,
    }
}

fn risk_score(insight: &Insight) -> f64 {
    insight.confidence.anchor() * insight.impact.severity()
}

/// Impact first, then confidence; declaration order breaks ties.
fn rank_insights(insights: &[Insight]) -> Vec<&Insight> {
    let mut ranked: Vec<&Insight> = insights.iter().collect();
    ranked.sort_by(|a, b| b.impact.cmp(&a.impact).then(b.confidence.cmp(&a.confidence)));
    ranked
}

fn build_sections(ranked: &[&Insight]) -> Vec<CategorySection> {
    let mut sections: Vec<CategorySection> = Vec::new();
    for insight in ranked {
        let category = insight.category.trim().to_lowercase();
        match sections.iter_mut().find(|s| s.category == category) {
            Some(section) => section.insight_ids.push(insight.id.clone()),
            None => sections.push(CategorySection {
                category,
                insight_ids: vec![insight.id.clone()],
                top_impact: insight.impact,
            }),
        }
    }
    sections
}

fn extract_risks(ranked: &[&Insight]) -> Vec<Risk> {
    let mut risks: Vec<Risk> = ranked
        .iter()
        .filter(|i| {
            i.impact >= ImpactLevel::High
                || RISK_CATEGORIES.contains(&i.category.trim().to_lowercase().as_str())
        })
        .enumerate()
        .map(|(n, i)| Risk {
            id: format!("risk-{}", n + 1),
            insight_id: i.id.clone(),
            description: i.title.clone(),
            probability: i.confidence.anchor(),
            severity: i.impact.severity(),
            score: risk_score(i),
        })
        .collect();
    risks.sort_by(|a, b| b.score.total_cmp(&a.score));
    risks
}

fn derive_recommendations(ranked: &[&Insight]) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = ranked
        .iter()
        .filter(|i| i.impact >= ImpactLevel::Medium)
        .enumerate()
        .map(|(n, i)| {
            let score = risk_score(i);
            let horizon = Horizon::from_risk(score, i.impact);
            let verb = match horizon {
                Horizon::Immediate => "Address",
                Horizon::ShortTerm => "Plan work on",
                Horizon::LongTerm => "Monitor",
            };
            Recommendation {
                id: format!("rec-{}", n + 1),
                horizon,
                title: format!("{} {}", verb, i.title),
                rationale: format!(
                    "{} impact at {} confidence (risk {:.2})",
                    i.impact, i.confidence, score
                ),
                insight_ids: vec![i.id.clone()],
                priority_score: score,
            }
        })
        .collect();
    recommendations.sort_by(|a, b| {
        a.horizon
            .cmp(&b.horizon)
            .then(b.priority_score.total_cmp(&a.priority_score))
    });
    recommendations
}

fn open_questions(
    query: &ResearchQuery,
    discovery: &DiscoveryResult,
    analysis: &AnalysisResult,
) -> Vec<String> {
    let mut questions: Vec<String> = Vec::new();
    let mut ask = |q: String| {
        if !questions.contains(&q) {
            questions.push(q);
        }
    };

    if discovery.is_empty() {
        ask(format!(
            "Nothing matched \"{}\"; is the scope or file filter too narrow?",
            query.text
        ));
    }

    let haystack: String = discovery
        .paths()
        .into_iter()
        .map(str::to_lowercase)
        .chain(analysis.insights.iter().map(|i| {
            format!("{} {}", i.title, i.description).to_lowercase()
        }))
        .chain(discovery.patterns.iter().map(|p| p.snippet.to_lowercase()))
        .collect::<Vec<_>>()
        .join("\n");
    for term in query.terms() {
        if !haystack.contains(&term) {
            ask(format!("No evidence found for \"{}\"", term));
        }
    }

    for source in discovery.failed_sources().chain(analysis.sources.iter().filter(|s| !s.success)) {
        ask(format!(
            "{} did not complete ({}); its coverage is missing",
            source.agent_type,
            source.error.as_deref().unwrap_or("no output")
        ));
    }

    for insight in &analysis.insights {
        if insight.confidence == ConfidenceLevel::Low {
            ask(format!("Needs verification: {}", insight.title));
        }
        let supported = insight
            .evidence_ids
            .iter()
            .any(|id| analysis.evidence(id).is_some());
        if !supported {
            ask(format!("No supporting evidence for: {}", insight.title));
        }
    }

    questions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentType;
    use crate::research::analysis::{AnalysisPayload, Evidence};
    use crate::research::discovery::{DiscoveryPayload, FileReference, merge_discovery};
    use crate::research::source::{Contribution, SourceStats};

    fn stats(agent_type: AgentType, confidence: ConfidenceLevel) -> SourceStats {
        SourceStats {
            task_id: agent_type.to_string(),
            agent_type,
            success: true,
            execution_time_ms: 1,
            confidence: Some(confidence),
            items: 0,
            error: None,
        }
    }

    fn insight(
        id: &str,
        category: &str,
        impact: ImpactLevel,
        confidence: ConfidenceLevel,
    ) -> Insight {
        Insight {
            id: id.to_string(),
            category: category.to_string(),
            title: format!("auth insight {}", id),
            description: String::new(),
            impact,
            confidence,
            evidence_ids: vec!["e1".to_string()],
            source: None,
        }
    }

    fn discovery(query: &ResearchQuery, confidence: ConfidenceLevel) -> DiscoveryResult {
        merge_discovery(
            query,
            vec![Contribution {
                stats: stats(AgentType::CodeLocator, confidence),
                payload: Some(DiscoveryPayload {
                    files: vec![FileReference {
                        path: "src/auth.rs".to_string(),
                        relevance: 0.9,
                        reason: String::new(),
                        modified: None,
                        source: None,
                    }],
                    ..Default::default()
                }),
            }],
        )
    }

    fn analysis(insights: Vec<Insight>, confidence: ConfidenceLevel) -> AnalysisResult {
        AnalysisResult::from_contributions(vec![Contribution {
            stats: stats(AgentType::CodebaseAnalyzer, confidence),
            payload: Some(AnalysisPayload {
                insights,
                evidence: vec![Evidence {
                    id: "e1".to_string(),
                    source: "src/auth.rs".to_string(),
                    excerpt: "fn login()".to_string(),
                    line: Some(3),
                }],
                relationships: vec![],
            }),
        }])
    }

    #[test]
    fn test_confidence_never_exceeds_weakest_phase() {
        let query = ResearchQuery::new("auth");
        let disc = discovery(&query, ConfidenceLevel::Low);
        let anal = analysis(
            vec![insight("i1", "security", ImpactLevel::High, ConfidenceLevel::VeryHigh)],
            ConfidenceLevel::VeryHigh,
        );
        let report = synthesize(&query, &disc, &anal);
        assert!(report.confidence_score <= disc.confidence_score);
        assert!(report.confidence_score <= anal.confidence_score);
        assert_eq!(report.confidence, ConfidenceLevel::Low);
    }

    #[test]
    fn test_sections_are_grouped_and_ordered_by_impact() {
        let query = ResearchQuery::new("auth");
        let disc = discovery(&query, ConfidenceLevel::High);
        let anal = analysis(
            vec![
                insight("i1", "structure", ImpactLevel::Low, ConfidenceLevel::High),
                insight("i2", "security", ImpactLevel::Critical, ConfidenceLevel::Medium),
                insight("i3", "Structure", ImpactLevel::High, ConfidenceLevel::High),
            ],
            ConfidenceLevel::High,
        );
        let report = synthesize(&query, &disc, &anal);

        assert_eq!(report.sections.len(), 2);
        assert_eq!(report.sections[0].category, "security");
        assert_eq!(report.sections[1].insight_ids, vec!["i3", "i1"]);
        assert_eq!(report.sections[1].top_impact, ImpactLevel::High);
    }

    #[test]
    fn test_risks_and_recommendation_buckets() {
        let query = ResearchQuery::new("auth");
        let disc = discovery(&query, ConfidenceLevel::High);
        let anal = analysis(
            vec![
                insight("crit", "security", ImpactLevel::Critical, ConfidenceLevel::Low),
                insight("mid", "structure", ImpactLevel::Medium, ConfidenceLevel::Medium),
                insight("high", "structure", ImpactLevel::High, ConfidenceLevel::High),
                insight("minor", "style", ImpactLevel::Low, ConfidenceLevel::High),
            ],
            ConfidenceLevel::High,
        );
        let report = synthesize(&query, &disc, &anal);

        let risk_ids: Vec<_> = report.risks.iter().map(|r| r.insight_id.as_str()).collect();
        assert_eq!(risk_ids, vec!["high", "crit"]);
        assert!((report.risks[0].score - 0.5625).abs() < 1e-9);

        let buckets: Vec<_> = report
            .recommendations
            .iter()
            .map(|r| (r.insight_ids[0].as_str(), r.horizon))
            .collect();
        assert_eq!(
            buckets,
            vec![
                ("high", Horizon::Immediate),
                ("crit", Horizon::Immediate),
                ("mid", Horizon::ShortTerm),
            ]
        );
    }

    #[test]
    fn test_open_questions() {
        let query = ResearchQuery::new("auth billing");
        let disc = discovery(&query, ConfidenceLevel::High);
        let mut weak = insight("i1", "structure", ImpactLevel::Low, ConfidenceLevel::Low);
        weak.evidence_ids.clear();
        let anal = analysis(vec![weak], ConfidenceLevel::High);
        let report = synthesize(&query, &disc, &anal);

        assert!(report.open_questions.contains(&"No evidence found for \"billing\"".to_string()));
        assert!(report.open_questions.iter().any(|q| q.starts_with("Needs verification")));
        assert!(report.open_questions.iter().any(|q| q.starts_with("No supporting evidence")));
        assert!(!report.open_questions.iter().any(|q| q.contains("\"auth\"")));
    }
}
