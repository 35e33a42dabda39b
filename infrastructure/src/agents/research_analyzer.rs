//! Reads the discovery result as a whole: coverage gaps, where the relevant
//! code lives, which documents describe it, and follow-ups on high-impact
//! insights from earlier analyzers.

use super::request::{discovery, prior_analysis, research_query, workspace};
use super::run_blocking;
use super::workspace::Workspace;
use async_trait::async_trait;
use conductor_application::{AgentError, AgentPort, AgentRequest};
use conductor_domain::aggregation::Finding;
use conductor_domain::research::{
    Evidence, ImpactLevel, Insight, Relationship, RelationshipKind,
};
use conductor_domain::{
    AgentOutput, AgentType, AnalysisPayload, ConfidenceLevel, DiscoveryResult, ResearchQuery,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Share of discovered files in one directory that counts as concentrated.
const CONCENTRATION_SHARE: f64 = 0.6;
const CONCENTRATION_MIN_FILES: usize = 3;

pub struct ResearchAnalyzer {
    root: PathBuf,
}

struct Analysis<'a> {
    query: &'a ResearchQuery,
    discovery: &'a DiscoveryResult,
    payload: AnalysisPayload,
    findings: Vec<Finding>,
}

impl Analysis<'_> {
    fn push(&mut self, insight: Insight, evidence: Option<Evidence>) {
        let entity = evidence
            .as_ref()
            .map_or_else(|| insight.id.clone(), |e| e.source.clone());
        self.findings.push(
            Finding::new(entity, &insight.title, insight.confidence)
                .with_category(insight.category.clone()),
        );
        self.payload.evidence.extend(evidence);
        self.payload.insights.push(insight);
    }

    fn next_id(&self, kind: &str) -> String {
        format!("research-{}-{}", kind, self.payload.insights.len() + 1)
    }

    fn coverage_gaps(&mut self) {
        if !self.discovery.files.is_empty() && self.discovery.docs.is_empty() {
            let insight = Insight {
                id: self.next_id("docs"),
                category: "documentation".to_string(),
                title: "No documentation covers this area".to_string(),
                description: format!(
                    "{} source files relate to \"{}\" but no document mentions it",
                    self.discovery.files.len(),
                    self.query.text
                ),
                impact: ImpactLevel::Medium,
                confidence: ConfidenceLevel::High,
                evidence_ids: Vec::new(),
                source: Some(AgentType::ResearchAnalyzer),
            };
            self.push(insight, None);
        }

        let failed: Vec<String> = self
            .discovery
            .failed_sources()
            .map(|s| s.agent_type.to_string())
            .collect();
        if !failed.is_empty() {
            let insight = Insight {
                id: self.next_id("coverage"),
                category: "coverage".to_string(),
                title: "Discovery was incomplete".to_string(),
                description: format!("No results from: {}", failed.join(", ")),
                impact: ImpactLevel::Low,
                confidence: ConfidenceLevel::High,
                evidence_ids: Vec::new(),
                source: Some(AgentType::ResearchAnalyzer),
            };
            self.push(insight, None);
        }
    }

    fn concentration(&mut self) {
        let total = self.discovery.files.len();
        if total < CONCENTRATION_MIN_FILES {
            return;
        }
        let mut by_dir: BTreeMap<String, usize> = BTreeMap::new();
        for file in &self.discovery.files {
            let dir = Path::new(&file.path)
                .parent()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| ".".to_string());
            *by_dir.entry(dir).or_default() += 1;
        }
        let Some((dir, count)) = by_dir
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        else {
            return;
        };
        if (count as f64) / (total as f64) < CONCENTRATION_SHARE {
            return;
        }

        let id = self.next_id("layout");
        let evidence = Evidence {
            id: format!("{}-ev", id),
            source: dir.clone(),
            excerpt: format!("{} of {} relevant files", count, total),
            line: None,
        };
        let insight = Insight {
            id,
            category: "architecture".to_string(),
            title: format!("Relevant code is concentrated in {}", dir),
            description: format!(
                "{} of the {} relevant files live under {}; changes will likely stay local",
                count, total, dir
            ),
            impact: ImpactLevel::Low,
            confidence: ConfidenceLevel::Medium,
            evidence_ids: vec![evidence.id.clone()],
            source: Some(AgentType::ResearchAnalyzer),
        };
        self.push(insight, Some(evidence));
    }

    fn documentation_links(&mut self, workspace: &Workspace) {
        let doc_paths: Vec<&str> = self.discovery.docs.iter().map(|d| d.path.as_str()).collect();
        for doc in workspace.files(&doc_paths) {
            let Some(content) = doc.read().map(|c| c.to_lowercase()) else {
                continue;
            };
            for file in &self.discovery.files {
                let stem = Path::new(&file.path)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_lowercase();
                let mentioned = content.contains(&file.path.to_lowercase())
                    || (stem.len() >= 3 && content.contains(&stem));
                if mentioned {
                    self.payload.relationships.push(Relationship {
                        from: doc.path.clone(),
                        to: file.path.clone(),
                        kind: RelationshipKind::Documents,
                        description: format!("{} describes {}", doc.path, file.path),
                    });
                }
            }
        }
    }

    fn follow_ups(&mut self, prior: Vec<AnalysisPayload>) {
        for earlier in prior.iter().flat_map(|p| p.insights.iter()) {
            if earlier.impact < ImpactLevel::High {
                continue;
            }
            let id = format!("research-followup-{}", earlier.id);
            self.payload.relationships.push(Relationship {
                from: id.clone(),
                to: earlier.id.clone(),
                kind: RelationshipKind::References,
                description: "follow-up".to_string(),
            });
            let insight = Insight {
                id,
                category: "risk".to_string(),
                title: format!("Follow up: {}", earlier.title),
                description: format!(
                    "A {}-impact {} finding touches the researched area",
                    earlier.impact, earlier.category
                ),
                impact: earlier.impact,
                confidence: ConfidenceLevel::Medium,
                evidence_ids: earlier.evidence_ids.clone(),
                source: Some(AgentType::ResearchAnalyzer),
            };
            self.push(insight, None);
        }
    }
}

impl ResearchAnalyzer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn analyze(request: &AgentRequest, root: &Path) -> AgentOutput {
        let query = research_query(request);
        let Some(discovery) = discovery(request) else {
            return AgentOutput::failure("research analysis needs a discovery result");
        };
        let workspace = workspace(request, root);

        let mut analysis = Analysis {
            query: &query,
            discovery: &discovery,
            payload: AnalysisPayload::default(),
            findings: Vec::new(),
        };
        analysis.coverage_gaps();
        analysis.concentration();
        analysis.documentation_links(&workspace);
        analysis.follow_ups(prior_analysis(request));

        let confidence = match (discovery.files.is_empty(), discovery.docs.is_empty()) {
            (true, true) => ConfidenceLevel::Low,
            (false, false) => ConfidenceLevel::High,
            _ => ConfidenceLevel::Medium,
        };
        let reasoning = format!(
            "{} insights and {} relationships from {} files and {} documents",
            analysis.payload.insights.len(),
            analysis.payload.relationships.len(),
            discovery.files.len(),
            discovery.docs.len()
        );
        AgentOutput::success(
            serde_json::to_value(&analysis.payload).unwrap_or_default(),
            confidence,
        )
        .with_findings(analysis.findings)
        .with_reasoning(reasoning)
    }
}

#[async_trait]
impl AgentPort for ResearchAnalyzer {
    fn agent_type(&self) -> AgentType {
        AgentType::ResearchAnalyzer
    }

    async fn invoke(&self, request: AgentRequest) -> Result<AgentOutput, AgentError> {
        let root = self.root.clone();
        run_blocking(move || Self::analyze(&request, &root)).await
    }
}
