//! Static heuristics over the files discovery surfaced: size, debt markers,
//! hardcoded credentials and cross-file references.

use super::request::{analysis_targets, workspace};
use super::run_blocking;
use super::workspace::WorkspaceFile;
use async_trait::async_trait;
use conductor_application::{AgentError, AgentPort, AgentRequest};
use conductor_domain::aggregation::Finding;
use conductor_domain::research::{
    Evidence, ImpactLevel, Insight, Relationship, RelationshipKind,
};
use conductor_domain::{AgentOutput, AgentType, AnalysisPayload, ConfidenceLevel};
use regex::Regex;
use std::path::{Path, PathBuf};

const LARGE_FILE_LINES: usize = 500;
const VERY_LARGE_FILE_LINES: usize = 1000;
const DEBT_MARKERS_MEDIUM: usize = 10;
const MAX_RELATIONSHIPS: usize = 50;

/// Stems too generic to indicate a reference.
const GENERIC_STEMS: &[&str] = &["mod", "lib", "main", "index", "init", "utils", "readme"];

const DEBT_PATTERN: &str = r"\b(TODO|FIXME|HACK|XXX)\b";
const SECRET_PATTERN: &str =
    r#"(?i)\b(api[_-]?key|secret|password|passwd|token)\b\s*[:=]\s*["'][^"'\s]{8,}["']"#;

struct Draft {
    category: &'static str,
    title: String,
    description: String,
    impact: ImpactLevel,
    confidence: ConfidenceLevel,
}

#[derive(Default)]
struct Collector {
    payload: AnalysisPayload,
    findings: Vec<Finding>,
}

impl Collector {
    fn insight(&mut self, draft: Draft, file: &WorkspaceFile, excerpt: String, line: Option<usize>) {
        let n = self.payload.insights.len() + 1;
        let evidence_id = format!("codebase-ev-{}", n);
        self.payload.evidence.push(Evidence {
            id: evidence_id.clone(),
            source: file.path.clone(),
            excerpt,
            line,
        });
        self.findings.push(
            Finding::new(&file.path, &draft.title, draft.confidence).with_category(draft.category),
        );
        self.payload.insights.push(Insight {
            id: format!("codebase-{}", n),
            category: draft.category.to_string(),
            title: draft.title,
            description: draft.description,
            impact: draft.impact,
            confidence: draft.confidence,
            evidence_ids: vec![evidence_id],
            source: Some(AgentType::CodebaseAnalyzer),
        });
    }
}

pub struct CodebaseAnalyzer {
    root: PathBuf,
}

impl CodebaseAnalyzer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn analyze(request: &AgentRequest, root: &Path) -> AgentOutput {
        let workspace = workspace(request, root);
        let targets: Vec<(WorkspaceFile, String)> = analysis_targets(request, &workspace)
            .into_iter()
            .filter(|f| f.is_code())
            .filter_map(|f| f.read().map(|content| (f, content)))
            .collect();

        if targets.is_empty() {
            return AgentOutput::success(
                serde_json::to_value(AnalysisPayload::default()).unwrap_or_default(),
                ConfidenceLevel::Low,
            )
            .with_reasoning("no source files to analyze");
        }

        let (Ok(debt), Ok(secret)) = (Regex::new(DEBT_PATTERN), Regex::new(SECRET_PATTERN)) else {
            return AgentOutput::failure("invalid built-in pattern");
        };

        let mut out = Collector::default();
        for (file, content) in &targets {
            let lines = content.lines().count();
            if lines > LARGE_FILE_LINES {
                let impact = if lines > VERY_LARGE_FILE_LINES {
                    ImpactLevel::High
                } else {
                    ImpactLevel::Medium
                };
                let draft = Draft {
                    category: "complexity",
                    title: format!("{} is large", file.path),
                    description: format!(
                        "{} has {} lines; consider splitting it along responsibility lines",
                        file.path, lines
                    ),
                    impact,
                    confidence: ConfidenceLevel::High,
                };
                out.insight(draft, file, format!("{} lines", lines), None);
            }

            let markers: Vec<(usize, &str)> = content
                .lines()
                .enumerate()
                .filter(|(_, line)| debt.is_match(line))
                .map(|(i, line)| (i + 1, line.trim()))
                .collect();
            if let Some((first_line, first)) = markers.first() {
                let impact = if markers.len() >= DEBT_MARKERS_MEDIUM {
                    ImpactLevel::Medium
                } else {
                    ImpactLevel::Low
                };
                let draft = Draft {
                    category: "technical-debt",
                    title: format!("{} debt markers in {}", markers.len(), file.path),
                    description: format!("{} carries unresolved TODO/FIXME markers", file.path),
                    impact,
                    confidence: ConfidenceLevel::High,
                };
                out.insight(draft, file, first.to_string(), Some(*first_line));
            }

            if let Some((line, caps)) = content
                .lines()
                .enumerate()
                .find_map(|(i, l)| secret.captures(l).map(|c| (i + 1, c)))
            {
                let key = caps.get(1).map_or("credential", |m| m.as_str());
                let draft = Draft {
                    category: "security",
                    title: format!("Possible hardcoded {} in {}", key, file.path),
                    description: "Credentials in source are exposed to anyone with repository access"
                        .to_string(),
                    impact: ImpactLevel::High,
                    confidence: ConfidenceLevel::Medium,
                };
                out.insight(draft, file, format!("{} = [redacted]", key), Some(line));
            }
        }

        for (from, content) in &targets {
            let content = content.to_lowercase();
            for (to, _) in &targets {
                let stem = to.stem();
                if from.path == to.path
                    || stem.len() < 3
                    || GENERIC_STEMS.contains(&stem.as_str())
                    || !content.contains(&stem)
                {
                    continue;
                }
                if out.payload.relationships.len() >= MAX_RELATIONSHIPS {
                    break;
                }
                out.payload.relationships.push(Relationship {
                    from: from.path.clone(),
                    to: to.path.clone(),
                    kind: RelationshipKind::References,
                    description: format!("{} mentions {}", from.path, stem),
                });
            }
        }

        let confidence = if targets.len() >= 3 {
            ConfidenceLevel::High
        } else {
            ConfidenceLevel::Medium
        };
        let reasoning = format!(
            "analyzed {} files: {} insights, {} relationships",
            targets.len(),
            out.payload.insights.len(),
            out.payload.relationships.len()
        );
        AgentOutput::success(
            serde_json::to_value(&out.payload).unwrap_or_default(),
            confidence,
        )
        .with_findings(out.findings)
        .with_reasoning(reasoning)
    }
}

#[async_trait]
impl AgentPort for CodebaseAnalyzer {
    fn agent_type(&self) -> AgentType {
        AgentType::CodebaseAnalyzer
    }

    async fn invoke(&self, request: AgentRequest) -> Result<AgentOutput, AgentError> {
        let root = self.root.clone();
        run_blocking(move || Self::analyze(&request, &root)).await
    }
}
