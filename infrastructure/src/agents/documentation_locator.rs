//! Finds documentation relevant to a query.

use super::code_locator::term_hits;
use super::request::{research_query, workspace};
use super::run_blocking;
use async_trait::async_trait;
use conductor_application::{AgentError, AgentPort, AgentRequest};
use conductor_domain::aggregation::Finding;
use conductor_domain::research::{DocReference, relevance_score};
use conductor_domain::{AgentOutput, AgentType, ConfidenceLevel, DiscoveryPayload};
use std::path::{Path, PathBuf};

const EXCERPT_CHARS: usize = 200;

/// First markdown or underlined heading, else the file stem.
fn title(content: &str, fallback: &str) -> String {
    let lines: Vec<&str> = content.lines().take(40).collect();
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if let Some(heading) = trimmed.strip_prefix('#') {
            let heading = heading.trim_start_matches('#').trim();
            if !heading.is_empty() {
                return heading.to_string();
            }
        }
        if let Some(next) = lines.get(i + 1)
            && !trimmed.is_empty()
            && next.len() >= 3
            && next.trim().chars().all(|c| c == '=' || c == '-')
        {
            return trimmed.to_string();
        }
    }
    fallback.to_string()
}

/// First line mentioning any term, trimmed to a short excerpt.
fn excerpt(content: &str, terms: &[String]) -> String {
    content
        .lines()
        .map(str::trim)
        .find(|line| {
            let lower = line.to_lowercase();
            terms.iter().any(|t| lower.contains(t.as_str()))
        })
        .map(|line| line.chars().take(EXCERPT_CHARS).collect())
        .unwrap_or_default()
}

pub struct DocumentationLocator {
    root: PathBuf,
}

impl DocumentationLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn locate(request: &AgentRequest, root: &Path) -> AgentOutput {
        let query = research_query(request);
        let terms = query.terms();
        if terms.is_empty() {
            return AgentOutput::failure("query has no searchable terms");
        }

        let mut docs: Vec<DocReference> = Vec::new();
        for file in workspace(request, root)
            .scan(&query.constraints)
            .into_iter()
            .filter(|f| f.is_doc())
        {
            let Some(content) = file.read() else {
                continue;
            };
            let (matched, hits) = term_hits(&content.to_lowercase(), &terms);
            let relevance = relevance_score(&terms, &file.path, matched, hits);
            if relevance <= 0.0 {
                continue;
            }
            docs.push(DocReference {
                title: title(&content, &file.stem()),
                excerpt: excerpt(&content, &terms),
                path: file.path,
                relevance,
                source: Some(AgentType::DocumentationLocator),
            });
        }

        docs.sort_by(|a, b| b.relevance.total_cmp(&a.relevance).then(a.path.cmp(&b.path)));
        docs.truncate(query.max_files());

        let best = docs.first().map_or(0.0, |d| d.relevance);
        let confidence = ConfidenceLevel::from_score(best);
        let findings = docs
            .iter()
            .map(|d| Finding::new(&d.path, &d.title, confidence).with_category("documentation"))
            .collect();
        let reasoning = format!("{} documents matched", docs.len());
        let payload = DiscoveryPayload {
            docs,
            ..Default::default()
        };

        AgentOutput::success(serde_json::to_value(payload).unwrap_or_default(), confidence)
            .with_findings(findings)
            .with_reasoning(reasoning)
    }
}

#[async_trait]
impl AgentPort for DocumentationLocator {
    fn agent_type(&self) -> AgentType {
        AgentType::DocumentationLocator
    }

    async fn invoke(&self, request: AgentRequest) -> Result<AgentOutput, AgentError> {
        let root = self.root.clone();
        run_blocking(move || Self::locate(&request, &root)).await
    }
}
