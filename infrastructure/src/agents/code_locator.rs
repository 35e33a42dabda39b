//! Finds source files relevant to a query by term matching.

use super::request::{research_query, workspace};
use super::run_blocking;
use async_trait::async_trait;
use conductor_application::{AgentError, AgentPort, AgentRequest};
use conductor_domain::aggregation::Finding;
use conductor_domain::research::{FileReference, relevance_score};
use conductor_domain::{AgentOutput, AgentType, ConfidenceLevel, DiscoveryPayload};
use std::path::PathBuf;

/// Term coverage and raw occurrence count of `terms` in lowercased `text`.
pub(crate) fn term_hits(text: &str, terms: &[String]) -> (usize, usize) {
    let mut matched = 0;
    let mut hits = 0;
    for term in terms {
        let count = text.matches(term.as_str()).count();
        if count > 0 {
            matched += 1;
            hits += count;
        }
    }
    (matched, hits)
}

/// Terms that appear in the path or content, in query order.
pub(crate) fn matched_terms<'a>(terms: &'a [String], path: &str, content: &str) -> Vec<&'a str> {
    let path = path.to_lowercase();
    terms
        .iter()
        .filter(|t| path.contains(t.as_str()) || content.contains(t.as_str()))
        .map(String::as_str)
        .collect()
}

pub struct CodeLocator {
    root: PathBuf,
}

impl CodeLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn locate(request: &AgentRequest, root: &std::path::Path) -> AgentOutput {
        let query = research_query(request);
        let terms = query.terms();
        if terms.is_empty() {
            return AgentOutput::failure("query has no searchable terms");
        }

        let mut files: Vec<FileReference> = Vec::new();
        for file in workspace(request, root)
            .scan(&query.constraints)
            .into_iter()
            .filter(|f| f.is_code())
        {
            let Some(content) = file.read().map(|c| c.to_lowercase()) else {
                continue;
            };
            let (matched, hits) = term_hits(&content, &terms);
            let relevance = relevance_score(&terms, &file.path, matched, hits);
            if relevance <= 0.0 {
                continue;
            }
            files.push(FileReference {
                reason: format!(
                    "matches {}",
                    matched_terms(&terms, &file.path, &content).join(", ")
                ),
                path: file.path,
                relevance,
                modified: file.modified,
                source: Some(AgentType::CodeLocator),
            });
        }

        files.sort_by(|a, b| b.relevance.total_cmp(&a.relevance).then(a.path.cmp(&b.path)));
        files.truncate(query.max_files());

        let best = files.first().map_or(0.0, |f| f.relevance);
        let confidence = ConfidenceLevel::from_score(best);
        let findings = files
            .iter()
            .map(|f| Finding::new(&f.path, &f.reason, confidence).with_category("location"))
            .collect();
        let reasoning = format!("{} source files matched {}", files.len(), terms.join(", "));
        let payload = DiscoveryPayload {
            files,
            ..Default::default()
        };

        AgentOutput::success(serde_json::to_value(payload).unwrap_or_default(), confidence)
            .with_findings(findings)
            .with_reasoning(reasoning)
    }
}

#[async_trait]
impl AgentPort for CodeLocator {
    fn agent_type(&self) -> AgentType {
        AgentType::CodeLocator
    }

    async fn invoke(&self, request: AgentRequest) -> Result<AgentOutput, AgentError> {
        let root = self.root.clone();
        run_blocking(move || Self::locate(&request, &root)).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::workspace::test_support::write_tree;
    use super::*;
    use conductor_domain::{AgentInput, ResearchQuery};
    use serde_json::json;

    fn request(query: &ResearchQuery) -> AgentRequest {
        AgentRequest::new(
            "discovery-code-locator",
            AgentType::CodeLocator,
            AgentInput::new(json!({ "query": query })),
        )
    }

    #[tokio::test]
    async fn test_ranks_files_by_relevance() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                ("src/session.rs", "fn refresh_token() { token.refresh(); token }"),
                ("src/util.rs", "// mentions token once"),
                ("src/other.rs", "nothing here"),
                ("docs/token.md", "token token"),
            ],
        );

        let agent = CodeLocator::new(dir.path());
        let output = agent
            .invoke(request(&ResearchQuery::new("session token")))
            .await
            .unwrap();

        assert!(output.success);
        let payload: DiscoveryPayload = serde_json::from_value(output.payload).unwrap();
        let paths: Vec<&str> = payload.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/session.rs", "src/util.rs"]);
        assert!(payload.files[0].relevance > payload.files[1].relevance);
        assert_eq!(payload.files[0].reason, "matches session, token");
        assert_eq!(output.findings.len(), 2);
    }

    #[tokio::test]
    async fn test_respects_max_files() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[("a.rs", "cache"), ("b.rs", "cache"), ("c.rs", "cache")],
        );
        let mut query = ResearchQuery::new("cache");
        query.constraints.max_files = Some(2);

        let output = CodeLocator::new(dir.path()).invoke(request(&query)).await.unwrap();
        let payload: DiscoveryPayload = serde_json::from_value(output.payload).unwrap();
        assert_eq!(payload.files.len(), 2);
    }

    #[tokio::test]
    async fn test_query_without_terms_fails() {
        let dir = tempfile::tempdir().unwrap();
        let output = CodeLocator::new(dir.path())
            .invoke(request(&ResearchQuery::new("how is it")))
            .await
            .unwrap();
        assert!(!output.success);
    }

    #[test]
    fn test_term_hits() {
        let terms = vec!["auth".to_string(), "login".to_string(), "oauth".to_string()];
        assert_eq!(term_hits("auth login auth", &terms), (2, 3));
    }
}
