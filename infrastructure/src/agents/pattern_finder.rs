//! Finds line-level occurrences of the query terms.

use super::request::{research_query, workspace};
use super::run_blocking;
use async_trait::async_trait;
use conductor_application::{AgentError, AgentPort, AgentRequest};
use conductor_domain::aggregation::Finding;
use conductor_domain::research::{PatternMatch, relevance_score};
use conductor_domain::{AgentOutput, AgentType, ConfidenceLevel, DiscoveryPayload};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const MAX_MATCHES_PER_FILE: usize = 5;
const MATCHES_PER_RESULT_FILE: usize = 5;
const SNIPPET_CHARS: usize = 160;

pub struct PatternFinder {
    root: PathBuf,
}

impl PatternFinder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn find(request: &AgentRequest, root: &Path) -> AgentOutput {
        let query = research_query(request);
        let terms = query.terms();
        let patterns: Vec<(String, Regex)> = terms
            .iter()
            .filter_map(|t| {
                Regex::new(&format!("(?i){}", regex::escape(t)))
                    .ok()
                    .map(|re| (t.clone(), re))
            })
            .collect();
        if patterns.is_empty() {
            return AgentOutput::failure("query has no searchable terms");
        }

        let limit = query.max_files() * MATCHES_PER_RESULT_FILE;
        let mut matches: Vec<PatternMatch> = Vec::new();
        let files = workspace(request, root).scan(&query.constraints);
        'files: for file in files.iter().filter(|f| f.is_code() || f.is_doc()) {
            let Some(content) = file.read() else {
                continue;
            };
            let mut in_file = Vec::new();
            for (number, line) in content.lines().enumerate() {
                for (term, re) in &patterns {
                    if re.is_match(line) {
                        in_file.push((term, number + 1, line.trim()));
                        break;
                    }
                }
                if in_file.len() >= MAX_MATCHES_PER_FILE {
                    break;
                }
            }
            let distinct = in_file.iter().map(|(t, _, _)| *t).collect::<HashSet<_>>().len();
            let relevance = relevance_score(&terms, &file.path, distinct, in_file.len());
            for (term, line, snippet) in in_file {
                matches.push(PatternMatch {
                    pattern: term.clone(),
                    path: file.path.clone(),
                    line,
                    snippet: snippet.chars().take(SNIPPET_CHARS).collect(),
                    relevance,
                    source: Some(AgentType::PatternFinder),
                });
                if matches.len() >= limit {
                    break 'files;
                }
            }
        }

        matches.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then(a.path.cmp(&b.path))
                .then(a.line.cmp(&b.line))
        });

        let best = matches.first().map_or(0.0, |m| m.relevance);
        let confidence = ConfidenceLevel::from_score(best);
        let findings = matches
            .iter()
            .map(|m| {
                Finding::new(
                    format!("{}:{}", m.path, m.line),
                    format!("uses `{}`", m.pattern),
                    confidence,
                )
                .with_category("pattern")
            })
            .collect();
        let reasoning = format!("{} matching lines", matches.len());
        let payload = DiscoveryPayload {
            patterns: matches,
            ..Default::default()
        };

        AgentOutput::success(serde_json::to_value(payload).unwrap_or_default(), confidence)
            .with_findings(findings)
            .with_reasoning(reasoning)
    }
}

#[async_trait]
impl AgentPort for PatternFinder {
    fn agent_type(&self) -> AgentType {
        AgentType::PatternFinder
    }

    async fn invoke(&self, request: AgentRequest) -> Result<AgentOutput, AgentError> {
        let root = self.root.clone();
        run_blocking(move || Self::find(&request, &root)).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::workspace::test_support::write_tree;
    use super::*;
    use conductor_domain::{AgentInput, ResearchQuery};
    use serde_json::json;

    fn request(text: &str) -> AgentRequest {
        AgentRequest::new(
            "discovery-pattern-finder",
            AgentType::PatternFinder,
            AgentInput::new(json!({ "query": ResearchQuery::new(text) })),
        )
    }

    #[tokio::test]
    async fn test_reports_line_numbers_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[("src/retry.rs", "use std::time;\n\nfn Backoff() {}\n// backoff again\n")],
        );

        let output = PatternFinder::new(dir.path())
            .invoke(request("backoff"))
            .await
            .unwrap();
        let payload: DiscoveryPayload = serde_json::from_value(output.payload).unwrap();
        let lines: Vec<usize> = payload.patterns.iter().map(|p| p.line).collect();
        assert_eq!(lines, vec![3, 4]);
        assert_eq!(payload.patterns[0].snippet, "fn Backoff() {}");
        assert_eq!(payload.patterns[0].pattern, "backoff");
        assert_eq!(output.findings[0].entity, "src/retry.rs:3");
    }

    #[tokio::test]
    async fn test_caps_matches_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let content = "lock\n".repeat(20);
        write_tree(dir.path(), &[("src/mutex.rs", content.as_str())]);

        let output = PatternFinder::new(dir.path())
            .invoke(request("lock"))
            .await
            .unwrap();
        let payload: DiscoveryPayload = serde_json::from_value(output.payload).unwrap();
        assert_eq!(payload.patterns.len(), MAX_MATCHES_PER_FILE);
    }

    #[tokio::test]
    async fn test_special_characters_are_literal() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("a.rs", "value_x = 1\nvalueyx = 2\n")]);

        let output = PatternFinder::new(dir.path())
            .invoke(request("value_x"))
            .await
            .unwrap();
        let payload: DiscoveryPayload = serde_json::from_value(output.payload).unwrap();
        assert_eq!(payload.patterns.len(), 1);
        assert_eq!(payload.patterns[0].line, 1);
    }
}
