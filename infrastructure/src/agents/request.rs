//! Interpreting an [`AgentRequest`] for the local agents.
//!
//! Research phases pass a full query object in `context.query`; plan tasks
//! pass their title, description and files. Both are accepted.

use super::code_locator::term_hits;
use super::workspace::{Workspace, WorkspaceFile};
use conductor_application::AgentRequest;
use conductor_domain::{AnalysisPayload, DiscoveryResult, ResearchQuery};
use serde_json::Value;
use std::path::Path;

/// The research query a request asks about.
pub fn research_query(request: &AgentRequest) -> ResearchQuery {
    let context = &request.input.context;
    let parameters = &request.input.parameters;

    let mut query = match context.get("query") {
        Some(Value::Object(_)) => serde_json::from_value(context["query"].clone())
            .unwrap_or_else(|_| ResearchQuery::new(String::new())),
        Some(Value::String(text)) => ResearchQuery::new(text.clone()),
        _ => {
            let text = ["title", "description"]
                .iter()
                .filter_map(|k| context.get(*k).and_then(Value::as_str))
                .chain(parameters.get("query").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            ResearchQuery::new(text)
        }
    };

    if let Some(depth) = parameters
        .get("depth")
        .and_then(Value::as_str)
        .and_then(|d| d.parse().ok())
    {
        query.depth = depth;
    }
    if let Some(max) = parameters.get("max_files").and_then(Value::as_u64) {
        query.constraints.max_files = Some(max as usize);
    }
    query
}

/// The merged discovery result, when the request comes from an analysis phase.
pub fn discovery(request: &AgentRequest) -> Option<DiscoveryResult> {
    request
        .input
        .context
        .get("discovery")
        .and_then(|d| serde_json::from_value(d.clone()).ok())
}

/// Files named explicitly by a plan task.
pub fn task_files(request: &AgentRequest) -> Vec<String> {
    request
        .input
        .context
        .get("files")
        .and_then(Value::as_array)
        .map(|files| {
            files
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Analysis payloads of earlier successful agents visible to this call.
pub fn prior_analysis(request: &AgentRequest) -> Vec<AnalysisPayload> {
    request
        .prior_results
        .iter()
        .filter(|r| r.is_success())
        .filter_map(|r| serde_json::from_value(r.payload.clone()).ok())
        .collect()
}

/// Workspace for this call: the request's working directory, else `default_root`.
pub fn workspace(request: &AgentRequest, default_root: &Path) -> Workspace {
    Workspace::new(
        request
            .working_dir
            .clone()
            .unwrap_or_else(|| default_root.to_path_buf()),
    )
}

/// Files an analyzer should inspect.
///
/// Prefers paths found by discovery, then files named by a plan task, then
/// the best term matches in the workspace.
pub fn analysis_targets(request: &AgentRequest, workspace: &Workspace) -> Vec<WorkspaceFile> {
    if let Some(discovery) = discovery(request) {
        return workspace.files(&discovery.paths());
    }
    let named = task_files(request);
    if !named.is_empty() {
        let paths: Vec<&str> = named.iter().map(String::as_str).collect();
        return workspace.files(&paths);
    }

    let query = research_query(request);
    let terms = query.terms();
    let mut scored: Vec<(usize, WorkspaceFile)> = workspace
        .scan(&query.constraints)
        .into_iter()
        .filter(|f| f.is_code() || f.is_doc())
        .filter_map(|f| {
            let content = f.read()?.to_lowercase();
            let (_, hits) = term_hits(&content, &terms);
            (hits > 0).then_some((hits, f))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.path.cmp(&b.1.path)));
    scored
        .into_iter()
        .take(query.max_files())
        .map(|(_, f)| f)
        .collect()
}
