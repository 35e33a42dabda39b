use crate::agent::{AgentTaskResult, AgentType};
use crate::aggregation::ConfidenceLevel;
use serde::{Deserialize, Serialize};

/// Per-agent bookkeeping kept alongside a phase result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub task_id: String,
    pub agent_type: AgentType,
    pub success: bool,
    pub execution_time_ms: u64,
    pub confidence: Option<ConfidenceLevel>,
    pub items: usize,
    pub error: Option<String>,
}

impl SourceStats {
    pub fn from_result(result: &AgentTaskResult) -> Self {
        Self {
            task_id: result.task_id.clone(),
            agent_type: result.agent_type,
            success: result.is_success(),
            execution_time_ms: result.duration_ms,
            confidence: result.confidence.filter(|_| result.is_success()),
            items: 0,
            error: result.error_message().map(str::to_string),
        }
    }
}

/// One agent's output for a phase: its stats plus the decoded payload, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution<P> {
    pub stats: SourceStats,
    pub payload: Option<P>,
}

/// Mean confidence of successful sources scaled by their share of all sources.
pub(crate) fn phase_confidence(sources: &[SourceStats]) -> f64 {
    if sources.is_empty() {
        return 0.0;
    }
    let succeeded: Vec<ConfidenceLevel> = sources
        .iter()
        .filter(|s| s.success)
        .map(|s| s.confidence.unwrap_or(ConfidenceLevel::Low))
        .collect();
    let participation = succeeded.len() as f64 / sources.len() as f64;
    ConfidenceLevel::mean(succeeded).unwrap_or(0.0) * participation
}
