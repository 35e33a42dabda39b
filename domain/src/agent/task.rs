//! Agent tasks and their results

use super::types::AgentType;
use crate::aggregation::{ConfidenceLevel, Finding};
use crate::core::error::TaskError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a set of agent tasks is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// All ready tasks run concurrently under the concurrency limit
    #[default]
    Parallel,
    /// One task at a time; each sees the results that came before it
    Sequential,
}

impl ExecutionStrategy {
    pub fn as_str(&self) -> &str {
        match self {
            ExecutionStrategy::Parallel => "parallel",
            ExecutionStrategy::Sequential => "sequential",
        }
    }
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input handed to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AgentInput {
    #[serde(default)]
    pub context: Value,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl AgentInput {
    pub fn new(context: Value) -> Self {
        Self {
            context,
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// One unit of agent work within a coordination call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: String,
    pub agent_type: AgentType,
    #[serde(default)]
    pub input: AgentInput,
    /// A `Sequential` task inside a parallel call runs alone, after the
    /// parallel tasks of its dependency wave, and sees their results.
    #[serde(default)]
    pub strategy: ExecutionStrategy,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl AgentTask {
    pub fn new(id: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            id: id.into(),
            agent_type,
            input: AgentInput::default(),
            strategy: ExecutionStrategy::Parallel,
            dependencies: Vec::new(),
            timeout_secs: None,
        }
    }

    pub fn with_input(mut self, input: AgentInput) -> Self {
        self.input = input;
        self
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// What an agent hands back through the uniform contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub success: bool,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub findings: Vec<Finding>,
    pub confidence: ConfidenceLevel,
    #[serde(default)]
    pub reasoning: String,
}

impl AgentOutput {
    pub fn success(payload: Value, confidence: ConfidenceLevel) -> Self {
        Self {
            success: true,
            payload,
            findings: Vec::new(),
            confidence,
            reasoning: String::new(),
        }
    }

    pub fn failure(reasoning: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Value::Null,
            findings: Vec::new(),
            confidence: ConfidenceLevel::Low,
            reasoning: reasoning.into(),
        }
    }

    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings = findings;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }
}

/// Lifecycle of one agent task.
///
/// `Timeout` is a terminal state distinct from `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Skipped,
}

impl AgentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AgentStatus::Pending => "pending",
            AgentStatus::Running => "running",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
            AgentStatus::Timeout => "timeout",
            AgentStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AgentStatus::Pending | AgentStatus::Running)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one agent task within a coordination call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTaskResult {
    pub task_id: String,
    pub agent_type: AgentType,
    pub status: AgentStatus,
    pub success: bool,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub findings: Vec<Finding>,
    pub confidence: Option<ConfidenceLevel>,
    #[serde(default)]
    pub reasoning: String,
    pub duration_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<TaskError>,
}

impl AgentTaskResult {
    fn blank(task: &AgentTask, status: AgentStatus) -> Self {
        Self {
            task_id: task.id.clone(),
            agent_type: task.agent_type,
            status,
            success: false,
            payload: Value::Null,
            findings: Vec::new(),
            confidence: None,
            reasoning: String::new(),
            duration_ms: 0,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    /// Result from an agent that returned. An output with `success == false`
    /// becomes a failed result.
    pub fn from_output(task: &AgentTask, output: AgentOutput) -> Self {
        let status = if output.success {
            AgentStatus::Completed
        } else {
            AgentStatus::Failed
        };
        let error = (!output.success).then(|| {
            let reason = if output.reasoning.is_empty() {
                "agent reported failure".to_string()
            } else {
                output.reasoning.clone()
            };
            TaskError::execution(reason)
        });
        Self {
            success: output.success,
            payload: output.payload,
            findings: output.findings,
            confidence: Some(output.confidence),
            reasoning: output.reasoning,
            error,
            ..Self::blank(task, status)
        }
    }

    pub fn failed(task: &AgentTask, error: TaskError) -> Self {
        let status = if error.is_timeout() {
            AgentStatus::Timeout
        } else {
            AgentStatus::Failed
        };
        Self {
            error: Some(error),
            ..Self::blank(task, status)
        }
    }

    pub fn timed_out(task: &AgentTask, after_secs: u64) -> Self {
        Self::failed(
            task,
            TaskError::timeout(format!("agent did not finish within {}s", after_secs)),
        )
    }

    pub fn skipped(task: &AgentTask, reason: impl Into<String>) -> Self {
        Self {
            error: Some(TaskError::dependency_unsatisfied(reason)),
            ..Self::blank(task, AgentStatus::Skipped)
        }
    }

    pub fn with_timing(
        mut self,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        self.started_at = Some(started_at);
        self.finished_at = Some(finished_at);
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == AgentStatus::Completed && self.success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unsuccessful_output_is_failed() {
        let task = AgentTask::new("a", AgentType::CodeLocator);
        let result = AgentTaskResult::from_output(&task, AgentOutput::failure("no index"));
        assert_eq!(result.status, AgentStatus::Failed);
        assert!(!result.is_success());
        assert_eq!(result.error_message(), Some("no index"));
    }

    #[test]
    fn test_timeout_is_distinct_status() {
        let task = AgentTask::new("a", AgentType::PatternFinder);
        let result = AgentTaskResult::timed_out(&task, 5);
        assert_eq!(result.status, AgentStatus::Timeout);
        assert!(result.status.is_terminal());
    }

    #[test]
    fn test_success_keeps_payload() {
        let task = AgentTask::new("a", AgentType::CodeLocator);
        let output = AgentOutput::success(json!({"files": []}), ConfidenceLevel::High);
        let result = AgentTaskResult::from_output(&task, output);
        assert!(result.is_success());
        assert_eq!(result.confidence, Some(ConfidenceLevel::High));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_agent_task_deserializes_with_defaults() {
        let task: AgentTask =
            serde_json::from_value(json!({"id": "t1", "agent_type": "pattern-finder"})).unwrap();
        assert_eq!(task.strategy, ExecutionStrategy::Parallel);
        assert!(task.dependencies.is_empty());
        assert!(task.timeout_secs.is_none());
    }
}
