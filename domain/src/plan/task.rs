//! Task definition and retry policy

use crate::agent::AgentType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Unique identifier for a task within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rough size of a task, as declared in the plan document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[serde(alias = "simple")]
    Low,
    #[serde(alias = "moderate")]
    Medium,
    #[serde(alias = "complex")]
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

/// Retry discipline for a single task.
///
/// Attempt `n > 1` waits `base_delay × backoff_multiplier^(n-2)` before it
/// starts, so with the defaults the waits are 1s, 2s, 4s, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one (minimum 1)
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds
    pub base_delay_ms: u64,
    /// Growth factor applied to each further delay
    pub backoff_multiplier: f64,
    /// Whether a timed-out attempt may be retried
    pub retry_on_timeout: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            retry_on_timeout: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(max_attempts: u32, base_delay_ms: u64, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            backoff_multiplier,
            retry_on_timeout: false,
        }
    }

    pub fn with_retry_on_timeout(mut self) -> Self {
        self.retry_on_timeout = true;
        self
    }

    /// Number of attempts that will actually be made (never less than one).
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait before the given 1-indexed attempt.
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.powi(attempt as i32 - 2);
        let millis = self.base_delay_ms as f64 * factor;
        if !millis.is_finite() || millis < 0.0 {
            return Duration::from_millis(self.base_delay_ms);
        }
        Duration::from_millis(millis.round() as u64)
    }

    pub fn is_valid(&self) -> bool {
        self.max_attempts >= 1
            && self.backoff_multiplier.is_finite()
            && self.backoff_multiplier > 0.0
    }
}

/// Reference to an agent that performs a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRef {
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

/// What a task does when it runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskAction<'a> {
    /// Run a shell command
    Command(&'a str),
    /// Invoke an agent through the uniform agent contract
    Agent(&'a AgentRef),
    /// Nothing to run; the task completes immediately
    None,
}

impl TaskAction<'_> {
    /// Human-readable description used in dry-run output and reports.
    pub fn describe(&self) -> String {
        match self {
            TaskAction::Command(cmd) => format!("run command `{}`", cmd),
            TaskAction::Agent(agent) => format!("invoke agent `{}`", agent.agent_type),
            TaskAction::None => "no action".to_string(),
        }
    }
}

/// A single unit of work within a plan.
///
/// Tasks are immutable during a run; all mutable state lives in the
/// run-scoped [`TaskResult`](super::result::TaskResult) map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Tasks that must complete before this one
    #[serde(default, alias = "depends_on")]
    pub dependencies: Vec<TaskId>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    /// Free-form estimate such as "2h" or "30m"
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub complexity: Option<Complexity>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub agent: Option<AgentRef>,
    /// Task-specific retry policy; the run default applies when absent
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    /// Hard timeout; the executor default applies when absent
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            dependencies: Vec::new(),
            files: Vec::new(),
            acceptance_criteria: Vec::new(),
            estimated_time: None,
            complexity: None,
            command: None,
            agent: None,
            retry: None,
            timeout_secs: None,
            env: BTreeMap::new(),
            working_dir: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_agent(mut self, agent_type: AgentType) -> Self {
        self.agent = Some(AgentRef {
            agent_type,
            parameters: serde_json::Map::new(),
        });
        self
    }

    pub fn with_dependency(mut self, task_id: impl Into<TaskId>) -> Self {
        self.dependencies.push(task_id.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_acceptance_criterion(mut self, criterion: impl Into<String>) -> Self {
        self.acceptance_criteria.push(criterion.into());
        self
    }

    pub fn with_estimated_time(mut self, estimate: impl Into<String>) -> Self {
        self.estimated_time = Some(estimate.into());
        self
    }

    /// The action this task performs. A command takes precedence over an agent.
    pub fn action(&self) -> TaskAction<'_> {
        if let Some(cmd) = self.command.as_deref().filter(|c| !c.trim().is_empty()) {
            TaskAction::Command(cmd)
        } else if let Some(agent) = &self.agent {
            TaskAction::Agent(agent)
        } else {
            TaskAction::None
        }
    }

    /// Timeout for this task, falling back to the given default.
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(default)
    }

    /// Display label: the title when present, otherwise the id.
    pub fn label(&self) -> &str {
        if self.title.trim().is_empty() {
            self.id.as_str()
        } else {
            &self.title
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_progression() {
        let policy = RetryPolicy::new(4, 100, 2.0);
        assert_eq!(policy.delay_before_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_before_attempt(2), Duration::from_millis(100));
        assert_eq!(policy.delay_before_attempt(3), Duration::from_millis(200));
        assert_eq!(policy.delay_before_attempt(4), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_with_fractional_multiplier() {
        let policy = RetryPolicy::new(3, 1000, 1.5);
        assert_eq!(policy.delay_before_attempt(3), Duration::from_millis(1500));
    }

    #[test]
    fn test_attempts_never_zero() {
        let policy = RetryPolicy::new(0, 10, 2.0);
        assert_eq!(policy.attempts(), 1);
        assert!(!policy.is_valid());
    }

    #[test]
    fn test_action_precedence() {
        let task = Task::new("a", "A")
            .with_command("echo hi")
            .with_agent(AgentType::CodeLocator);
        assert_eq!(task.action(), TaskAction::Command("echo hi"));

        let agent_only = Task::new("b", "B").with_agent(AgentType::PatternFinder);
        assert!(matches!(agent_only.action(), TaskAction::Agent(_)));

        let blank = Task::new("c", "C").with_command("   ");
        assert_eq!(blank.action(), TaskAction::None);
    }

    #[test]
    fn test_task_deserializes_with_aliases() {
        let json = r#"{
            "id": "build",
            "name": "Build it",
            "depends_on": ["setup"],
            "command": "make",
            "complexity": "complex",
            "retry": { "max_attempts": 3 }
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.title, "Build it");
        assert_eq!(task.dependencies, vec![TaskId::from("setup")]);
        assert_eq!(task.complexity, Some(Complexity::High));
        let retry = task.retry.unwrap();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.base_delay_ms, 1000);
    }

    #[test]
    fn test_label_falls_back_to_id() {
        assert_eq!(Task::new("x", "").label(), "x");
        assert_eq!(Task::new("x", "Title").label(), "Title");
    }
}
