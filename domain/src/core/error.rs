//! Domain error types
//!
//! Two families live here:
//!
//! - [`DomainError`]: fatal problems raised *before* or *instead of* work,
//!   such as a malformed plan or an aggregation with nothing usable.
//! - [`TaskError`]: failures that happened *during* work. These are recorded
//!   inside results and never propagated as `Err`.

use crate::plan::validation::ValidationIssue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Plan validation failed: {}", summarize_issues(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("Circular dependency detected involving tasks: {}", .0.join(", "))]
    CircularDependency(Vec<String>),

    #[error("All {0} participating agents failed; nothing to aggregate")]
    AllAgentsFailed(usize),

    #[error("No agent results to aggregate")]
    NothingToAggregate,

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }

    /// Check if this error was raised by plan validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DomainError::Validation(_) | DomainError::CircularDependency(_)
        )
    }
}

fn summarize_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Category of a failure recorded inside a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// The action ran and reported failure (non-zero exit, agent failure).
    Execution,
    /// The action exceeded its time allotment and was terminated.
    Timeout,
    /// A dependency failed or was skipped; the action was never attempted.
    DependencyUnsatisfied,
    /// The action could not be started at all.
    Spawn,
    /// The run was cancelled before or while this action ran.
    Cancelled,
}

impl TaskErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            TaskErrorKind::Execution => "execution",
            TaskErrorKind::Timeout => "timeout",
            TaskErrorKind::DependencyUnsatisfied => "dependency_unsatisfied",
            TaskErrorKind::Spawn => "spawn",
            TaskErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failure captured into a result rather than thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: TaskErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: TaskErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::Execution, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::Timeout, message)
    }

    pub fn dependency_unsatisfied(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::DependencyUnsatisfied, message)
    }

    pub fn spawn(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::Spawn, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::Cancelled, message)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TaskErrorKind::Timeout
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_error_display() {
        let error = DomainError::Cancelled;
        assert_eq!(error.to_string(), "Operation cancelled");
        assert!(error.is_cancelled());
    }

    #[test]
    fn test_circular_dependency_lists_every_task() {
        let error = DomainError::CircularDependency(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(
            error.to_string(),
            "Circular dependency detected involving tasks: a, b, c"
        );
        assert!(error.is_validation());
    }

    #[test]
    fn test_task_error_display() {
        let err = TaskError::timeout("exceeded 5s");
        assert_eq!(err.to_string(), "[timeout] exceeded 5s");
        assert!(err.is_timeout());
        assert!(!TaskError::execution("exit 1").is_timeout());
    }

    #[test]
    fn test_task_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&TaskErrorKind::DependencyUnsatisfied).unwrap();
        assert_eq!(json, "\"dependency_unsatisfied\"");
    }
}
