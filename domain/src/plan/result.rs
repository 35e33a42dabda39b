//! Task execution results

use super::task::TaskId;
use crate::core::error::{TaskError, TaskErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a task within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Not started yet
    #[default]
    Pending,
    /// Currently executing
    Running,
    /// Finished successfully
    Completed,
    /// Ran and failed (all attempts exhausted)
    Failed,
    /// Never attempted because a dependency was not satisfied
    Skipped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of executing one task.
///
/// Exactly one result exists per executed task per run. It is written once
/// by the executor when the task reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// Process exit code; `None` for skipped tasks, agents and killed processes
    pub exit_code: Option<i32>,
    /// Captured output of the last attempt
    pub output: String,
    /// Wall-clock duration across all attempts, including retry delays
    pub duration_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Number of attempts actually made
    pub attempts: u32,
    pub error: Option<TaskError>,
}

impl TaskResult {
    fn base(task_id: TaskId, status: TaskStatus) -> Self {
        Self {
            task_id,
            status,
            exit_code: None,
            output: String::new(),
            duration_ms: 0,
            started_at: None,
            finished_at: None,
            attempts: 0,
            error: None,
        }
    }

    /// A successful result.
    pub fn completed(task_id: impl Into<TaskId>, output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit_code: Some(0),
            ..Self::base(task_id.into(), TaskStatus::Completed)
        }
    }

    /// A failed result with the captured error.
    pub fn failed(task_id: impl Into<TaskId>, error: TaskError) -> Self {
        Self {
            error: Some(error),
            ..Self::base(task_id.into(), TaskStatus::Failed)
        }
    }

    /// A task that was never attempted because a dependency was unsatisfied.
    pub fn skipped(task_id: impl Into<TaskId>, reason: impl Into<String>) -> Self {
        Self {
            error: Some(TaskError::dependency_unsatisfied(reason)),
            ..Self::base(task_id.into(), TaskStatus::Skipped)
        }
    }

    /// A synthetic dry-run result: completed with zero duration.
    pub fn dry_run(task_id: impl Into<TaskId>, description: &str) -> Self {
        let now = Utc::now();
        Self {
            output: format!("[dry-run] would {}", description),
            started_at: Some(now),
            finished_at: Some(now),
            ..Self::base(task_id.into(), TaskStatus::Completed)
        }
    }

    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
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

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }

    pub fn is_skipped(&self) -> bool {
        self.status == TaskStatus::Skipped
    }

    pub fn timed_out(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| e.kind == TaskErrorKind::Timeout)
    }

    /// Error message, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Skipped.is_terminal());
    }

    #[test]
    fn test_skipped_records_dependency_error() {
        let result = TaskResult::skipped("c", "dependency b failed");
        assert!(result.is_skipped());
        assert_eq!(
            result.error.as_ref().map(|e| e.kind),
            Some(TaskErrorKind::DependencyUnsatisfied)
        );
        assert_eq!(result.attempts, 0);
    }

    #[test]
    fn test_dry_run_is_completed_with_zero_duration() {
        let result = TaskResult::dry_run("a", "run command `make`");
        assert!(result.is_completed());
        assert_eq!(result.duration_ms, 0);
        assert!(result.output.contains("make"));
        assert_eq!(result.exit_code, None);
    }

    #[test]
    fn test_timed_out() {
        let result = TaskResult::failed("a", TaskError::timeout("too slow"));
        assert!(result.timed_out());
        assert!(!TaskResult::completed("a", "").timed_out());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&TaskStatus::Skipped).unwrap();
        assert_eq!(json, "\"skipped\"");
    }
}
