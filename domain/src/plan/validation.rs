//! Structural validation of plans.
//!
//! Validation runs before any execution begins. Issues carry a severity:
//! errors block execution, warnings are reported but never block.
//!
//! # Examples
//!
//! ```
//! use conductor_domain::plan::{Plan, Task, validate_plan};
//!
//! let plan = Plan::new("p", "Plan")
//!     .with_task(Task::new("a", "A").with_command("true"))
//!     .with_task(Task::new("b", "B").with_command("true").with_dependency("a"));
//! let report = validate_plan(&plan);
//! assert!(!report.has_errors());
//! ```

use super::entities::Plan;
use super::resolver::DependencyResolver;
use super::task::TaskAction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Severity level of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fatal: the plan cannot run.
    Error,
    /// Non-fatal: the plan runs but is incomplete.
    Warning,
}

/// Identifies a specific validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    MissingPlanId,
    EmptyPlan,
    MissingTaskId,
    MissingTitle,
    DuplicateTaskId,
    MissingDependency,
    CircularDependency,
    InvalidRetryPolicy,
    ZeroTimeout,
    DuplicateGateId,
    EmptyGateCommand,
    MissingAcceptanceCriteria,
    MissingTimeEstimate,
    NoAction,
}

/// A detected issue in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub task_id: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(code: IssueCode, task_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            task_id: task_id.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn warning(code: IssueCode, task_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            task_id: task_id.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.task_id {
            Some(id) => write!(f, "[{}] {}", id, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Collected validation issues for one plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.is_error())
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| !i.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }
}

/// Validate a plan's structure.
///
/// Checks required fields, id uniqueness, dependency resolvability, cycles
/// (naming every task in any cycle), retry/timeout sanity and gate ids.
/// Missing acceptance criteria, time estimates and actions are warnings.
pub fn validate_plan(plan: &Plan) -> ValidationReport {
    let mut issues = Vec::new();
    let tasks = plan.all_tasks();

    if plan.id.trim().is_empty() {
        issues.push(ValidationIssue::error(
            IssueCode::MissingPlanId,
            None,
            "Plan is missing an id",
        ));
    }

    if tasks.is_empty() {
        issues.push(ValidationIssue::warning(
            IssueCode::EmptyPlan,
            None,
            "Plan declares no tasks",
        ));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for task in &tasks {
        let id = task.id.as_str();

        if task.id.is_empty() {
            issues.push(ValidationIssue::error(
                IssueCode::MissingTaskId,
                None,
                format!("Task '{}' is missing an id", task.title),
            ));
            continue;
        }

        if !seen.insert(id) {
            issues.push(ValidationIssue::error(
                IssueCode::DuplicateTaskId,
                Some(id),
                format!("Duplicate task id '{}'", id),
            ));
        }

        if task.title.trim().is_empty() {
            issues.push(ValidationIssue::error(
                IssueCode::MissingTitle,
                Some(id),
                format!("Task '{}' is missing a title", id),
            ));
        }

        if let Some(retry) = task.retry.as_ref().filter(|r| !r.is_valid()) {
            issues.push(ValidationIssue::error(
                IssueCode::InvalidRetryPolicy,
                Some(id),
                format!(
                    "Task '{}' has an invalid retry policy (max_attempts={}, backoff_multiplier={})",
                    id, retry.max_attempts, retry.backoff_multiplier
                ),
            ));
        }

        if task.timeout_secs == Some(0) {
            issues.push(ValidationIssue::error(
                IssueCode::ZeroTimeout,
                Some(id),
                format!("Task '{}' has a zero timeout", id),
            ));
        }

        if task.acceptance_criteria.is_empty() {
            issues.push(ValidationIssue::warning(
                IssueCode::MissingAcceptanceCriteria,
                Some(id),
                format!("Task '{}' has no acceptance criteria", id),
            ));
        }

        if task.estimated_time.as_deref().is_none_or(|t| t.trim().is_empty()) {
            issues.push(ValidationIssue::warning(
                IssueCode::MissingTimeEstimate,
                Some(id),
                format!("Task '{}' has no time estimate", id),
            ));
        }

        if task.action() == TaskAction::None {
            issues.push(ValidationIssue::warning(
                IssueCode::NoAction,
                Some(id),
                format!("Task '{}' has no command or agent; it will complete as a no-op", id),
            ));
        }
    }

    let known: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    for task in &tasks {
        for dep in &task.dependencies {
            if !known.contains(dep.as_str()) {
                issues.push(ValidationIssue::error(
                    IssueCode::MissingDependency,
                    Some(task.id.as_str()),
                    format!(
                        "Task '{}' depends on unknown task '{}'",
                        task.id, dep
                    ),
                ));
            }
        }
    }

    let cycle = DependencyResolver::find_cycle_members(&tasks);
    if !cycle.is_empty() {
        issues.push(ValidationIssue::error(
            IssueCode::CircularDependency,
            None,
            format!(
                "Circular dependency detected involving tasks: {}",
                cycle.join(", ")
            ),
        ));
    }

    if let Some(gates) = &plan.quality_gates {
        let mut gate_ids = HashSet::new();
        for gate in gates {
            if !gate_ids.insert(gate.id.as_str()) {
                issues.push(ValidationIssue::error(
                    IssueCode::DuplicateGateId,
                    None,
                    format!("Duplicate quality gate id '{}'", gate.id),
                ));
            }
            if gate.command.trim().is_empty() {
                issues.push(ValidationIssue::error(
                    IssueCode::EmptyGateCommand,
                    None,
                    format!("Quality gate '{}' has an empty command", gate.id),
                ));
            }
        }
    }

    ValidationReport { issues }
}
