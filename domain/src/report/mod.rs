//! Execution report
//!
//! The persisted artifact of one plan run. It is serialised as JSON and must
//! round-trip so a saved report can be displayed or re-exported later.

use crate::core::string::tail;
use crate::gate::{GateStatus, QualityGateReport};
use crate::plan::{Plan, TaskAction, TaskResult, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bytes of captured output kept in the failure detail.
const FAILURE_OUTPUT_TAIL: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Passed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReportSummary {
    pub total_tasks: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Tasks with no result because the run halted first
    pub not_run: usize,
    pub gates_passed: usize,
    pub gates_failed: usize,
    pub gates_skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureSource {
    Task,
    Gate,
}

/// The first blocking error of a run, with enough context to diagnose it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub source: FailureSource,
    pub id: String,
    pub command: Option<String>,
    pub error: String,
    /// Tail of the captured output
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub plan_id: String,
    pub plan_title: String,
    pub status: RunStatus,
    pub dry_run: bool,
    pub continue_on_error: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// In execution order
    pub task_results: Vec<TaskResult>,
    pub gate_report: Option<QualityGateReport>,
    pub summary: ReportSummary,
    pub first_failure: Option<FailureDetail>,
}

/// Run-level facts that are not derivable from the results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunInfo {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub continue_on_error: bool,
    pub cancelled: bool,
}

impl ExecutionReport {
    pub fn build(
        plan: &Plan,
        task_results: Vec<TaskResult>,
        gate_report: Option<QualityGateReport>,
        info: RunInfo,
    ) -> Self {
        let count = |status: TaskStatus| task_results.iter().filter(|r| r.status == status).count();
        let gate_count = |status: GateStatus| gate_report.as_ref().map_or(0, |g| g.count(status));

        let summary = ReportSummary {
            total_tasks: plan.task_count(),
            completed: count(TaskStatus::Completed),
            failed: count(TaskStatus::Failed),
            skipped: count(TaskStatus::Skipped),
            not_run: plan.task_count().saturating_sub(task_results.len()),
            gates_passed: gate_count(GateStatus::Passed),
            gates_failed: gate_count(GateStatus::Failed),
            gates_skipped: gate_count(GateStatus::Skipped),
        };

        let first_failure = first_task_failure(plan, &task_results)
            .or_else(|| gate_report.as_ref().and_then(first_gate_failure));

        let all_tasks_passed = summary.completed == summary.total_tasks;
        let gates_passed = gate_report.as_ref().is_none_or(|g| g.passed());
        let status = if info.cancelled {
            RunStatus::Cancelled
        } else if all_tasks_passed && gates_passed {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };

        let duration_ms = (info.finished_at - info.started_at)
            .num_milliseconds()
            .max(0) as u64;

        Self {
            plan_id: plan.id.clone(),
            plan_title: plan.display_title().to_string(),
            status,
            dry_run: info.dry_run,
            continue_on_error: info.continue_on_error,
            started_at: info.started_at,
            finished_at: info.finished_at,
            duration_ms,
            task_results,
            gate_report,
            summary,
            first_failure,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == RunStatus::Passed
    }

    /// Process exit code: 0 iff every executed task and gate passed.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Passed => 0,
            RunStatus::Failed => 1,
            RunStatus::Cancelled => 130,
        }
    }
}

fn first_task_failure(plan: &Plan, results: &[TaskResult]) -> Option<FailureDetail> {
    let failed = results.iter().find(|r| r.is_failed())?;
    let command = plan.task(&failed.task_id).and_then(|t| match t.action() {
        TaskAction::Command(cmd) => Some(cmd.to_string()),
        TaskAction::Agent(agent) => Some(format!("agent {}", agent.agent_type)),
        TaskAction::None => None,
    });
    Some(FailureDetail {
        source: FailureSource::Task,
        id: failed.task_id.to_string(),
        command,
        error: failed.error_message().unwrap_or("failed").to_string(),
        output: tail(&failed.output, FAILURE_OUTPUT_TAIL).to_string(),
    })
}

fn first_gate_failure(report: &QualityGateReport) -> Option<FailureDetail> {
    let gate = report.first_failure()?;
    Some(FailureDetail {
        source: FailureSource::Gate,
        id: gate.gate_id.clone(),
        command: Some(gate.command.clone()),
        error: gate
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "gate failed".to_string()),
        output: tail(&gate.output, FAILURE_OUTPUT_TAIL).to_string(),
    })
}
