//! Run Plan use case.
//!
//! Validates a plan, resolves its execution order and drives every task
//! through the [`TaskExecutor`] one at a time. Quality gates run afterwards
//! when every task completed.

use crate::config::ExecutionParams;
use crate::ports::agent::AgentRegistry;
use crate::ports::command_runner::CommandRunner;
use crate::ports::progress::ExecutionProgressNotifier;
use crate::use_cases::execute_task::{ExecuteTaskError, TaskExecutor};
use crate::use_cases::run_quality_gates::QualityGateRunner;
use crate::use_cases::shared::is_cancelled;
use chrono::Utc;
use conductor_domain::{
    DependencyResolver, DomainError, ExecutionReport, Plan, QualityGate, RunInfo, TaskErrorKind,
    TaskId, TaskResult, validate_plan,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors that stop a plan before it produces a report.
#[derive(Error, Debug)]
pub enum RunPlanError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("Plan execution cancelled")]
    Cancelled,

    #[error(transparent)]
    Execution(#[from] ExecuteTaskError),
}

/// Input for one plan run.
#[derive(Debug, Clone)]
pub struct RunPlanInput {
    pub plan: Plan,
    /// Gates to run instead of the plan's own
    pub gates: Option<Vec<QualityGate>>,
}

impl RunPlanInput {
    pub fn new(plan: Plan) -> Self {
        Self { plan, gates: None }
    }

    pub fn with_gates(mut self, gates: Vec<QualityGate>) -> Self {
        self.gates = Some(gates);
        self
    }

    fn gates(&self) -> Option<&[QualityGate]> {
        self.gates
            .as_deref()
            .or(self.plan.quality_gates.as_deref())
    }
}

/// Use case for executing a whole plan.
pub struct PlanRunner<R: CommandRunner> {
    executor: TaskExecutor<R>,
    gates: QualityGateRunner<R>,
    params: ExecutionParams,
    cancellation_token: Option<CancellationToken>,
}

impl<R: CommandRunner + 'static> PlanRunner<R> {
    pub fn new(runner: Arc<R>, agents: Arc<AgentRegistry>, params: ExecutionParams) -> Self {
        Self {
            executor: TaskExecutor::new(Arc::clone(&runner), agents, params.clone()),
            gates: QualityGateRunner::new(runner, params.clone()),
            params,
            cancellation_token: None,
        }
    }

    /// Share a cancellation token with the executor and the gate runner.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(token.clone());
        self.gates = self.gates.with_cancellation(token.clone());
        self.cancellation_token = Some(token);
        self
    }

    pub async fn execute_plan(
        &self,
        input: RunPlanInput,
        progress: &dyn ExecutionProgressNotifier,
    ) -> Result<ExecutionReport, RunPlanError> {
        if is_cancelled(&self.cancellation_token) {
            return Err(RunPlanError::Cancelled);
        }

        let plan = &input.plan;
        let validation = validate_plan(plan);
        for issue in validation.warnings() {
            warn!("{}", issue);
        }
        if validation.has_errors() {
            let errors = validation.errors().cloned().collect();
            return Err(DomainError::Validation(errors).into());
        }

        let tasks = plan.tasks_in_order();
        let order = DependencyResolver::resolve(&tasks)?;
        let total = order.len();
        let started_at = Utc::now();

        info!(
            "Executing plan {} ({} tasks{})",
            plan.id,
            total,
            if self.params.dry_run { ", dry-run" } else { "" }
        );
        progress.on_plan_start(plan, total);

        let mut results: HashMap<TaskId, TaskResult> = HashMap::with_capacity(total);
        let mut ordered = Vec::with_capacity(total);
        let mut cancelled = false;

        for (index, task) in order.into_iter().enumerate() {
            if is_cancelled(&self.cancellation_token) {
                cancelled = true;
                break;
            }

            progress.on_task_start(task, index, total);
            let result = self.executor.execute_task(task, &results, progress).await?;
            progress.on_task_complete(task, &result);

            let halt = result.is_failed() && !self.params.continue_on_error;
            if result
                .error
                .as_ref()
                .is_some_and(|e| e.kind == TaskErrorKind::Cancelled)
            {
                cancelled = true;
            }
            results.insert(task.id.clone(), result.clone());
            ordered.push(result);

            if cancelled {
                warn!("Plan {} cancelled during task {}", plan.id, task.id);
                break;
            }
            if halt {
                warn!("Task {} failed; halting plan {}", task.id, plan.id);
                break;
            }
        }

        let all_completed = ordered.len() == total && ordered.iter().all(|r| r.is_completed());
        let gate_report = match input.gates() {
            Some(gates) if !cancelled && all_completed => {
                Some(self.gates.execute_quality_gates(gates, progress).await)
            }
            Some(_) if !cancelled => {
                info!("Skipping quality gates: not every task completed");
                None
            }
            _ => None,
        };

        let report = ExecutionReport::build(
            plan,
            ordered,
            gate_report,
            RunInfo {
                started_at,
                finished_at: Utc::now(),
                dry_run: self.params.dry_run,
                continue_on_error: self.params.continue_on_error,
                cancelled,
            },
        );
        info!(
            "Plan {} finished: {} ({} completed, {} failed, {} skipped)",
            plan.id,
            report.status,
            report.summary.completed,
            report.summary.failed,
            report.summary.skipped
        );
        progress.on_plan_complete(&report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::progress::NoProgress;
    use crate::use_cases::test_support::{Reply, ScriptedRunner};
    use conductor_domain::{GateType, RunStatus, Task, TaskStatus};
    use std::sync::Mutex;
    use std::time::Duration;

    fn abc_plan() -> Plan {
        Plan::new("abc", "A-B-C")
            .with_task(Task::new("A", "A").with_command("a"))
            .with_task(Task::new("B", "B").with_command("b").with_dependency("A"))
            .with_task(Task::new("C", "C").with_command("c").with_dependency("B"))
    }

    fn failing_b() -> Arc<ScriptedRunner> {
        Arc::new(ScriptedRunner::new().script("b", vec![Reply::Exit(1, "b broke")]))
    }

    fn plan_runner(runner: Arc<ScriptedRunner>, params: ExecutionParams) -> PlanRunner<ScriptedRunner> {
        PlanRunner::new(runner, Arc::new(AgentRegistry::new()), params)
    }

    fn status_of(report: &ExecutionReport, id: &str) -> Option<TaskStatus> {
        report
            .task_results
            .iter()
            .find(|r| r.task_id.as_str() == id)
            .map(|r| r.status)
    }

    #[tokio::test]
    async fn test_halts_at_first_failure() {
        let runner = failing_b();
        let plans = plan_runner(Arc::clone(&runner), ExecutionParams::default());

        let report = plans
            .execute_plan(RunPlanInput::new(abc_plan()), &NoProgress)
            .await
            .unwrap();

        assert_eq!(status_of(&report, "A"), Some(TaskStatus::Completed));
        assert_eq!(status_of(&report, "B"), Some(TaskStatus::Failed));
        assert_eq!(status_of(&report, "C"), None);
        assert_eq!(report.summary.not_run, 1);
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(runner.calls(), vec!["a", "b"]);

        let failure = report.first_failure.unwrap();
        assert_eq!(failure.id, "B");
        assert_eq!(failure.command.as_deref(), Some("b"));
        assert_eq!(failure.output, "b broke");
    }

    #[tokio::test]
    async fn test_continue_on_error_skips_dependents() {
        let runner = failing_b();
        let plans = plan_runner(
            Arc::clone(&runner),
            ExecutionParams::default().with_continue_on_error(true),
        );

        let report = plans
            .execute_plan(RunPlanInput::new(abc_plan()), &NoProgress)
            .await
            .unwrap();

        assert_eq!(status_of(&report, "A"), Some(TaskStatus::Completed));
        assert_eq!(status_of(&report, "B"), Some(TaskStatus::Failed));
        assert_eq!(status_of(&report, "C"), Some(TaskStatus::Skipped));
        assert_eq!(runner.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_skip_cascade_is_transitive_and_independents_still_run() {
        let plan = Plan::new("p", "Cascade")
            .with_task(Task::new("A", "A").with_command("fail"))
            .with_task(Task::new("B", "B").with_command("b").with_dependency("A"))
            .with_task(Task::new("C", "C").with_command("c").with_dependency("B"))
            .with_task(Task::new("D", "D").with_command("d"));
        let runner = Arc::new(ScriptedRunner::new().script("fail", vec![Reply::Exit(2, "")]));
        let plans = plan_runner(
            Arc::clone(&runner),
            ExecutionParams::default().with_continue_on_error(true),
        );

        let report = plans.execute_plan(RunPlanInput::new(plan), &NoProgress).await.unwrap();

        assert_eq!(status_of(&report, "B"), Some(TaskStatus::Skipped));
        assert_eq!(status_of(&report, "C"), Some(TaskStatus::Skipped));
        assert_eq!(status_of(&report, "D"), Some(TaskStatus::Completed));
        assert_eq!(runner.calls(), vec!["fail", "d"]);
        assert_eq!(report.summary.skipped, 2);
    }

    #[tokio::test]
    async fn test_results_follow_dependency_order() {
        let plan = Plan::new("p", "Reversed")
            .with_task(Task::new("deploy", "Deploy").with_command("deploy").with_dependency("build"))
            .with_task(Task::new("build", "Build").with_command("build"));
        let runner = Arc::new(ScriptedRunner::new());
        let plans = plan_runner(Arc::clone(&runner), ExecutionParams::default());

        let report = plans.execute_plan(RunPlanInput::new(plan), &NoProgress).await.unwrap();

        assert!(report.passed());
        assert_eq!(runner.calls(), vec!["build", "deploy"]);
    }

    #[tokio::test]
    async fn test_cycle_fails_before_any_execution() {
        let plan = Plan::new("p", "Cycle")
            .with_task(Task::new("A", "A").with_command("a").with_dependency("B"))
            .with_task(Task::new("B", "B").with_command("b").with_dependency("A"));
        let runner = Arc::new(ScriptedRunner::new());
        let plans = plan_runner(Arc::clone(&runner), ExecutionParams::default());

        let err = plans
            .execute_plan(RunPlanInput::new(plan), &NoProgress)
            .await
            .unwrap_err();

        match err {
            RunPlanError::Validation(e) => assert!(e.is_validation()),
            other => panic!("unexpected error: {other}"),
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_gates_run_only_after_all_tasks_complete() {
        let gates = vec![QualityGate::new("lint", "Lint", GateType::Lint, "lint")];

        let runner = Arc::new(ScriptedRunner::new());
        let report = plan_runner(Arc::clone(&runner), ExecutionParams::default())
            .execute_plan(
                RunPlanInput::new(Plan::new("ok", "Ok").with_task(Task::new("A", "A").with_command("a")))
                    .with_gates(gates.clone()),
                &NoProgress,
            )
            .await
            .unwrap();
        assert!(report.gate_report.as_ref().is_some_and(|g| g.passed()));
        assert_eq!(runner.calls(), vec!["a", "lint"]);

        let runner = failing_b();
        let report = plan_runner(
            Arc::clone(&runner),
            ExecutionParams::default().with_continue_on_error(true),
        )
        .execute_plan(RunPlanInput::new(abc_plan().with_gates(gates)), &NoProgress)
        .await
        .unwrap();
        assert!(report.gate_report.is_none());
        assert!(!runner.calls().contains(&"lint".to_string()));
    }

    #[tokio::test]
    async fn test_failed_gate_fails_the_run() {
        let runner = Arc::new(ScriptedRunner::new().script("lint", vec![Reply::Exit(1, "")]));
        let plan = Plan::new("p", "P")
            .with_task(Task::new("A", "A").with_command("a"))
            .with_gates(vec![QualityGate::new("lint", "Lint", GateType::Lint, "lint")]);

        let report = plan_runner(runner, ExecutionParams::default())
            .execute_plan(RunPlanInput::new(plan), &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.summary.gates_failed, 1);
        assert_eq!(report.first_failure.unwrap().id, "lint");
    }

    #[tokio::test]
    async fn test_dry_run_plan_completes_without_side_effects() {
        let runner = failing_b();
        let report = plan_runner(
            Arc::clone(&runner),
            ExecutionParams::default().with_dry_run(true),
        )
        .execute_plan(RunPlanInput::new(abc_plan()), &NoProgress)
        .await
        .unwrap();

        assert!(report.passed());
        assert!(report.dry_run);
        assert!(report.task_results.iter().all(|r| r.duration_ms == 0));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_mid_run_reports_cancelled() {
        let token = CancellationToken::new();
        let runner = Arc::new(ScriptedRunner::new().with_delay(Duration::from_secs(10)));
        let plans = plan_runner(Arc::clone(&runner), ExecutionParams::default())
            .with_cancellation(token.clone());

        let (report, _) = tokio::join!(
            plans.execute_plan(RunPlanInput::new(abc_plan()), &NoProgress),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            }
        );

        let report = report.unwrap();
        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.exit_code(), 130);
        assert_eq!(report.task_results.len(), 1);
        assert_eq!(runner.calls(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let plans = plan_runner(Arc::new(ScriptedRunner::new()), ExecutionParams::default())
            .with_cancellation(token);

        let err = plans
            .execute_plan(RunPlanInput::new(abc_plan()), &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, RunPlanError::Cancelled));
    }

    #[tokio::test]
    async fn test_progress_sees_every_task() {
        #[derive(Default)]
        struct Recorder(Mutex<Vec<String>>);

        impl ExecutionProgressNotifier for Recorder {
            fn on_task_start(&self, task: &Task, index: usize, total: usize) {
                self.0
                    .lock()
                    .unwrap()
                    .push(format!("start {} {}/{}", task.id, index + 1, total));
            }
            fn on_task_complete(&self, task: &Task, result: &TaskResult) {
                self.0
                    .lock()
                    .unwrap()
                    .push(format!("done {} {}", task.id, result.status));
            }
        }

        let recorder = Recorder::default();
        plan_runner(failing_b(), ExecutionParams::default())
            .execute_plan(RunPlanInput::new(abc_plan()), &recorder)
            .await
            .unwrap();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                "start A 1/3",
                "done A completed",
                "start B 2/3",
                "done B failed",
            ]
        );
    }
}
