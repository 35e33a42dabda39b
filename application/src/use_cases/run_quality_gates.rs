//! Run Quality Gates use case.
//!
//! Gates always run in canonical priority order
//! (lint → types → tests → build → integration → deploy → custom),
//! whatever order they were declared in.

use crate::config::ExecutionParams;
use crate::ports::command_runner::{CommandRunner, CommandSpec};
use crate::ports::progress::ExecutionProgressNotifier;
use crate::use_cases::shared::{is_cancelled, millis, run_cancellable};
use chrono::Utc;
use conductor_domain::{
    FailurePolicy, GateResult, GateStatus, QualityGate, QualityGateReport, TaskError,
    evaluate_gate_output, sort_by_priority,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Use case for running the quality gate pipeline.
pub struct QualityGateRunner<R: CommandRunner> {
    runner: Arc<R>,
    params: ExecutionParams,
    cancellation_token: Option<CancellationToken>,
}

impl<R: CommandRunner + 'static> QualityGateRunner<R> {
    pub fn new(runner: Arc<R>, params: ExecutionParams) -> Self {
        Self {
            runner,
            params,
            cancellation_token: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Run one gate and evaluate its verdict.
    pub async fn execute_quality_gate(&self, gate: &QualityGate) -> GateResult {
        let started_at = Utc::now();

        if self.params.dry_run {
            let mut result = GateResult::new(gate, GateStatus::Passed);
            result.output = format!("[dry-run] would run `{}`", gate.command);
            result.started_at = Some(started_at);
            return result;
        }

        let spec = CommandSpec::new(&gate.command, Duration::from_secs(gate.timeout_secs))
            .with_working_dir(
                gate.working_dir
                    .clone()
                    .or_else(|| self.params.working_dir.clone()),
            )
            .with_env(gate.env.clone());

        let clock = Instant::now();
        let outcome = run_cancellable(&self.cancellation_token, self.runner.run(&spec)).await;

        let mut result = GateResult::new(gate, GateStatus::Failed);
        result.started_at = Some(started_at);
        result.duration_ms = millis(clock.elapsed());

        match outcome {
            None => result.error = Some(TaskError::cancelled("Run cancelled")),
            Some(Err(e)) => result.error = Some(TaskError::spawn(e.to_string())),
            Some(Ok(out)) if out.timed_out => {
                result.exit_code = out.exit_code;
                result.output = out.output;
                result.error = Some(TaskError::timeout(format!(
                    "Gate {} timed out after {}s",
                    gate.id, gate.timeout_secs
                )));
            }
            Some(Ok(out)) => {
                let verdict = evaluate_gate_output(gate.gate_type, out.exit_code, &out.output);
                result.exit_code = out.exit_code;
                result.output = out.output;
                if verdict.passed {
                    result.status = GateStatus::Passed;
                } else {
                    let reason = verdict.reason.unwrap_or_else(|| "gate failed".to_string());
                    result.error = Some(TaskError::execution(reason));
                }
            }
        }
        result
    }

    /// Run every gate in priority order.
    ///
    /// A failing required gate ends the pipeline. Optional failures are
    /// logged and the pipeline continues; optional `skip` gates are not run
    /// once anything has failed.
    pub async fn execute_quality_gates(
        &self,
        gates: &[QualityGate],
        progress: &dyn ExecutionProgressNotifier,
    ) -> QualityGateReport {
        let sorted = sort_by_priority(gates);
        let clock = Instant::now();
        info!("Running {} quality gate(s)", sorted.len());
        progress.on_gates_start(sorted.len());

        let mut results = Vec::with_capacity(sorted.len());
        let mut halted_by = None;
        let mut any_failed = false;

        for gate in &sorted {
            if is_cancelled(&self.cancellation_token) {
                warn!("Quality gates cancelled before {}", gate.id);
                break;
            }

            if any_failed && !gate.required && gate.failure_policy == FailurePolicy::Skip {
                debug!("Skipping gate {} after an earlier failure", gate.id);
                let result = GateResult::new(gate, GateStatus::Skipped);
                progress.on_gate_complete(&result);
                results.push(result);
                continue;
            }

            progress.on_gate_start(gate);
            let result = self.execute_quality_gate(gate).await;
            progress.on_gate_complete(&result);

            if result.passed() {
                info!("Gate {} passed in {}ms", gate.id, result.duration_ms);
                results.push(result);
                continue;
            }

            any_failed = true;
            let reason = result
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_default();
            results.push(result);

            if gate.halts_on_failure() {
                warn!("Gate {} failed ({}); halting remaining gates", gate.id, reason);
                halted_by = Some(gate.id.clone());
                break;
            }
            warn!("Optional gate {} failed ({}); continuing", gate.id, reason);
        }

        let report = QualityGateReport::from_results(results, halted_by, millis(clock.elapsed()));
        progress.on_gates_complete(&report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::progress::NoProgress;
    use crate::use_cases::test_support::{Reply, ScriptedRunner};
    use conductor_domain::{GateType, TaskErrorKind, default_gates};

    fn gate_runner(runner: ScriptedRunner) -> (Arc<ScriptedRunner>, QualityGateRunner<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let gates = QualityGateRunner::new(Arc::clone(&runner), ExecutionParams::default());
        (runner, gates)
    }

    #[tokio::test]
    async fn test_failing_required_lint_halts_default_pipeline() {
        let (runner, gates) =
            gate_runner(ScriptedRunner::new().script("npm run lint", vec![Reply::Exit(1, "3 problems")]));

        let report = gates.execute_quality_gates(&default_gates(), &NoProgress).await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].gate_id, "lint");
        assert_eq!(report.results[0].status, GateStatus::Failed);
        assert_eq!(report.halted_by.as_deref(), Some("lint"));
        assert!(!report.passed());
        assert_eq!(runner.calls(), vec!["npm run lint"]);
    }

    #[tokio::test]
    async fn test_gates_run_in_canonical_order() {
        let (runner, gates) = gate_runner(ScriptedRunner::new());
        let declared = vec![
            QualityGate::new("deploy", "Deploy", GateType::Deploy, "deploy"),
            QualityGate::new("build", "Build", GateType::Build, "build"),
            QualityGate::new("lint", "Lint", GateType::Lint, "lint"),
            QualityGate::new("types", "Types", GateType::Types, "types"),
        ];

        let report = gates.execute_quality_gates(&declared, &NoProgress).await;

        assert!(report.passed());
        assert_eq!(runner.calls(), vec!["lint", "types", "build", "deploy"]);
    }

    #[tokio::test]
    async fn test_optional_failure_continues_but_fails_overall() {
        let (runner, gates) = gate_runner(
            ScriptedRunner::new().script("integration", vec![Reply::Exit(1, "")]),
        );
        let declared = vec![
            QualityGate::new("integration", "Integration", GateType::Integration, "integration")
                .optional(FailurePolicy::Warn),
            QualityGate::new("deploy", "Deploy", GateType::Deploy, "deploy"),
        ];

        let report = gates.execute_quality_gates(&declared, &NoProgress).await;

        assert_eq!(report.results.len(), 2);
        assert!(report.results[1].passed());
        assert!(report.halted_by.is_none());
        assert!(!report.passed());
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_optional_gate_from_file_does_not_halt() {
        let (runner, gates) = gate_runner(
            ScriptedRunner::new().script("make integration", vec![Reply::Exit(1, "2 failed")]),
        );
        let declared: Vec<QualityGate> = serde_json::from_str(
            r#"[
                {"id": "integration", "type": "integration", "command": "make integration", "required": false},
                {"id": "deploy", "type": "deploy", "command": "make deploy", "required": false}
            ]"#,
        )
        .unwrap();

        let report = gates.execute_quality_gates(&declared, &NoProgress).await;

        assert_eq!(runner.calls(), vec!["make integration", "make deploy"]);
        assert_eq!(report.results.len(), 2);
        assert!(report.results[0].failed());
        assert!(report.results[1].passed());
        assert!(report.halted_by.is_none());
        assert!(!report.passed());
    }

    #[tokio::test]
    async fn test_skip_policy_gate_not_run_after_failure() {
        let (runner, gates) = gate_runner(
            ScriptedRunner::new().script("integration", vec![Reply::Exit(1, "")]),
        );
        let declared = vec![
            QualityGate::new("integration", "Integration", GateType::Integration, "integration")
                .optional(FailurePolicy::Warn),
            QualityGate::new("deploy", "Deploy", GateType::Deploy, "deploy")
                .optional(FailurePolicy::Skip),
        ];

        let report = gates.execute_quality_gates(&declared, &NoProgress).await;

        assert_eq!(report.results[1].status, GateStatus::Skipped);
        assert_eq!(report.count(GateStatus::Skipped), 1);
        assert_eq!(runner.calls(), vec!["integration"]);
    }

    #[tokio::test]
    async fn test_test_gate_output_overrides_zero_exit() {
        let (_, gates) = gate_runner(ScriptedRunner::new().script(
            "cargo test",
            vec![Reply::Exit(0, "test result: FAILED. 3 passed; 1 failed")],
        ));
        let gate = QualityGate::new("tests", "Tests", GateType::Tests, "cargo test");

        let result = gates.execute_quality_gate(&gate).await;

        assert!(result.failed());
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.error.unwrap().kind, TaskErrorKind::Execution);
    }

    #[tokio::test]
    async fn test_timed_out_gate_fails_with_timeout_error() {
        let (_, gates) = gate_runner(
            ScriptedRunner::new().script("npm run build", vec![Reply::TimedOut("compiling")]),
        );
        let gate = QualityGate::new("build", "Build", GateType::Build, "npm run build");

        let result = gates.execute_quality_gate(&gate).await;

        assert!(result.failed());
        assert_eq!(result.output, "compiling");
        assert!(result.error.unwrap().is_timeout());
    }

    #[tokio::test]
    async fn test_dry_run_passes_without_running() {
        let runner = Arc::new(ScriptedRunner::new().script("npm run lint", vec![Reply::Exit(1, "")]));
        let gates = QualityGateRunner::new(
            Arc::clone(&runner),
            ExecutionParams::default().with_dry_run(true),
        );

        let report = gates.execute_quality_gates(&default_gates(), &NoProgress).await;

        assert!(report.passed());
        assert_eq!(report.results.len(), 6);
        assert!(report.results.iter().all(|r| r.duration_ms == 0));
        assert!(runner.calls().is_empty());
    }
}
