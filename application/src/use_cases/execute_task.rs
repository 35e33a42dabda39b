//! Execute Task use case.
//!
//! Runs one task through its state machine:
//!
//! ```text
//! pending ──► running ──► completed
//!    │           └──────► failed      (after the last attempt)
//!    └──────────────────► skipped     (a dependency is not completed)
//! ```
//!
//! A command or agent action is attempted up to `max_attempts` times. Attempt
//! `n > 1` waits `base_delay × backoff_multiplier^(n-2)` first. Timeouts are
//! terminal unless the retry policy covers them.

use crate::config::ExecutionParams;
use crate::ports::agent::{AgentRegistry, AgentRequest};
use crate::ports::command_runner::{CommandRunner, CommandSpec};
use crate::ports::progress::ExecutionProgressNotifier;
use crate::use_cases::shared::{is_cancelled, millis, run_cancellable, sleep_cancellable};
use chrono::Utc;
use conductor_domain::{
    AgentInput, AgentOutput, AgentRef, Task, TaskAction, TaskError, TaskErrorKind, TaskId,
    TaskResult,
};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecuteTaskError {
    #[error("Task {0} is already running")]
    AlreadyRunning(TaskId),
}

/// Outcome of a single attempt, before it becomes a [`TaskResult`].
struct AttemptOutcome {
    exit_code: Option<i32>,
    output: String,
    error: Option<TaskError>,
}

impl AttemptOutcome {
    fn success(exit_code: Option<i32>, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
            error: None,
        }
    }

    fn failure(exit_code: Option<i32>, output: impl Into<String>, error: TaskError) -> Self {
        Self {
            exit_code,
            output: output.into(),
            error: Some(error),
        }
    }

    fn cancelled() -> Self {
        Self::failure(None, "", TaskError::cancelled("Run cancelled"))
    }

    fn into_result(self, task_id: TaskId) -> TaskResult {
        match self.error {
            None => TaskResult::completed(task_id, self.output).with_exit_code(self.exit_code),
            Some(error) => TaskResult::failed(task_id, error)
                .with_output(self.output)
                .with_exit_code(self.exit_code),
        }
    }
}

/// Marks a task id as running for as long as it lives.
struct RunningGuard<'a> {
    running: &'a Mutex<HashSet<TaskId>>,
    id: TaskId,
}

impl<'a> RunningGuard<'a> {
    fn acquire(running: &'a Mutex<HashSet<TaskId>>, id: &TaskId) -> Result<Self, ExecuteTaskError> {
        let mut set = running.lock().unwrap_or_else(|p| p.into_inner());
        if !set.insert(id.clone()) {
            return Err(ExecuteTaskError::AlreadyRunning(id.clone()));
        }
        Ok(Self {
            running,
            id: id.clone(),
        })
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.id);
    }
}

/// Use case for executing a single task with retry, timeout and dry-run support.
pub struct TaskExecutor<R: CommandRunner> {
    runner: Arc<R>,
    agents: Arc<AgentRegistry>,
    params: ExecutionParams,
    running: Mutex<HashSet<TaskId>>,
    cancellation_token: Option<CancellationToken>,
}

impl<R: CommandRunner + 'static> TaskExecutor<R> {
    pub fn new(runner: Arc<R>, agents: Arc<AgentRegistry>, params: ExecutionParams) -> Self {
        Self {
            runner,
            agents,
            params,
            running: Mutex::new(HashSet::new()),
            cancellation_token: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn params(&self) -> &ExecutionParams {
        &self.params
    }

    /// Execute `task` given the results of the tasks run so far.
    ///
    /// Unsatisfied dependencies produce a skipped result without any attempt.
    /// Execution and timeout failures are recorded in the result; the only
    /// error is re-entrant execution of a task that is already running.
    pub async fn execute_task(
        &self,
        task: &Task,
        results: &HashMap<TaskId, TaskResult>,
        progress: &dyn ExecutionProgressNotifier,
    ) -> Result<TaskResult, ExecuteTaskError> {
        let _guard = RunningGuard::acquire(&self.running, &task.id)?;

        if let Some(reason) = unsatisfied_dependency(task, results) {
            debug!("Skipping task {}: {}", task.id, reason);
            return Ok(TaskResult::skipped(task.id.clone(), reason));
        }

        if self.params.dry_run {
            debug!("Dry-run task {}", task.id);
            return Ok(TaskResult::dry_run(task.id.clone(), &task.action().describe()));
        }

        Ok(self.execute_with_retry(task, progress).await)
    }

    async fn execute_with_retry(
        &self,
        task: &Task,
        progress: &dyn ExecutionProgressNotifier,
    ) -> TaskResult {
        let policy = task
            .retry
            .clone()
            .unwrap_or_else(|| self.params.default_retry.clone());
        let max_attempts = policy.attempts();
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut attempts = 0;
        let outcome = loop {
            let attempt = attempts + 1;
            if attempt > 1 {
                let delay = policy.delay_before_attempt(attempt);
                info!(
                    "Retrying task {} (attempt {}/{}) in {:?}",
                    task.id, attempt, max_attempts, delay
                );
                progress.on_task_retry(task, attempt, max_attempts, delay);
                if !sleep_cancellable(&self.cancellation_token, delay).await {
                    break AttemptOutcome::cancelled();
                }
            }

            debug!("Task {} attempt {}/{}", task.id, attempt, max_attempts);
            let outcome = self.attempt(task).await;
            attempts = attempt;

            let Some(error) = &outcome.error else {
                break outcome;
            };
            let retryable = match error.kind {
                TaskErrorKind::Execution => true,
                TaskErrorKind::Timeout => policy.retry_on_timeout,
                _ => false,
            };
            if !retryable || attempt >= max_attempts || is_cancelled(&self.cancellation_token) {
                warn!("Task {} failed after {} attempt(s): {}", task.id, attempt, error);
                break outcome;
            }
            warn!(
                "Task {} attempt {}/{} failed: {}",
                task.id, attempt, max_attempts, error
            );
        };

        outcome
            .into_result(task.id.clone())
            .with_timing(started_at, Utc::now(), millis(clock.elapsed()))
            .with_attempts(attempts)
    }

    async fn attempt(&self, task: &Task) -> AttemptOutcome {
        let timeout = task.timeout_or(self.params.default_timeout);
        let run = async {
            match task.action() {
                TaskAction::Command(command) => self.run_command(task, command, timeout).await,
                TaskAction::Agent(agent) => self.run_agent(task, agent, timeout).await,
                TaskAction::None => AttemptOutcome::success(None, "no action to run"),
            }
        };
        run_cancellable(&self.cancellation_token, run)
            .await
            .unwrap_or_else(AttemptOutcome::cancelled)
    }

    async fn run_command(&self, task: &Task, command: &str, timeout: Duration) -> AttemptOutcome {
        let spec = CommandSpec::new(command, timeout)
            .with_working_dir(
                task.working_dir
                    .clone()
                    .or_else(|| self.params.working_dir.clone()),
            )
            .with_env(task.env.clone());

        match self.runner.run(&spec).await {
            Ok(out) if out.timed_out => AttemptOutcome::failure(
                out.exit_code,
                out.output,
                TaskError::timeout(format!(
                    "Task {} timed out after {}s",
                    task.id,
                    timeout.as_secs()
                )),
            ),
            Ok(out) if out.exit_code == Some(0) => AttemptOutcome::success(Some(0), out.output),
            Ok(out) => {
                let message = match out.exit_code {
                    Some(code) => format!("Command exited with code {}", code),
                    None => "Command was terminated by a signal".to_string(),
                };
                AttemptOutcome::failure(out.exit_code, out.output, TaskError::execution(message))
            }
            Err(e) => AttemptOutcome::failure(None, "", TaskError::spawn(e.to_string())),
        }
    }

    async fn run_agent(&self, task: &Task, agent_ref: &AgentRef, timeout: Duration) -> AttemptOutcome {
        let Some(agent) = self.agents.get(agent_ref.agent_type) else {
            return AttemptOutcome::failure(
                None,
                "",
                TaskError::spawn(format!(
                    "No agent registered for type {}",
                    agent_ref.agent_type
                )),
            );
        };

        let input = AgentInput {
            context: json!({
                "task_id": task.id.as_str(),
                "title": task.title,
                "description": task.description,
                "files": task.files,
                "acceptance_criteria": task.acceptance_criteria,
            }),
            parameters: agent_ref.parameters.clone(),
        };
        let request = AgentRequest::new(task.id.as_str(), agent_ref.agent_type, input)
            .with_working_dir(
                task.working_dir
                    .clone()
                    .or_else(|| self.params.working_dir.clone()),
            );

        match tokio::time::timeout(timeout, agent.invoke(request)).await {
            Err(_) => AttemptOutcome::failure(
                None,
                "",
                TaskError::timeout(format!(
                    "Agent {} timed out after {}s",
                    agent_ref.agent_type,
                    timeout.as_secs()
                )),
            ),
            Ok(Err(e)) => AttemptOutcome::failure(None, "", TaskError::execution(e.to_string())),
            Ok(Ok(output)) if output.success => {
                AttemptOutcome::success(None, render_agent_output(&output))
            }
            Ok(Ok(output)) => {
                let message = if output.reasoning.is_empty() {
                    "Agent reported failure".to_string()
                } else {
                    output.reasoning.clone()
                };
                AttemptOutcome::failure(
                    None,
                    render_agent_output(&output),
                    TaskError::execution(message),
                )
            }
        }
    }
}

/// First dependency whose result is missing or not completed, as a reason string.
fn unsatisfied_dependency(task: &Task, results: &HashMap<TaskId, TaskResult>) -> Option<String> {
    task.dependencies.iter().find_map(|dep| match results.get(dep) {
        Some(result) if result.is_completed() => None,
        Some(result) => Some(format!("Dependency {} is {}", dep, result.status)),
        None => Some(format!("Dependency {} has no result", dep)),
    })
}

fn render_agent_output(output: &AgentOutput) -> String {
    let payload = if output.payload.is_null() {
        String::new()
    } else {
        serde_json::to_string_pretty(&output.payload).unwrap_or_default()
    };
    match (output.reasoning.is_empty(), payload.is_empty()) {
        (true, _) => payload,
        (false, true) => output.reasoning.clone(),
        (false, false) => format!("{}\n{}", output.reasoning, payload),
    }
}
