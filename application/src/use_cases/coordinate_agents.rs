//! Coordinate Agents use case.
//!
//! Runs a set of [`AgentTask`]s through the registry and aggregates their
//! outputs. Two dispatch modes:
//!
//! - **Parallel**: tasks are grouped into dependency waves. Every wave runs
//!   concurrently under a semaphore sized by `max_concurrency` and is joined
//!   completely before the next wave starts. A failed agent never
//!   short-circuits the wave.
//! - **Sequential**: one task at a time in resolved order. Each agent sees
//!   the results settled before it as read-only context.
//!
//! Tasks whose dependencies did not complete are skipped without dispatch.

use crate::config::ExecutionParams;
use crate::ports::agent::{AgentPort, AgentRegistry, AgentRequest};
use crate::ports::events::{EventBus, OrchestrationEvent};
use crate::use_cases::shared::{is_cancelled, millis, run_cancellable};
use chrono::Utc;
use conductor_domain::{
    AgentTask, AgentTaskResult, AgentType, AggregatedResult, AggregationStrategy,
    DependencyResolver, DomainError, ExecutionStrategy, ResearchPhase, TaskError, aggregate,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that can occur during agent coordination
#[derive(Error, Debug)]
pub enum CoordinationError {
    #[error("No agent registered for type {0}")]
    AgentNotRegistered(AgentType),

    #[error("All {0} agent tasks failed")]
    AllAgentsFailed(usize),

    #[error("Invalid agent tasks: {0}")]
    InvalidTasks(DomainError),

    #[error("Coordination cancelled")]
    Cancelled,
}

impl From<DomainError> for CoordinationError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::AllAgentsFailed(n) => CoordinationError::AllAgentsFailed(n),
            DomainError::NothingToAggregate => CoordinationError::AllAgentsFailed(0),
            DomainError::Cancelled => CoordinationError::Cancelled,
            other => CoordinationError::InvalidTasks(other),
        }
    }
}

/// Per-task results plus their aggregate.
#[derive(Debug, Clone)]
pub struct CoordinationResult {
    /// In declaration order
    pub results: Vec<AgentTaskResult>,
    pub aggregated: AggregatedResult,
}

/// Everything a spawned agent call needs, detached from the coordinator.
#[derive(Clone)]
struct Dispatch {
    events: Option<Arc<EventBus>>,
    phase: Option<ResearchPhase>,
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

/// Use case for executing agent tasks and aggregating their outputs.
pub struct AgentCoordinator {
    registry: Arc<AgentRegistry>,
    params: ExecutionParams,
    events: Option<Arc<EventBus>>,
    cancellation_token: Option<CancellationToken>,
}

impl AgentCoordinator {
    pub fn new(registry: Arc<AgentRegistry>, params: ExecutionParams) -> Self {
        Self {
            registry,
            params,
            events: None,
            cancellation_token: None,
        }
    }

    /// Publish agent lifecycle events to `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub(crate) fn events(&self) -> Option<&Arc<EventBus>> {
        self.events.as_ref()
    }

    pub(crate) fn cancellation_token(&self) -> &Option<CancellationToken> {
        &self.cancellation_token
    }

    /// Execute `tasks` and return one result per task, in declaration order.
    ///
    /// Individual failures are recorded in the results. Errors are reserved
    /// for invalid task sets, unregistered agent types and cancellation.
    pub async fn execute_tasks(
        &self,
        tasks: &[AgentTask],
        strategy: ExecutionStrategy,
    ) -> Result<Vec<AgentTaskResult>, CoordinationError> {
        self.execute_phase(tasks, strategy, None).await
    }

    /// Combine results under `strategy`. Fails only if every participant failed.
    pub fn aggregate_results(
        &self,
        results: &[AgentTaskResult],
        strategy: &AggregationStrategy,
    ) -> Result<AggregatedResult, CoordinationError> {
        let aggregated = aggregate(results, strategy)?;
        if aggregated.is_partial() {
            warn!(
                "{} of {} agents failed; confidence reduced to {}",
                aggregated.failed, aggregated.participants, aggregated.confidence
            );
        }
        Ok(aggregated)
    }

    /// Execute then aggregate.
    pub async fn coordinate(
        &self,
        tasks: &[AgentTask],
        execution: ExecutionStrategy,
        aggregation: &AggregationStrategy,
    ) -> Result<CoordinationResult, CoordinationError> {
        let results = self.execute_tasks(tasks, execution).await?;
        let aggregated = self.aggregate_results(&results, aggregation)?;
        Ok(CoordinationResult {
            results,
            aggregated,
        })
    }

    pub(crate) async fn execute_phase(
        &self,
        tasks: &[AgentTask],
        strategy: ExecutionStrategy,
        phase: Option<ResearchPhase>,
    ) -> Result<Vec<AgentTaskResult>, CoordinationError> {
        if is_cancelled(&self.cancellation_token) {
            return Err(CoordinationError::Cancelled);
        }

        let order = DependencyResolver::resolve_indices(tasks).map_err(CoordinationError::InvalidTasks)?;
        if let Some(missing) = tasks.iter().find(|t| !self.registry.contains(t.agent_type)) {
            return Err(CoordinationError::AgentNotRegistered(missing.agent_type));
        }

        info!(
            "Dispatching {} agent task(s) ({})",
            tasks.len(),
            strategy
        );

        let mut settled: Vec<Option<AgentTaskResult>> = vec![None; tasks.len()];
        match strategy {
            ExecutionStrategy::Parallel => self.run_waves(tasks, &order, phase, &mut settled).await?,
            ExecutionStrategy::Sequential => {
                self.run_in_order(tasks, &order, phase, &mut settled).await?
            }
        }

        let results: Vec<AgentTaskResult> = settled.into_iter().flatten().collect();
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(
            "Agent tasks settled: {} succeeded, {} failed",
            succeeded,
            results.len() - succeeded
        );
        Ok(results)
    }

    async fn run_in_order(
        &self,
        tasks: &[AgentTask],
        order: &[usize],
        phase: Option<ResearchPhase>,
        settled: &mut [Option<AgentTaskResult>],
    ) -> Result<(), CoordinationError> {
        let mut prior: Vec<AgentTaskResult> = Vec::new();
        for &index in order {
            self.run_alone(tasks, index, phase, prior.clone(), settled)
                .await?;
            if let Some(result) = &settled[index] {
                prior.push(result.clone());
            }
        }
        Ok(())
    }

    async fn run_waves(
        &self,
        tasks: &[AgentTask],
        order: &[usize],
        phase: Option<ResearchPhase>,
        settled: &mut [Option<AgentTaskResult>],
    ) -> Result<(), CoordinationError> {
        let mut settled_order: Vec<usize> = Vec::with_capacity(tasks.len());

        for wave in dependency_waves(tasks, order) {
            let (concurrent, alone): (Vec<usize>, Vec<usize>) = wave
                .into_iter()
                .partition(|&i| tasks[i].strategy == ExecutionStrategy::Parallel);

            let mut dispatch = Vec::with_capacity(concurrent.len());
            for index in concurrent {
                if let Some(reason) = unsatisfied_dependency(tasks, index, settled) {
                    settled[index] = Some(self.skip(&tasks[index], reason, phase));
                    settled_order.push(index);
                } else {
                    dispatch.push(index);
                }
            }
            for (index, result) in self.run_concurrently(tasks, &dispatch, phase, settled).await? {
                settled[index] = Some(result);
                settled_order.push(index);
            }

            for index in alone {
                let prior = settled_order
                    .iter()
                    .filter_map(|&i| settled[i].clone())
                    .collect();
                self.run_alone(tasks, index, phase, prior, settled).await?;
                settled_order.push(index);
            }
        }
        Ok(())
    }

    /// Run the given tasks concurrently and wait for every one to settle.
    async fn run_concurrently(
        &self,
        tasks: &[AgentTask],
        indices: &[usize],
        phase: Option<ResearchPhase>,
        settled: &[Option<AgentTaskResult>],
    ) -> Result<Vec<(usize, AgentTaskResult)>, CoordinationError> {
        let semaphore = Arc::new(Semaphore::new(self.params.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for &index in indices {
            let task = tasks[index].clone();
            let agent = self
                .registry
                .get(task.agent_type)
                .ok_or(CoordinationError::AgentNotRegistered(task.agent_type))?;
            let prior = dependency_results(&task, tasks, settled);
            let dispatch = self.dispatch(&task, phase);
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    let result = AgentTaskResult::failed(
                        &task,
                        TaskError::execution("worker pool closed"),
                    );
                    return (index, result);
                };
                (index, invoke_agent(agent, task, prior, dispatch).await)
            });
        }

        let mut completed = Vec::with_capacity(indices.len());
        loop {
            let next = match &self.cancellation_token {
                Some(token) => tokio::select! {
                    next = join_set.join_next() => Some(next),
                    _ = token.cancelled() => None,
                },
                None => Some(join_set.join_next().await),
            };
            let Some(next) = next else {
                warn!("Cancelling {} in-flight agent task(s)", join_set.len());
                join_set.abort_all();
                return Err(CoordinationError::Cancelled);
            };

            match next {
                None => break,
                Some(Ok((index, result))) => completed.push((index, result)),
                Some(Err(e)) => warn!("Agent task aborted: {}", e),
            }
        }

        // A task that panicked leaves no result behind.
        for &index in indices {
            if !completed.iter().any(|(i, _)| *i == index) {
                let result = AgentTaskResult::failed(
                    &tasks[index],
                    TaskError::execution("agent task aborted before settling"),
                );
                publish(&self.events, settle_event(&result, phase));
                completed.push((index, result));
            }
        }
        Ok(completed)
    }

    /// Run a single task on its own, with `prior` results as context.
    async fn run_alone(
        &self,
        tasks: &[AgentTask],
        index: usize,
        phase: Option<ResearchPhase>,
        prior: Vec<AgentTaskResult>,
        settled: &mut [Option<AgentTaskResult>],
    ) -> Result<(), CoordinationError> {
        if is_cancelled(&self.cancellation_token) {
            return Err(CoordinationError::Cancelled);
        }

        let task = &tasks[index];
        if let Some(reason) = unsatisfied_dependency(tasks, index, settled) {
            settled[index] = Some(self.skip(task, reason, phase));
            return Ok(());
        }

        let agent = self
            .registry
            .get(task.agent_type)
            .ok_or(CoordinationError::AgentNotRegistered(task.agent_type))?;
        let call = invoke_agent(agent, task.clone(), prior, self.dispatch(task, phase));
        let result = run_cancellable(&self.cancellation_token, call)
            .await
            .ok_or(CoordinationError::Cancelled)?;
        settled[index] = Some(result);
        Ok(())
    }

    fn skip(&self, task: &AgentTask, reason: String, phase: Option<ResearchPhase>) -> AgentTaskResult {
        debug!("Skipping agent task {}: {}", task.id, reason);
        let result = AgentTaskResult::skipped(task, reason);
        publish(&self.events, settle_event(&result, phase));
        result
    }

    fn dispatch(&self, task: &AgentTask, phase: Option<ResearchPhase>) -> Dispatch {
        Dispatch {
            events: self.events.clone(),
            phase,
            timeout: task
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(self.params.agent_timeout),
            working_dir: self.params.working_dir.clone(),
        }
    }
}

/// Call one agent with a hard timeout and turn the outcome into a result.
async fn invoke_agent(
    agent: Arc<dyn AgentPort>,
    task: AgentTask,
    prior: Vec<AgentTaskResult>,
    dispatch: Dispatch,
) -> AgentTaskResult {
    publish(
        &dispatch.events,
        OrchestrationEvent::AgentStarted {
            task_id: task.id.clone(),
            agent_type: task.agent_type,
            phase: dispatch.phase,
        },
    );
    debug!("Agent {} started task {}", task.agent_type, task.id);

    let request = AgentRequest::new(task.id.clone(), task.agent_type, task.input.clone())
        .with_prior_results(prior)
        .with_working_dir(dispatch.working_dir.clone());

    let started_at = Utc::now();
    let clock = Instant::now();
    let result = match tokio::time::timeout(dispatch.timeout, agent.invoke(request)).await {
        Ok(Ok(output)) => AgentTaskResult::from_output(&task, output),
        Ok(Err(e)) => AgentTaskResult::failed(&task, TaskError::execution(e.to_string())),
        Err(_) => AgentTaskResult::timed_out(&task, dispatch.timeout.as_secs()),
    }
    .with_timing(started_at, Utc::now(), millis(clock.elapsed()));

    if result.is_success() {
        debug!("Agent task {} completed in {}ms", task.id, result.duration_ms);
    } else {
        warn!(
            "Agent task {} {}: {}",
            task.id,
            result.status,
            result.error_message().unwrap_or("no error message")
        );
    }
    publish(&dispatch.events, settle_event(&result, dispatch.phase));
    result
}

fn publish(events: &Option<Arc<EventBus>>, event: OrchestrationEvent) {
    if let Some(bus) = events {
        bus.publish(event);
    }
}

fn settle_event(result: &AgentTaskResult, phase: Option<ResearchPhase>) -> OrchestrationEvent {
    if result.is_success() {
        OrchestrationEvent::AgentCompleted {
            task_id: result.task_id.clone(),
            agent_type: result.agent_type,
            phase,
            duration_ms: result.duration_ms,
            confidence: result.confidence,
        }
    } else {
        OrchestrationEvent::AgentFailed {
            task_id: result.task_id.clone(),
            agent_type: result.agent_type,
            phase,
            status: result.status,
            error: result.error_message().unwrap_or_default().to_string(),
        }
    }
}

/// Group resolved indices into waves: a task's wave is one past the
/// deepest of its dependencies. Waves keep declaration order.
fn dependency_waves(tasks: &[AgentTask], order: &[usize]) -> Vec<Vec<usize>> {
    let position: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();

    let mut level = vec![0usize; tasks.len()];
    for &index in order {
        level[index] = tasks[index]
            .dependencies
            .iter()
            .filter_map(|d| position.get(d.as_str()))
            .map(|&dep| level[dep] + 1)
            .max()
            .unwrap_or(0);
    }

    let depth = level.iter().copied().max().map_or(0, |m| m + 1);
    let mut waves = vec![Vec::new(); depth];
    for (index, &l) in level.iter().enumerate() {
        waves[l].push(index);
    }
    waves
}

fn unsatisfied_dependency(
    tasks: &[AgentTask],
    index: usize,
    settled: &[Option<AgentTaskResult>],
) -> Option<String> {
    tasks[index].dependencies.iter().find_map(|dep| {
        let result = tasks
            .iter()
            .position(|t| &t.id == dep)
            .and_then(|i| settled[i].as_ref());
        match result {
            Some(r) if r.is_success() => None,
            Some(r) => Some(format!("Dependency {} is {}", dep, r.status)),
            None => Some(format!("Dependency {} has no result", dep)),
        }
    })
}

fn dependency_results(
    task: &AgentTask,
    tasks: &[AgentTask],
    settled: &[Option<AgentTaskResult>],
) -> Vec<AgentTaskResult> {
    task.dependencies
        .iter()
        .filter_map(|dep| tasks.iter().position(|t| &t.id == dep))
        .filter_map(|i| settled[i].clone())
        .collect()
}
