//! Run Research use case.
//!
//! Three phases built on the [`AgentCoordinator`]:
//!
//! 1. **Discovery** (parallel): locator agents search against one query; the
//!    merge step runs only after every agent settled.
//! 2. **Analysis** (sequential): analyzers see the discovery result and the
//!    output of the analyzers before them.
//! 3. **Synthesis**: a pure fold of both into a report whose confidence never
//!    exceeds the weakest phase.

use crate::ports::events::OrchestrationEvent;
use crate::use_cases::coordinate_agents::{AgentCoordinator, CoordinationError};
use crate::use_cases::shared::{is_cancelled, millis};
use chrono::Utc;
use conductor_domain::{
    AgentInput, AgentTask, AgentTaskResult, AgentType, AnalysisPayload, AnalysisResult,
    Contribution, DiscoveryPayload, DiscoveryResult, ExecutionStrategy, ResearchPhase,
    ResearchQuery, ResearchReport, SourceStats, merge_discovery, synthesize,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Errors that can occur during a research run
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Discovery phase failed: {0}")]
    Discovery(CoordinationError),

    #[error("Analysis phase failed: {0}")]
    Analysis(CoordinationError),

    #[error("Research cancelled")]
    Cancelled,
}

impl ResearchError {
    fn in_phase(phase: ResearchPhase, err: CoordinationError) -> Self {
        match (phase, err) {
            (_, CoordinationError::Cancelled) => ResearchError::Cancelled,
            (ResearchPhase::Analysis, err) => ResearchError::Analysis(err),
            (_, err) => ResearchError::Discovery(err),
        }
    }
}

/// Use case for the discovery → analysis → synthesis pipeline.
pub struct ResearchOrchestrator {
    coordinator: AgentCoordinator,
    discovery_agents: Vec<AgentType>,
    analysis_agents: Vec<AgentType>,
}

impl ResearchOrchestrator {
    pub fn new(coordinator: AgentCoordinator) -> Self {
        Self {
            coordinator,
            discovery_agents: AgentType::DISCOVERY.to_vec(),
            analysis_agents: AgentType::ANALYSIS.to_vec(),
        }
    }

    pub fn with_discovery_agents(mut self, agents: Vec<AgentType>) -> Self {
        self.discovery_agents = agents;
        self
    }

    pub fn with_analysis_agents(mut self, agents: Vec<AgentType>) -> Self {
        self.analysis_agents = agents;
        self
    }

    pub async fn run(&self, query: ResearchQuery) -> Result<ResearchReport, ResearchError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        info!("Research started: {}", query.text);

        let discovery = self.discover(&query).await?;
        self.ensure_not_cancelled()?;
        let analysis = self.analyze(&query, &discovery).await?;
        self.ensure_not_cancelled()?;

        let phase_clock = Instant::now();
        self.publish(OrchestrationEvent::PhaseStarted {
            phase: ResearchPhase::Synthesis,
            agents: 0,
        });
        let synthesis = synthesize(&query, &discovery, &analysis);
        self.publish(OrchestrationEvent::PhaseCompleted {
            phase: ResearchPhase::Synthesis,
            duration_ms: millis(phase_clock.elapsed()),
            succeeded: 0,
            failed: 0,
        });

        info!(
            "Research finished: {} insights, {} recommendations, confidence {}",
            analysis.insights.len(),
            synthesis.recommendations.len(),
            synthesis.confidence
        );

        Ok(ResearchReport {
            query,
            discovery,
            analysis,
            synthesis,
            started_at,
            finished_at: Utc::now(),
            duration_ms: millis(clock.elapsed()),
        })
    }

    async fn discover(&self, query: &ResearchQuery) -> Result<DiscoveryResult, ResearchError> {
        let agents = self.phase_agents(ResearchPhase::Discovery, &self.discovery_agents, |t| {
            match t {
                AgentType::DocumentationLocator => query.scope.includes_docs(),
                _ => query.scope.includes_code(),
            }
        });
        let context = json!({ "query": query });
        let tasks = phase_tasks(ResearchPhase::Discovery, &agents, &context, query);

        let results = self
            .run_phase(ResearchPhase::Discovery, &tasks, ExecutionStrategy::Parallel)
            .await?;
        let contributions = results.iter().map(decode_contribution).collect();
        let discovery = merge_discovery(query, contributions);

        info!(
            "Discovery: {} files, {} patterns, {} docs (confidence {})",
            discovery.files.len(),
            discovery.patterns.len(),
            discovery.docs.len(),
            discovery.confidence
        );
        Ok(discovery)
    }

    async fn analyze(
        &self,
        query: &ResearchQuery,
        discovery: &DiscoveryResult,
    ) -> Result<AnalysisResult, ResearchError> {
        let agents = self.phase_agents(ResearchPhase::Analysis, &self.analysis_agents, |_| true);
        let context = json!({ "query": query, "discovery": discovery });
        let tasks = phase_tasks(ResearchPhase::Analysis, &agents, &context, query);

        let results = self
            .run_phase(ResearchPhase::Analysis, &tasks, ExecutionStrategy::Sequential)
            .await?;
        let analysis =
            AnalysisResult::from_contributions(results.iter().map(decode_contribution).collect());

        info!(
            "Analysis: {} insights, {} evidence, {} relationships (confidence {})",
            analysis.insights.len(),
            analysis.evidence.len(),
            analysis.relationships.len(),
            analysis.confidence
        );
        Ok(analysis)
    }

    /// Run one phase and fail it when no agent succeeded.
    async fn run_phase(
        &self,
        phase: ResearchPhase,
        tasks: &[AgentTask],
        strategy: ExecutionStrategy,
    ) -> Result<Vec<AgentTaskResult>, ResearchError> {
        let clock = Instant::now();
        self.publish(OrchestrationEvent::PhaseStarted {
            phase,
            agents: tasks.len(),
        });

        let results = self
            .coordinator
            .execute_phase(tasks, strategy, Some(phase))
            .await
            .map_err(|e| ResearchError::in_phase(phase, e))?;

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        self.publish(OrchestrationEvent::PhaseCompleted {
            phase,
            duration_ms: millis(clock.elapsed()),
            succeeded,
            failed: results.len() - succeeded,
        });

        if succeeded == 0 {
            return Err(ResearchError::in_phase(
                phase,
                CoordinationError::AllAgentsFailed(results.len()),
            ));
        }
        Ok(results)
    }

    /// Configured agents for a phase that pass `keep` and are registered.
    fn phase_agents(
        &self,
        phase: ResearchPhase,
        configured: &[AgentType],
        keep: impl Fn(AgentType) -> bool,
    ) -> Vec<AgentType> {
        let mut agents = Vec::with_capacity(configured.len());
        for &agent_type in configured {
            if !keep(agent_type) || agents.contains(&agent_type) {
                continue;
            }
            if self.coordinator.registry().contains(agent_type) {
                agents.push(agent_type);
            } else {
                warn!("No {} agent registered; skipping it in {}", agent_type, phase);
            }
        }
        agents
    }

    fn publish(&self, event: OrchestrationEvent) {
        if let Some(bus) = self.coordinator.events() {
            bus.publish(event);
        }
    }

    fn ensure_not_cancelled(&self) -> Result<(), ResearchError> {
        if is_cancelled(self.coordinator.cancellation_token()) {
            return Err(ResearchError::Cancelled);
        }
        Ok(())
    }
}

fn phase_tasks(
    phase: ResearchPhase,
    agents: &[AgentType],
    context: &serde_json::Value,
    query: &ResearchQuery,
) -> Vec<AgentTask> {
    agents
        .iter()
        .map(|&agent_type| {
            let input = AgentInput::new(context.clone())
                .with_parameter("max_files", query.max_files())
                .with_parameter("depth", query.depth.as_str());
            AgentTask::new(format!("{}-{}", phase, agent_type), agent_type)
                .with_input(input)
                .with_strategy(match phase {
                    ResearchPhase::Analysis => ExecutionStrategy::Sequential,
                    _ => ExecutionStrategy::Parallel,
                })
        })
        .collect()
}

/// Decode a result's payload. An undecodable payload counts as a failed source.
fn decode_contribution<P: DeserializeOwned>(result: &AgentTaskResult) -> Contribution<P> {
    let mut stats = SourceStats::from_result(result);
    if !stats.success {
        return Contribution {
            stats,
            payload: None,
        };
    }
    match serde_json::from_value::<P>(result.payload.clone()) {
        Ok(payload) => Contribution {
            stats,
            payload: Some(payload),
        },
        Err(e) => {
            warn!("Agent {} returned an unreadable payload: {}", result.task_id, e);
            stats.success = false;
            stats.confidence = None;
            stats.error = Some(format!("invalid payload: {}", e));
            Contribution {
                stats,
                payload: None,
            }
        }
    }
}
