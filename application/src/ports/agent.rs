//! Agent port
//!
//! Every agent, built-in or external, is called through [`AgentPort`]:
//! `(context, parameters) -> AgentOutput`. Agents are resolved by
//! [`AgentType`] through an [`AgentRegistry`] built once at startup.

use async_trait::async_trait;
use conductor_domain::{AgentInput, AgentOutput, AgentTaskResult, AgentType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors an agent can raise instead of returning an output.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent failed: {0}")]
    Failed(String),

    #[error("Invalid agent response: {0}")]
    InvalidResponse(String),

    #[error("Agent unavailable: {0}")]
    Unavailable(String),
}

/// A single agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub task_id: String,
    pub agent_type: AgentType,
    pub input: AgentInput,
    /// Results visible to this call (earlier tasks in a sequential run,
    /// or this task's dependencies). Read-only.
    #[serde(default)]
    pub prior_results: Vec<AgentTaskResult>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl AgentRequest {
    pub fn new(task_id: impl Into<String>, agent_type: AgentType, input: AgentInput) -> Self {
        Self {
            task_id: task_id.into(),
            agent_type,
            input,
            prior_results: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_prior_results(mut self, prior: Vec<AgentTaskResult>) -> Self {
        self.prior_results = prior;
        self
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }
}

/// The uniform agent contract.
#[async_trait]
pub trait AgentPort: Send + Sync {
    fn agent_type(&self) -> AgentType;

    async fn invoke(&self, request: AgentRequest) -> Result<AgentOutput, AgentError>;
}

/// One implementation per [`AgentType`].
#[derive(Default, Clone)]
pub struct AgentRegistry {
    agents: HashMap<AgentType, Arc<dyn AgentPort>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under its own type, replacing any previous one.
    pub fn register(&mut self, agent: Arc<dyn AgentPort>) {
        self.agents.insert(agent.agent_type(), agent);
    }

    pub fn with(mut self, agent: Arc<dyn AgentPort>) -> Self {
        self.register(agent);
        self
    }

    pub fn get(&self, agent_type: AgentType) -> Option<Arc<dyn AgentPort>> {
        self.agents.get(&agent_type).cloned()
    }

    pub fn contains(&self, agent_type: AgentType) -> bool {
        self.agents.contains_key(&agent_type)
    }

    /// Registered types in canonical order.
    pub fn types(&self) -> Vec<AgentType> {
        AgentType::ALL
            .into_iter()
            .filter(|t| self.agents.contains_key(t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.types())
            .finish()
    }
}
