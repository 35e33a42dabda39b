//! Research configuration from TOML (`[research]` section)

use conductor_domain::{AgentType, ResearchDepth};
use serde::{Deserialize, Serialize};

/// Raw research configuration from TOML
///
/// ```toml
/// [research]
/// discovery_agents = ["code-locator", "documentation-locator", "pattern-finder"]
/// analysis_agents = ["codebase-analyzer", "research-analyzer"]
/// depth = "medium"      # "shallow", "medium", "deep"
/// max_files = 25
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileResearchConfig {
    pub discovery_agents: Vec<String>,
    pub analysis_agents: Vec<String>,
    pub depth: String,
    pub max_files: Option<usize>,
}

impl Default for FileResearchConfig {
    fn default() -> Self {
        Self {
            discovery_agents: AgentType::DISCOVERY.iter().map(|t| t.to_string()).collect(),
            analysis_agents: AgentType::ANALYSIS.iter().map(|t| t.to_string()).collect(),
            depth: ResearchDepth::default().as_str().to_string(),
            max_files: None,
        }
    }
}

impl FileResearchConfig {
    /// Parse agent names, collecting the ones that are not valid types.
    pub fn parse_agents(names: &[String]) -> (Vec<AgentType>, Vec<String>) {
        let mut agents = Vec::new();
        let mut unknown = Vec::new();
        for name in names {
            match name.parse::<AgentType>() {
                Ok(agent_type) => agents.push(agent_type),
                Err(_) => unknown.push(name.clone()),
            }
        }
        (agents, unknown)
    }

    pub fn discovery(&self) -> Vec<AgentType> {
        Self::parse_agents(&self.discovery_agents).0
    }

    pub fn analysis(&self) -> Vec<AgentType> {
        Self::parse_agents(&self.analysis_agents).0
    }

    /// Configured depth; unknown values fall back to the default.
    pub fn depth(&self) -> ResearchDepth {
        self.depth.parse().unwrap_or_default()
    }
}
