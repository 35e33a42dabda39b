//! Agent configuration from TOML (`[agents]` section)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw agent configuration from TOML
///
/// ```toml
/// [agents]
/// max_concurrency = 4
/// timeout_secs = 120
///
/// [[agents.external]]
/// agent_type = "codebase-analyzer"
/// command = "./tools/analyze"
/// args = ["--json"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentsConfig {
    /// Agent calls in flight at once
    pub max_concurrency: usize,
    /// Per-call timeout for agent tasks that declare none
    pub timeout_secs: u64,
    /// External command agents, each replacing the built-in agent of its type
    pub external: Vec<FileExternalAgent>,
}

impl Default for FileAgentsConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            timeout_secs: 120,
            external: Vec::new(),
        }
    }
}

/// An agent implemented by an external program speaking JSON over stdio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileExternalAgent {
    pub agent_type: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
