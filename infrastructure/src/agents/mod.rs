//! Agent implementations
//!
//! Five local agents search and analyze the files of a workspace root:
//!
//! | Agent | Phase | Looks at |
//! |-------|-------|----------|
//! | [`CodeLocator`] | discovery | source files matching the query terms |
//! | [`DocumentationLocator`] | discovery | documents, with title and excerpt |
//! | [`PatternFinder`] | discovery | individual matching lines |
//! | [`CodebaseAnalyzer`] | analysis | size, debt markers, credentials, references |
//! | [`ResearchAnalyzer`] | analysis | the discovery result as a whole |
//!
//! Any of them can be replaced by an [`ExternalCommandAgent`].

mod code_locator;
mod codebase_analyzer;
mod documentation_locator;
mod external;
mod pattern_finder;
mod request;
mod research_analyzer;
mod workspace;

pub use code_locator::CodeLocator;
pub use codebase_analyzer::CodebaseAnalyzer;
pub use documentation_locator::DocumentationLocator;
pub use external::ExternalCommandAgent;
pub use pattern_finder::PatternFinder;
pub use research_analyzer::ResearchAnalyzer;
pub use workspace::{Workspace, WorkspaceFile};

use crate::config::FileExternalAgent;
use conductor_application::{AgentError, AgentRegistry};
use conductor_domain::{AgentOutput, AgentType};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Run blocking file work off the async runtime.
async fn run_blocking<F>(work: F) -> Result<AgentOutput, AgentError>
where
    F: FnOnce() -> AgentOutput + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AgentError::Failed(format!("agent worker panicked: {}", e)))
}

/// Registry with every local agent rooted at `root`, overridden by `external`.
///
/// External entries with an unknown agent type are skipped with a warning.
pub fn build_agent_registry(root: impl Into<PathBuf>, external: &[FileExternalAgent]) -> AgentRegistry {
    let root = root.into();
    let mut registry = AgentRegistry::new()
        .with(Arc::new(CodeLocator::new(root.clone())))
        .with(Arc::new(DocumentationLocator::new(root.clone())))
        .with(Arc::new(PatternFinder::new(root.clone())))
        .with(Arc::new(CodebaseAnalyzer::new(root.clone())))
        .with(Arc::new(ResearchAnalyzer::new(root)));

    for entry in external {
        match entry.agent_type.parse::<AgentType>() {
            Ok(agent_type) => {
                debug!("Using external {} agent: {}", agent_type, entry.command);
                registry.register(Arc::new(
                    ExternalCommandAgent::new(agent_type, &entry.command)
                        .with_args(entry.args.clone())
                        .with_env(entry.env.clone()),
                ));
            }
            Err(e) => warn!("Skipping external agent: {}", e),
        }
    }
    registry
}
