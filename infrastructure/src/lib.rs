//! Infrastructure layer for conductor
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, plus configuration and plan file loading.

pub mod agents;
pub mod config;
pub mod logging;
pub mod plan;
pub mod process;
pub mod report;

// Re-export commonly used types
pub use agents::{
    CodeLocator, CodebaseAnalyzer, DocumentationLocator, ExternalCommandAgent, PatternFinder,
    ResearchAnalyzer, build_agent_registry,
};
pub use config::{ConfigIssue, ConfigLoader, FileConfig};
pub use logging::JsonlEventLogger;
pub use plan::{PlanFormat, PlanLoadError, PlanLoader};
pub use process::TokioCommandRunner;
pub use report::JsonReportStore;
