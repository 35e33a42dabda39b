//! Application layer for conductor
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::ExecutionParams;
pub use ports::{
    agent::{AgentError, AgentPort, AgentRegistry, AgentRequest},
    command_runner::{CommandError, CommandOutput, CommandRunner, CommandSpec},
    events::{EventBus, EventEnvelope, OrchestrationEvent},
    progress::{ExecutionProgressNotifier, NoProgress},
    report_store::{ReportStore, ReportStoreError},
};
pub use use_cases::coordinate_agents::{AgentCoordinator, CoordinationError, CoordinationResult};
pub use use_cases::execute_task::{ExecuteTaskError, TaskExecutor};
pub use use_cases::run_plan::{PlanRunner, RunPlanError, RunPlanInput};
pub use use_cases::run_quality_gates::QualityGateRunner;
pub use use_cases::run_research::{ResearchError, ResearchOrchestrator};
