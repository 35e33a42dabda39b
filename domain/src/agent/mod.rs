//! Agent domain
//!
//! Agents are opaque capability providers called through one uniform
//! contract: `(context, parameters) -> AgentOutput`. The set of agent kinds
//! is closed ([`AgentType`]); each kind has exactly one implementation,
//! registered at startup.

pub mod task;
pub mod types;

pub use task::{AgentInput, AgentOutput, AgentStatus, AgentTask, AgentTaskResult, ExecutionStrategy};
pub use types::AgentType;
