//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod coordinate_agents;
pub mod execute_task;
pub mod run_plan;
pub mod run_quality_gates;
pub mod run_research;
pub(crate) mod shared;
#[cfg(test)]
pub(crate) mod test_support;
