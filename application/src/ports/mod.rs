//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod agent;
pub mod command_runner;
pub mod events;
pub mod progress;
pub mod report_store;
