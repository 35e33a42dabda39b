//! Application-level configuration.
//!
//! - [`ExecutionParams`]: run control (continue-on-error, dry-run, timeouts,
//!   retry defaults, agent concurrency)

pub mod execution_params;

pub use execution_params::ExecutionParams;
