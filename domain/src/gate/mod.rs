//! Quality gate domain
//!
//! Gates are named validation steps executed in a fixed canonical order:
//!
//! ```text
//! lint → types → tests → build → integration → deploy → custom
//! ```
//!
//! The declared order of gates is irrelevant; runners always re-sort with
//! [`sort_by_priority`].

pub mod defaults;
pub mod entities;
pub mod evaluation;

pub use defaults::default_gates;
pub use entities::{
    FailurePolicy, GateResult, GateRunStatus, GateStatus, GateType, QualityGate, QualityGateReport,
    sort_by_priority,
};
pub use evaluation::{GateVerdict, evaluate_gate_output};
