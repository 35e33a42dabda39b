//! Domain layer for conductor
//!
//! This crate contains the core entities and algorithms of plan orchestration.
//! It has no dependencies on infrastructure, async runtimes or presentation
//! concerns.
//!
//! # Core Concepts
//!
//! ## Plans
//!
//! A [`Plan`] is a set of [`Task`]s with declared dependencies. The
//! [`DependencyResolver`] turns it into a deterministic execution order and
//! rejects cycles, naming every task involved.
//!
//! ## Quality Gates
//!
//! [`QualityGate`]s run after a plan in a fixed canonical order
//! (lint → types → tests → build → integration → deploy → custom).
//!
//! ## Agents and Aggregation
//!
//! Agents are opaque workers of a closed set of [`AgentType`]s. Their outputs
//! are combined by [`aggregate`] under an [`AggregationStrategy`] into one
//! confidence-scored result.
//!
//! ## Research
//!
//! A three-phase pipeline (discovery → analysis → synthesis) whose final
//! confidence never exceeds the weakest contributing phase.

pub mod agent;
pub mod aggregation;
pub mod core;
pub mod gate;
pub mod plan;
pub mod report;
pub mod research;

// Re-export commonly used types
pub use agent::{
    AgentInput, AgentOutput, AgentStatus, AgentTask, AgentTaskResult, AgentType,
    ExecutionStrategy,
};
pub use aggregation::{
    AggregatedFinding, AggregatedResult, AggregationKind, AggregationStrategy, ConfidenceLevel,
    ConflictRecord, ConflictRule, Finding, aggregate,
};
pub use core::error::{DomainError, TaskError, TaskErrorKind};
pub use gate::{
    FailurePolicy, GateResult, GateRunStatus, GateStatus, GateType, QualityGate,
    QualityGateReport, default_gates, evaluate_gate_output, sort_by_priority,
};
pub use plan::{
    AgentRef, Complexity, DependencyNode, DependencyResolver, IssueCode, Plan, PlanPhase,
    RetryPolicy, Severity, Task, TaskAction, TaskId, TaskResult, TaskStatus, ValidationIssue,
    ValidationReport, validate_plan,
};
pub use report::{ExecutionReport, FailureDetail, FailureSource, ReportSummary, RunInfo, RunStatus};
pub use research::{
    AnalysisPayload, AnalysisResult, Contribution, DateRange, DiscoveryPayload, DiscoveryResult,
    ResearchConstraints, ResearchDepth, ResearchPhase, ResearchQuery, ResearchReport,
    ResearchScope, SourceStats, SynthesisReport, merge_discovery, synthesize,
};
