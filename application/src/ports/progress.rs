//! Progress notification port
//!
//! Defines the interface for reporting progress while a plan and its quality
//! gates execute. Every method has a no-op default so implementations only
//! override what they display.

use conductor_domain::{
    ExecutionReport, GateResult, Plan, QualityGate, QualityGateReport, Task, TaskResult,
};
use std::time::Duration;

/// Callback for progress updates during plan execution
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (progress bars, plain lines, JSON).
pub trait ExecutionProgressNotifier: Send + Sync {
    /// Called once the execution order is known
    fn on_plan_start(&self, _plan: &Plan, _total_tasks: usize) {}

    /// Called before the first attempt of a task
    fn on_task_start(&self, _task: &Task, _index: usize, _total: usize) {}

    /// Called before a retry attempt, after the backoff delay is known
    fn on_task_retry(&self, _task: &Task, _attempt: u32, _max_attempts: u32, _delay: Duration) {}

    /// Called when a task reaches a terminal state
    fn on_task_complete(&self, _task: &Task, _result: &TaskResult) {}

    fn on_gates_start(&self, _total: usize) {}

    fn on_gate_start(&self, _gate: &QualityGate) {}

    fn on_gate_complete(&self, _result: &GateResult) {}

    fn on_gates_complete(&self, _report: &QualityGateReport) {}

    fn on_plan_complete(&self, _report: &ExecutionReport) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ExecutionProgressNotifier for NoProgress {}
