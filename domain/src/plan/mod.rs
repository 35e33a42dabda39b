//! Plan domain
//!
//! A [`Plan`](entities::Plan) is a declarative unit of work: ordered phases
//! of [`Task`](task::Task)s with dependency edges, plus optional quality
//! gates. This module owns the pure parts of plan execution:
//!
//! - [`resolver::DependencyResolver`]: deterministic execution order with
//!   full cycle reporting
//! - [`validation`]: structural checks run before any execution begins
//! - [`result::TaskResult`]: the per-task state machine record
//!
//! # Task State Machine
//!
//! ```text
//!   Pending ──► Running ──┬──► Completed
//!      │                  └──► Failed
//!      └──────────────────────► Skipped   (dependency unsatisfied)
//! ```

pub mod entities;
pub mod resolver;
pub mod result;
pub mod task;
pub mod validation;

pub use entities::{Plan, PlanPhase};
pub use resolver::{DependencyNode, DependencyResolver};
pub use result::{TaskResult, TaskStatus};
pub use task::{AgentRef, Complexity, RetryPolicy, Task, TaskAction, TaskId};
pub use validation::{IssueCode, Severity, ValidationIssue, ValidationReport, validate_plan};
