//! Execution parameters: use case run control.
//!
//! [`ExecutionParams`] groups the static parameters that control how
//! [`TaskExecutor`](crate::use_cases::execute_task::TaskExecutor),
//! [`PlanRunner`](crate::use_cases::run_plan::PlanRunner) and
//! [`AgentCoordinator`](crate::use_cases::coordinate_agents::AgentCoordinator)
//! behave. These are application-layer concerns, not domain policy.

use conductor_domain::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Run control parameters.
///
/// | Use case | Fields used |
/// |----------|-------------|
/// | TaskExecutor | dry_run, default_timeout, default_retry, working_dir |
/// | PlanRunner | continue_on_error |
/// | QualityGateRunner | dry_run, working_dir |
/// | AgentCoordinator | max_concurrency, agent_timeout, working_dir |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionParams {
    /// Keep attempting tasks whose dependencies are still satisfiable after a failure.
    pub continue_on_error: bool,
    /// Simulate every action instead of running it.
    pub dry_run: bool,
    /// Timeout for tasks that declare none.
    pub default_timeout: Duration,
    /// Retry policy for tasks that declare none.
    pub default_retry: RetryPolicy,
    /// Working directory for commands and agents.
    pub working_dir: Option<PathBuf>,
    /// Maximum agent calls in flight at once.
    pub max_concurrency: usize,
    /// Timeout for agent tasks that declare none.
    pub agent_timeout: Duration,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            dry_run: false,
            default_timeout: Duration::from_secs(300),
            default_retry: RetryPolicy::default(),
            working_dir: None,
            max_concurrency: 4,
            agent_timeout: Duration::from_secs(120),
        }
    }
}

impl ExecutionParams {
    // ==================== Builder Methods ====================

    pub fn with_continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    pub fn with_dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_default_retry(mut self, retry: RetryPolicy) -> Self {
        self.default_retry = retry;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }
}
