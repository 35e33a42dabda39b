//! Execution configuration from TOML (`[execution]` and `[retry]` sections)

use conductor_domain::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw execution configuration from TOML
///
/// # Example
///
/// ```toml
/// [execution]
/// continue_on_error = false
/// default_timeout_secs = 300
/// working_dir = "."
/// report_output = "reports/last-run.json"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileExecutionConfig {
    /// Keep attempting independent tasks after a failure
    pub continue_on_error: bool,
    /// Timeout for tasks that declare none
    pub default_timeout_secs: u64,
    /// Working directory for commands and agents
    pub working_dir: Option<PathBuf>,
    /// Where to save the execution report
    pub report_output: Option<PathBuf>,
}

impl Default for FileExecutionConfig {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            default_timeout_secs: 300,
            working_dir: None,
            report_output: None,
        }
    }
}

/// Raw retry defaults from TOML, applied to tasks without their own policy
///
/// ```toml
/// [retry]
/// max_attempts = 3
/// base_delay_ms = 1000
/// backoff_multiplier = 2.0
/// retry_on_timeout = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub retry_on_timeout: bool,
}

impl Default for FileRetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay_ms,
            backoff_multiplier: policy.backoff_multiplier,
            retry_on_timeout: policy.retry_on_timeout,
        }
    }
}

impl FileRetryConfig {
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            backoff_multiplier: self.backoff_multiplier,
            retry_on_timeout: self.retry_on_timeout,
        }
    }
}
