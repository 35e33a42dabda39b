//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod agents;
mod execution;
mod gates;
mod logging;
mod output;
mod research;

pub use agents::{FileAgentsConfig, FileExternalAgent};
pub use execution::{FileExecutionConfig, FileRetryConfig};
pub use gates::FileGatesConfig;
pub use logging::FileLoggingConfig;
pub use output::FileOutputConfig;
pub use research::FileResearchConfig;

use conductor_application::ExecutionParams;
use conductor_domain::{AgentType, ResearchDepth, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// A problem found in a loaded configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub severity: Severity,
    /// Dotted key of the offending value, e.g. `retry.max_attempts`
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Plan execution settings
    pub execution: FileExecutionConfig,
    /// Default retry policy
    pub retry: FileRetryConfig,
    /// Quality gate settings
    pub gates: FileGatesConfig,
    /// Agent coordination settings
    pub agents: FileAgentsConfig,
    /// Research pipeline settings
    pub research: FileResearchConfig,
    /// Log file locations
    pub logging: FileLoggingConfig,
    /// Terminal output settings
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Errors make the configuration unusable; warnings name values that
    /// fall back to a default.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.execution.default_timeout_secs == 0 {
            issues.push(ConfigIssue::error(
                "execution.default_timeout_secs",
                "timeout cannot be 0",
            ));
        }
        if !self.retry.to_retry_policy().is_valid() {
            issues.push(ConfigIssue::error(
                "retry",
                format!(
                    "max_attempts must be at least 1 and backoff_multiplier positive (got {} and {})",
                    self.retry.max_attempts, self.retry.backoff_multiplier
                ),
            ));
        }
        if self.agents.max_concurrency == 0 {
            issues.push(ConfigIssue::error(
                "agents.max_concurrency",
                "max_concurrency cannot be 0",
            ));
        }
        if self.agents.timeout_secs == 0 {
            issues.push(ConfigIssue::error("agents.timeout_secs", "timeout cannot be 0"));
        }

        let mut seen = HashSet::new();
        for gate in &self.gates.gate {
            if !seen.insert(gate.id.as_str()) {
                issues.push(ConfigIssue::error(
                    "gates.gate",
                    format!("duplicate gate id '{}'", gate.id),
                ));
            }
            if gate.command.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    "gates.gate",
                    format!("gate '{}' has an empty command", gate.id),
                ));
            }
        }

        for external in &self.agents.external {
            if external.agent_type.parse::<AgentType>().is_err() {
                issues.push(ConfigIssue::error(
                    "agents.external",
                    format!("unknown agent type '{}'", external.agent_type),
                ));
            }
            if external.command.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    "agents.external",
                    format!("external agent '{}' has an empty command", external.agent_type),
                ));
            }
        }

        for (field, names) in [
            ("research.discovery_agents", &self.research.discovery_agents),
            ("research.analysis_agents", &self.research.analysis_agents),
        ] {
            for unknown in FileResearchConfig::parse_agents(names).1 {
                issues.push(ConfigIssue::warning(
                    field,
                    format!("unknown agent '{}' is ignored", unknown),
                ));
            }
        }
        if self.research.depth.parse::<ResearchDepth>().is_err() {
            issues.push(ConfigIssue::warning(
                "research.depth",
                format!(
                    "unknown depth '{}', falling back to '{}'",
                    self.research.depth,
                    ResearchDepth::default().as_str()
                ),
            ));
        }

        issues
    }

    /// Build use case run control from this configuration.
    pub fn to_execution_params(&self) -> ExecutionParams {
        let mut params = ExecutionParams::default()
            .with_continue_on_error(self.execution.continue_on_error)
            .with_default_timeout(Duration::from_secs(self.execution.default_timeout_secs))
            .with_default_retry(self.retry.to_retry_policy())
            .with_max_concurrency(self.agents.max_concurrency)
            .with_agent_timeout(Duration::from_secs(self.agents.timeout_secs));
        if let Some(dir) = &self.execution.working_dir {
            params = params.with_working_dir(dir);
        }
        params
    }
}
