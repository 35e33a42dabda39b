//! Quality gate entities

use crate::core::error::TaskError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Kind of validation a gate performs. Also fixes its position in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateType {
    Lint,
    #[serde(alias = "typecheck", alias = "type-check")]
    Types,
    Tests,
    Build,
    Integration,
    Deploy,
    Custom,
}

impl GateType {
    /// Canonical pipeline position (lower runs first).
    pub fn priority(&self) -> u8 {
        match self {
            GateType::Lint => 0,
            GateType::Types => 1,
            GateType::Tests => 2,
            GateType::Build => 3,
            GateType::Integration => 4,
            GateType::Deploy => 5,
            GateType::Custom => 6,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GateType::Lint => "lint",
            GateType::Types => "types",
            GateType::Tests => "tests",
            GateType::Build => "build",
            GateType::Integration => "integration",
            GateType::Deploy => "deploy",
            GateType::Custom => "custom",
        }
    }
}

impl std::fmt::Display for GateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lint" => Ok(GateType::Lint),
            "types" | "typecheck" | "type-check" => Ok(GateType::Types),
            "tests" | "test" => Ok(GateType::Tests),
            "build" => Ok(GateType::Build),
            "integration" => Ok(GateType::Integration),
            "deploy" => Ok(GateType::Deploy),
            "custom" => Ok(GateType::Custom),
            _ => Err(format!(
                "Unknown gate type: {}. Valid: lint, types, tests, build, integration, deploy, custom",
                s
            )),
        }
    }
}

/// How an optional gate behaves around failures.
///
/// Required gates always halt the pipeline when they fail and ignore the
/// policy. Optional gates never halt it.
///
/// - `Warn`: run, record a failure, log a warning and continue
/// - `Skip`: do not run this gate at all once an earlier gate has failed
///
/// `stop` is accepted as a spelling of `warn` for older gate files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    #[serde(alias = "stop")]
    Warn,
    Skip,
}

/// A named validation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub gate_type: GateType,
    pub command: String,
    #[serde(default = "default_gate_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_gate_timeout() -> u64 {
    300
}

fn default_required() -> bool {
    true
}

impl QualityGate {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        gate_type: GateType,
        command: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gate_type,
            command: command.into(),
            timeout_secs: default_gate_timeout(),
            required: true,
            failure_policy: FailurePolicy::Warn,
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn optional(mut self, policy: FailurePolicy) -> Self {
        self.required = false;
        self.failure_policy = policy;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Whether a failure of this gate halts the remaining pipeline.
    pub fn halts_on_failure(&self) -> bool {
        self.required
    }

    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Re-sort gates into canonical priority order.
///
/// The sort is stable, so gates of the same type keep their declared order.
pub fn sort_by_priority(gates: &[QualityGate]) -> Vec<QualityGate> {
    let mut sorted = gates.to_vec();
    sorted.sort_by_key(|g| g.gate_type.priority());
    sorted
}

/// Outcome of a single gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Passed,
    Failed,
    Skipped,
}

impl GateStatus {
    pub fn as_str(&self) -> &str {
        match self {
            GateStatus::Passed => "passed",
            GateStatus::Failed => "failed",
            GateStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of running one gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_id: String,
    pub name: String,
    pub gate_type: GateType,
    pub required: bool,
    pub status: GateStatus,
    pub command: String,
    pub exit_code: Option<i32>,
    pub output: String,
    pub duration_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub error: Option<TaskError>,
}

impl GateResult {
    pub fn new(gate: &QualityGate, status: GateStatus) -> Self {
        Self {
            gate_id: gate.id.clone(),
            name: gate.label().to_string(),
            gate_type: gate.gate_type,
            required: gate.required,
            status,
            command: gate.command.clone(),
            exit_code: None,
            output: String::new(),
            duration_ms: 0,
            started_at: None,
            error: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == GateStatus::Passed
    }

    pub fn failed(&self) -> bool {
        self.status == GateStatus::Failed
    }
}

/// Overall status of a gate pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateRunStatus {
    Passed,
    Failed,
}

/// Result of running the whole gate pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGateReport {
    pub status: GateRunStatus,
    pub results: Vec<GateResult>,
    /// Id of the gate whose failure halted the pipeline
    pub halted_by: Option<String>,
    pub duration_ms: u64,
}

impl QualityGateReport {
    /// Build a report. Passed only if zero gate failures occurred,
    /// independent of which gates were required.
    pub fn from_results(results: Vec<GateResult>, halted_by: Option<String>, duration_ms: u64) -> Self {
        let status = if results.iter().any(|r| r.failed()) {
            GateRunStatus::Failed
        } else {
            GateRunStatus::Passed
        };
        Self {
            status,
            results,
            halted_by,
            duration_ms,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == GateRunStatus::Passed
    }

    pub fn count(&self, status: GateStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn first_failure(&self) -> Option<&GateResult> {
        self.results.iter().find(|r| r.failed())
    }
}
