//! Quality gate configuration from TOML (`[gates]` section)

use conductor_domain::{QualityGate, default_gates};
use serde::{Deserialize, Serialize};

/// Raw gate configuration from TOML
///
/// Declared gates replace the default set. Without any declared gate the
/// default six-gate set applies unless `use_defaults = false`.
///
/// ```toml
/// [gates]
/// use_defaults = true
///
/// [[gates.gate]]
/// id = "lint"
/// type = "lint"
/// command = "cargo clippy -- -D warnings"
/// timeout_secs = 120
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGatesConfig {
    pub use_defaults: bool,
    #[serde(alias = "gates")]
    pub gate: Vec<QualityGate>,
}

impl Default for FileGatesConfig {
    fn default() -> Self {
        Self {
            use_defaults: true,
            gate: Vec::new(),
        }
    }
}

impl FileGatesConfig {
    /// The gates to run, or `None` when gates are disabled.
    pub fn resolve(&self) -> Option<Vec<QualityGate>> {
        if !self.gate.is_empty() {
            Some(self.gate.clone())
        } else if self.use_defaults {
            Some(default_gates())
        } else {
            None
        }
    }
}
