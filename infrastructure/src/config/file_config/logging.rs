//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw logging configuration from TOML
///
/// ```toml
/// [logging]
/// log_dir = "~/.local/state/conductor"   # daily rolling conductor.log
/// event_log = "events.jsonl"             # orchestration events, one JSON per line
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    pub log_dir: Option<PathBuf>,
    pub event_log: Option<PathBuf>,
}
