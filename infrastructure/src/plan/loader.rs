//! Loads plans and gate lists from JSON or TOML files.
//!
//! The format follows the file extension. Files with any other extension
//! are tried as JSON first, then TOML.

use conductor_domain::{Plan, QualityGate};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PlanLoadError {
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse {path} as {format}: {message}")]
    Parse {
        path: String,
        format: PlanFormat,
        message: String,
    },

    #[error("{path} is neither valid JSON nor valid TOML")]
    UnsupportedFormat { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Json,
    Toml,
}

impl PlanFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(PlanFormat::Json),
            "toml" => Some(PlanFormat::Toml),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PlanFormat::Json => "JSON",
            PlanFormat::Toml => "TOML",
        }
    }
}

impl std::fmt::Display for PlanFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A standalone gate file: `{"gates": [...]}` or `[[gate]]` tables.
#[derive(Debug, Deserialize)]
struct GateFile {
    #[serde(alias = "gate", alias = "quality_gates")]
    gates: Vec<QualityGate>,
}

pub struct PlanLoader;

impl PlanLoader {
    pub fn load(path: &Path) -> Result<Plan, PlanLoadError> {
        let plan: Plan = Self::load_file(path)?;
        debug!(
            "Loaded plan '{}' with {} tasks from {}",
            plan.id,
            plan.task_count(),
            path.display()
        );
        Ok(plan)
    }

    pub fn load_gates(path: &Path) -> Result<Vec<QualityGate>, PlanLoadError> {
        let file: GateFile = Self::load_file(path)?;
        Ok(file.gates)
    }

    pub fn parse<T: DeserializeOwned>(
        content: &str,
        format: PlanFormat,
        path: &Path,
    ) -> Result<T, PlanLoadError> {
        let result = match format {
            PlanFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            PlanFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        };
        result.map_err(|message| PlanLoadError::Parse {
            path: path.display().to_string(),
            format,
            message,
        })
    }

    fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T, PlanLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| PlanLoadError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        match PlanFormat::from_path(path) {
            Some(format) => Self::parse(&content, format, path),
            None => Self::parse(&content, PlanFormat::Json, path)
                .or_else(|_| Self::parse(&content, PlanFormat::Toml, path))
                .map_err(|_| PlanLoadError::UnsupportedFormat {
                    path: path.display().to_string(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::{GateType, TaskAction};
    use std::fs;

    const JSON_PLAN: &str = r#"{
        "id": "release",
        "title": "Release",
        "phases": [
            {
                "id": "build",
                "name": "Build",
                "tasks": [
                    {"id": "compile", "title": "Compile", "command": "cargo build"},
                    {"id": "package", "title": "Package", "command": "tar czf out.tgz target",
                     "depends_on": ["compile"], "retry": {"max_attempts": 3}}
                ]
            }
        ],
        "tasks": [
            {"id": "review", "title": "Review", "dependencies": ["package"],
             "agent": {"type": "codebase-analyzer", "parameters": {"depth": "deep"}}}
        ]
    }"#;

    const TOML_PLAN: &str = r#"
id = "lint-only"
title = "Lint"

[[tasks]]
id = "fmt"
title = "Format check"
command = "cargo fmt --check"
timeout_secs = 60

[[quality_gates]]
id = "tests"
type = "tests"
command = "cargo test"
"#;

    #[test]
    fn test_load_json_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        fs::write(&path, JSON_PLAN).unwrap();

        let plan = PlanLoader::load(&path).unwrap();
        assert_eq!(plan.id, "release");
        assert_eq!(plan.task_count(), 3);

        let tasks = plan.tasks_in_order();
        assert_eq!(tasks[1].dependencies[0].as_str(), "compile");
        assert_eq!(tasks[1].retry.as_ref().unwrap().max_attempts, 3);
        assert!(matches!(tasks[2].action(), TaskAction::Agent(_)));
        assert!(plan.quality_gates.is_none());
    }

    #[test]
    fn test_load_toml_plan_with_gates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.toml");
        fs::write(&path, TOML_PLAN).unwrap();

        let plan = PlanLoader::load(&path).unwrap();
        assert_eq!(plan.tasks[0].timeout_secs, Some(60));
        let gates = plan.quality_gates.unwrap();
        assert_eq!(gates.len(), 1);
        assert_eq!(gates[0].gate_type, GateType::Tests);
    }

    #[test]
    fn test_unknown_extension_tries_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("plan.txt");
        fs::write(&json, JSON_PLAN).unwrap();
        let toml = dir.path().join("plan.conf");
        fs::write(&toml, TOML_PLAN).unwrap();
        let junk = dir.path().join("plan.dat");
        fs::write(&junk, "not a plan at all {").unwrap();

        assert_eq!(PlanLoader::load(&json).unwrap().id, "release");
        assert_eq!(PlanLoader::load(&toml).unwrap().id, "lint-only");
        assert!(matches!(
            PlanLoader::load(&junk),
            Err(PlanLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_parse_error_names_file_and_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, r#"{"title": "no id"}"#).unwrap();

        let err = PlanLoader::load(&path).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("broken.json"));
        assert!(text.contains("JSON"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PlanLoader::load(Path::new("/no/such/plan.json")).unwrap_err();
        assert!(matches!(err, PlanLoadError::Io { .. }));
    }

    #[test]
    fn test_load_gate_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gates.toml");
        fs::write(
            &path,
            r#"
[[gate]]
id = "lint"
type = "lint"
command = "npm run lint"

[[gate]]
id = "types"
type = "types"
command = "tsc --noEmit"
"#,
        )
        .unwrap();

        let gates = PlanLoader::load_gates(&path).unwrap();
        assert_eq!(gates.len(), 2);
        assert_eq!(gates[1].gate_type, GateType::Types);
    }
}
