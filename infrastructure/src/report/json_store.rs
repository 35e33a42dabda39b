//! Pretty-printed JSON report files.

use conductor_application::{ReportStore, ReportStoreError};
use conductor_domain::ExecutionReport;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportStore;

impl JsonReportStore {
    pub fn new() -> Self {
        Self
    }
}

fn io_error(path: &Path, e: std::io::Error) -> ReportStoreError {
    ReportStoreError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

impl ReportStore for JsonReportStore {
    fn save(&self, report: &ExecutionReport, path: &Path) -> Result<(), ReportStoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        let json = serde_json::to_string_pretty(report).map_err(|e| ReportStoreError::Format {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        fs::write(path, json).map_err(|e| io_error(path, e))?;
        info!("Saved execution report to {}", path.display());
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<ExecutionReport, ReportStoreError> {
        let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        serde_json::from_str(&content).map_err(|e| ReportStoreError::Format {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}
