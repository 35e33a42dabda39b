//! Port for persisting execution reports.

use conductor_domain::ExecutionReport;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportStoreError {
    #[error("I/O error for {path}: {message}")]
    Io { path: String, message: String },

    #[error("Report {path} is not valid: {message}")]
    Format { path: String, message: String },
}

/// Saves a report so the report-display path can load it later.
pub trait ReportStore: Send + Sync {
    fn save(&self, report: &ExecutionReport, path: &Path) -> Result<(), ReportStoreError>;

    fn load(&self, path: &Path) -> Result<ExecutionReport, ReportStoreError>;
}
