//! Output formatter trait

use conductor_domain::ExecutionReport;

/// Trait for formatting execution reports
pub trait OutputFormatter {
    /// Format the complete report
    fn format(&self, report: &ExecutionReport) -> String;

    /// Format counts and the first blocking error only
    fn format_summary(&self, report: &ExecutionReport) -> String;

    /// Format as JSON
    fn format_json(&self, report: &ExecutionReport) -> String;
}
