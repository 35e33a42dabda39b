//! Console output formatter for execution, gate and research reports

use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use conductor_domain::{
    ExecutionReport, GateStatus, Plan, QualityGateReport, ResearchReport, RunStatus, TaskResult,
    TaskStatus, ValidationReport,
};
use serde::Serialize;

/// Lines of captured output shown under a failed task or gate
const FAILURE_OUTPUT_LINES: usize = 20;

/// Formats reports for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete execution report
    pub fn format_report(report: &ExecutionReport) -> String {
        let mut output = String::new();

        let title = if report.dry_run {
            "Execution Report (dry run)"
        } else {
            "Execution Report"
        };
        output.push_str(&Self::header(title));
        output.push('\n');

        output.push_str(&format!(
            "{} {} ({})\n",
            "Plan:".cyan().bold(),
            report.plan_title,
            report.plan_id
        ));
        output.push_str(&format!(
            "{} {}\n",
            "Started:".cyan().bold(),
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str(&format!(
            "{} {}\n",
            "Duration:".cyan().bold(),
            Self::duration(report.duration_ms)
        ));

        output.push_str(&Self::section_header("Tasks"));
        for result in &report.task_results {
            output.push_str(&Self::task_line(result));
            if result.is_failed() && !result.output.trim().is_empty() {
                output.push_str(&Self::indent(
                    &Self::last_lines(&result.output, FAILURE_OUTPUT_LINES),
                    "      ",
                ));
                output.push('\n');
            }
        }
        if report.summary.not_run > 0 {
            output.push_str(&format!(
                "  {} {} task(s) not run\n",
                "-".dimmed(),
                report.summary.not_run
            ));
        }

        if let Some(gates) = &report.gate_report {
            output.push_str(&Self::format_gates(gates));
        }

        if let Some(failure) = &report.first_failure {
            output.push_str(&Self::section_header("First Failure"));
            output.push_str(&format!(
                "{} {} {}\n",
                "x".red(),
                failure.id.bold(),
                format!("({:?})", failure.source).to_lowercase().dimmed()
            ));
            if let Some(command) = &failure.command {
                output.push_str(&format!("  {} {}\n", "command:".dimmed(), command));
            }
            output.push_str(&format!("  {} {}\n", "error:".dimmed(), failure.error));
        }

        output.push('\n');
        output.push_str(&Self::summary_line(report));
        output.push_str(&Self::footer());

        output
    }

    /// Format counts and the first blocking error only
    pub fn format_report_summary(report: &ExecutionReport) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}\n\n",
            format!("=== {} ===", report.plan_title).cyan().bold()
        ));
        output.push_str(&Self::summary_line(report));

        let summary = &report.summary;
        output.push_str(&format!(
            "  tasks: {} completed, {} failed, {} skipped, {} not run (of {})\n",
            summary.completed, summary.failed, summary.skipped, summary.not_run, summary.total_tasks
        ));
        if report.gate_report.is_some() {
            output.push_str(&format!(
                "  gates: {} passed, {} failed, {} skipped\n",
                summary.gates_passed, summary.gates_failed, summary.gates_skipped
            ));
        }
        if let Some(failure) = &report.first_failure {
            output.push_str(&format!("  {} {}: {}\n", "first failure".red(), failure.id, failure.error));
        }

        output
    }

    /// Format a gate pipeline run
    pub fn format_gates(report: &QualityGateReport) -> String {
        let mut output = Self::section_header("Quality Gates");

        for result in &report.results {
            let marker = match result.status {
                GateStatus::Passed => "v".green(),
                GateStatus::Failed if result.required => "x".red(),
                GateStatus::Failed => "!".yellow(),
                GateStatus::Skipped => "-".dimmed(),
            };
            let mut line = format!("  {} {} [{}]", marker, result.name.bold(), result.gate_type);
            if !result.required {
                line.push_str(&format!(" {}", "(optional)".dimmed()));
            }
            if result.status != GateStatus::Skipped {
                line.push_str(&format!(" {}", Self::duration(result.duration_ms).dimmed()));
            }
            output.push_str(&line);
            output.push('\n');

            if let Some(error) = &result.error {
                output.push_str(&format!("      {}\n", error.message.red()));
            }
            if result.failed() && !result.output.trim().is_empty() {
                output.push_str(&Self::indent(
                    &Self::last_lines(&result.output, FAILURE_OUTPUT_LINES),
                    "      ",
                ));
                output.push('\n');
            }
        }

        if let Some(halted_by) = &report.halted_by {
            output.push_str(&format!(
                "  {} pipeline halted by '{}'\n",
                "!".red().bold(),
                halted_by
            ));
        }

        output
    }

    /// Format plan validation issues
    pub fn format_validation(plan: &Plan, report: &ValidationReport) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{} {} ({} tasks)\n",
            "Plan:".cyan().bold(),
            plan.display_title(),
            plan.task_count()
        ));

        for issue in report.errors() {
            output.push_str(&format!("  {} {}\n", "error:".red().bold(), issue));
        }
        for issue in report.warnings() {
            output.push_str(&format!("  {} {}\n", "warning:".yellow().bold(), issue));
        }

        let verdict = if report.has_errors() {
            "invalid".red().bold()
        } else {
            "valid".green().bold()
        };
        output.push_str(&format!(
            "\n{} ({} error(s), {} warning(s))\n",
            verdict,
            report.error_count(),
            report.warning_count()
        ));

        output
    }

    /// Format a research report
    pub fn format_research(report: &ResearchReport) -> String {
        let mut output = String::new();
        let synthesis = &report.synthesis;

        output.push_str(&Self::header("Research Report"));
        output.push('\n');

        output.push_str(&format!("{} {}\n", "Query:".cyan().bold(), report.query.text));
        output.push_str(&format!(
            "{} {} / {}\n",
            "Scope:".cyan().bold(),
            report.query.scope,
            report.query.depth
        ));
        output.push_str(&format!(
            "{} {} ({:.2})\n\n",
            "Confidence:".cyan().bold(),
            synthesis.confidence,
            synthesis.confidence_score
        ));

        output.push_str(&synthesis.summary);
        output.push('\n');

        let discovery = &report.discovery;
        if !discovery.is_empty() {
            output.push_str(&Self::section_header("Discovery"));
            for file in &discovery.files {
                output.push_str(&format!("  {:.2}  {}\n", file.relevance, file.path));
            }
            for doc in &discovery.docs {
                let title = if doc.title.is_empty() { &doc.path } else { &doc.title };
                output.push_str(&format!("  {:.2}  {} {}\n", doc.relevance, title, format!("({})", doc.path).dimmed()));
            }
            if !discovery.patterns.is_empty() {
                output.push_str(&format!("  {} pattern match(es)\n", discovery.patterns.len()));
            }
        }
        for source in report
            .discovery
            .failed_sources()
            .chain(report.analysis.sources.iter().filter(|s| !s.success))
        {
            output.push_str(&format!(
                "  {} {} failed: {}\n",
                "x".red(),
                source.agent_type,
                source.error.as_deref().unwrap_or("unknown error")
            ));
        }

        for section in &synthesis.sections {
            output.push_str(&Self::section_header(&format!(
                "{} ({})",
                section.category, section.top_impact
            )));
            for id in &section.insight_ids {
                if let Some(insight) = report.analysis.insight(id) {
                    output.push_str(&format!(
                        "  * {} {}\n",
                        insight.title,
                        format!("[{}]", insight.impact).dimmed()
                    ));
                }
            }
        }

        if !synthesis.risks.is_empty() {
            output.push_str(&format!("\n{}\n", "Risks:".red().bold()));
            for risk in &synthesis.risks {
                output.push_str(&format!("  * {:.2}  {}\n", risk.score, risk.description));
            }
        }

        if !synthesis.recommendations.is_empty() {
            output.push_str(&format!("\n{}\n", "Recommendations:".green().bold()));
            for rec in &synthesis.recommendations {
                output.push_str(&format!(
                    "  * {} {}\n",
                    format!("[{}]", rec.horizon).yellow(),
                    rec.title
                ));
            }
        }

        if !synthesis.open_questions.is_empty() {
            output.push_str(&format!("\n{}\n", "Open Questions:".yellow().bold()));
            for question in &synthesis.open_questions {
                output.push_str(&format!("  * {}\n", question));
            }
        }

        output.push_str(&format!(
            "\n{} {}\n",
            "Completed in".dimmed(),
            Self::duration(report.duration_ms)
        ));
        output.push_str(&Self::footer());

        output
    }

    /// Format any report as pretty JSON
    pub fn format_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }

    fn task_line(result: &TaskResult) -> String {
        let marker = match result.status {
            TaskStatus::Completed => "v".green(),
            TaskStatus::Failed => "x".red(),
            TaskStatus::Skipped => "-".yellow(),
            TaskStatus::Pending | TaskStatus::Running => "?".dimmed(),
        };
        let mut line = format!("  {} {}", marker, result.task_id.as_str().bold());
        if result.attempts > 1 {
            line.push_str(&format!(" ({} attempts)", result.attempts));
        }
        if result.status != TaskStatus::Skipped {
            line.push_str(&format!(" {}", Self::duration(result.duration_ms).dimmed()));
        }
        match result.status {
            TaskStatus::Completed if !result.output.is_empty() && result.exit_code.is_none() => {
                // Dry runs and agents report a one-line description
                if let Some(first) = result.output.lines().next() {
                    line.push_str(&format!(" {}", first.dimmed()));
                }
            }
            _ => {}
        }
        line.push('\n');
        if let Some(message) = result.error_message() {
            let message = if result.is_skipped() {
                message.yellow()
            } else {
                message.red()
            };
            line.push_str(&format!("      {}\n", message));
        }
        line
    }

    fn summary_line(report: &ExecutionReport) -> String {
        let status = match report.status {
            RunStatus::Passed => "PASSED".green().bold(),
            RunStatus::Failed => "FAILED".red().bold(),
            RunStatus::Cancelled => "CANCELLED".yellow().bold(),
        };
        format!(
            "{} {}/{} tasks completed in {}\n",
            status,
            report.summary.completed,
            report.summary.total_tasks,
            Self::duration(report.duration_ms)
        )
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("{}\n", "=".repeat(60).cyan())
    }

    fn duration(ms: u64) -> String {
        if ms < 1000 {
            format!("{}ms", ms)
        } else if ms < 60_000 {
            format!("{:.1}s", ms as f64 / 1000.0)
        } else {
            format!("{}m{:02}s", ms / 60_000, (ms % 60_000) / 1000)
        }
    }

    fn last_lines(text: &str, count: usize) -> String {
        let lines: Vec<&str> = text.lines().collect();
        lines[lines.len().saturating_sub(count)..].join("\n")
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, report: &ExecutionReport) -> String {
        Self::format_report(report)
    }

    fn format_summary(&self, report: &ExecutionReport) -> String {
        Self::format_report_summary(report)
    }

    fn format_json(&self, report: &ExecutionReport) -> String {
        Self::format_json(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use conductor_domain::{
        GateResult, GateType, QualityGate, ResearchQuery, RunInfo, Task, TaskError,
        validate_plan,
    };

    fn plain() {
        colored::control::set_override(false);
    }

    fn plan() -> Plan {
        Plan::new("release", "Release 1.2")
            .with_task(Task::new("build", "Build").with_command("make"))
            .with_task(Task::new("test", "Test").with_command("make test").with_dependency("build"))
            .with_task(Task::new("ship", "Ship").with_command("make ship").with_dependency("test"))
    }

    fn failed_report() -> ExecutionReport {
        let now = Utc::now();
        let results = vec![
            TaskResult::completed("build", "built").with_exit_code(Some(0)),
            TaskResult::failed("test", TaskError::execution("exit status 2"))
                .with_exit_code(Some(2))
                .with_output("running 3 tests\nassertion failed: left == right"),
            TaskResult::skipped("ship", "dependency 'test' did not complete"),
        ];
        ExecutionReport::build(
            &plan(),
            results,
            None,
            RunInfo {
                started_at: now,
                finished_at: now,
                dry_run: false,
                continue_on_error: false,
                cancelled: false,
            },
        )
    }

    #[test]
    fn test_full_report_shows_failure_context() {
        plain();
        let text = ConsoleFormatter::format_report(&failed_report());
        assert!(text.contains("Release 1.2"));
        assert!(text.contains("x test"));
        assert!(text.contains("assertion failed: left == right"));
        assert!(text.contains("- ship"));
        assert!(text.contains("First Failure"));
        assert!(text.contains("command: make test"));
        assert!(text.contains("FAILED 1/3"));
    }

    #[test]
    fn test_summary_counts() {
        plain();
        let text = ConsoleFormatter::format_report_summary(&failed_report());
        assert!(text.contains("1 completed, 1 failed, 1 skipped, 0 not run (of 3)"));
        assert!(text.contains("first failure test: exit status 2"));
        assert!(!text.contains("gates:"));
    }

    #[test]
    fn test_json_is_the_stored_shape() {
        let report = failed_report();
        let json = ConsoleFormatter::format_json(&report);
        let parsed: ExecutionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_gate_section_marks_optional_and_halt() {
        plain();
        let lint = QualityGate::new("lint", "Lint", GateType::Lint, "cargo clippy");
        let tests = QualityGate::new("tests", "Tests", GateType::Tests, "cargo test");
        let mut failed = GateResult::new(&lint, GateStatus::Failed);
        failed.output = "warning: unused variable".to_string();
        let report = QualityGateReport::from_results(
            vec![failed, GateResult::new(&tests, GateStatus::Skipped)],
            Some("lint".to_string()),
            10,
        );
        let text = ConsoleFormatter::format_gates(&report);
        assert!(text.contains("x Lint [lint]"));
        assert!(text.contains("- Tests [tests]"));
        assert!(text.contains("warning: unused variable"));
        assert!(text.contains("pipeline halted by 'lint'"));
    }

    #[test]
    fn test_validation_lists_errors_before_warnings() {
        plain();
        let plan = Plan::new("p", "P").with_task(Task::new("a", "A").with_dependency("ghost"));
        let report = validate_plan(&plan);
        let text = ConsoleFormatter::format_validation(&plan, &report);
        let error_at = text.find("error:").unwrap();
        let warning_at = text.find("warning:").unwrap();
        assert!(error_at < warning_at);
        assert!(text.contains("ghost"));
        assert!(text.contains("invalid"));
    }

    #[test]
    fn test_research_report_with_no_findings() {
        plain();
        let query = ResearchQuery::new("session refresh");
        let discovery = conductor_domain::merge_discovery(&query, Vec::new());
        let analysis = conductor_domain::AnalysisResult::default();
        let synthesis = conductor_domain::synthesize(&query, &discovery, &analysis);
        let now = Utc::now();
        let report = ResearchReport {
            query,
            discovery,
            analysis,
            synthesis,
            started_at: now,
            finished_at: now,
            duration_ms: 42,
        };
        let text = ConsoleFormatter::format_research(&report);
        assert!(text.contains("Query: session refresh"));
        assert!(text.contains("Scope: all / medium"));
        assert!(text.contains("42ms"));
    }

    #[test]
    fn test_duration_formatting() {
        assert_eq!(ConsoleFormatter::duration(850), "850ms");
        assert_eq!(ConsoleFormatter::duration(1500), "1.5s");
        assert_eq!(ConsoleFormatter::duration(125_000), "2m05s");
    }
}
