//! CLI command definitions

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use conductor_domain::{ResearchDepth, ResearchScope};
use std::path::PathBuf;

/// How an execution report is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum ReportFormat {
    /// Every task and gate with its output on failure
    #[default]
    Full,
    /// Counts and the first blocking error
    Summary,
    /// The report as stored
    Json,
}

/// How a research report is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum ResearchFormat {
    #[default]
    Full,
    Json,
}

/// CLI arguments for conductor
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(author, version, about = "Run dependency-ordered plans, quality gates and research agents")]
#[command(long_about = r#"
Conductor executes a plan of interdependent tasks in dependency order, runs
quality gates over the result, and coordinates research agents.

Configuration files are loaded from (in priority order):
1. CONDUCTOR_* environment variables (e.g. CONDUCTOR_RETRY__MAX_ATTEMPTS=3)
2. --config <path>        Explicit config file
3. ./conductor.toml       Project-level config
4. ~/.config/conductor/config.toml   Global config

Example:
  conductor execute plan.json --report-output reports/run.json
  conductor execute plan.toml --dry-run
  conductor validate plan.json
  conductor gates --gates-file gates.toml
  conductor report reports/run.json --format summary
  conductor research "how are sessions refreshed" --depth deep
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a plan, then run its quality gates
    Execute(ExecuteArgs),

    /// Validate a plan without executing anything
    Validate {
        /// Plan file (JSON or TOML)
        plan: PathBuf,
    },

    /// Run quality gates on their own
    Gates(GatesArgs),

    /// Display or re-export a saved execution report
    Report(ReportArgs),

    /// Research a question across code and documentation
    Research(ResearchArgs),
}

#[derive(Args, Debug)]
pub struct ExecuteArgs {
    /// Plan file (JSON or TOML)
    pub plan: PathBuf,

    /// Show what would run without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Keep running independent tasks after a failure
    #[arg(long)]
    pub continue_on_error: bool,

    /// Directory commands and agents run in
    #[arg(short = 'C', long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Save the execution report as JSON
    #[arg(short = 'o', long, value_name = "PATH")]
    pub report_output: Option<PathBuf>,

    /// Gate file overriding the plan's and the configured gates
    #[arg(long, value_name = "PATH")]
    pub gates_file: Option<PathBuf>,

    /// Report display format
    #[arg(short, long, value_enum, default_value = "full")]
    pub format: ReportFormat,
}

#[derive(Args, Debug)]
pub struct GatesArgs {
    /// Gate file; configured gates (or the default set) otherwise
    #[arg(long, value_name = "PATH")]
    pub gates_file: Option<PathBuf>,

    /// Show what would run without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Directory the gates run in
    #[arg(short = 'C', long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Saved report file
    pub path: PathBuf,

    /// Display format
    #[arg(short, long, value_enum, default_value = "full")]
    pub format: ReportFormat,

    /// Write the report as JSON to this path instead of displaying it
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ResearchArgs {
    /// The question to research
    pub query: String,

    /// What to search: codebase, documentation or all
    #[arg(long)]
    pub scope: Option<ResearchScope>,

    /// How thorough: shallow, medium or deep
    #[arg(long)]
    pub depth: Option<ResearchDepth>,

    /// Maximum files to report
    #[arg(long, value_name = "N")]
    pub max_files: Option<usize>,

    /// Only consider files with this extension (repeatable)
    #[arg(long = "file-type", value_name = "EXT")]
    pub file_types: Vec<String>,

    /// Only files modified on or after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub since: Option<NaiveDate>,

    /// Only files modified on or before this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub until: Option<NaiveDate>,

    /// Directory to research
    #[arg(short = 'C', long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "full")]
    pub format: ResearchFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_flags() {
        let cli = Cli::parse_from([
            "conductor",
            "-vv",
            "execute",
            "plan.json",
            "--dry-run",
            "--continue-on-error",
            "-C",
            "/srv/app",
            "--report-output",
            "out.json",
        ]);
        assert_eq!(cli.verbose, 2);
        let Some(Command::Execute(args)) = cli.command else {
            panic!("expected execute");
        };
        assert_eq!(args.plan, PathBuf::from("plan.json"));
        assert!(args.dry_run);
        assert!(args.continue_on_error);
        assert_eq!(args.working_dir, Some(PathBuf::from("/srv/app")));
        assert_eq!(args.report_output, Some(PathBuf::from("out.json")));
        assert_eq!(args.format, ReportFormat::Full);
    }

    #[test]
    fn test_research_flags() {
        let cli = Cli::parse_from([
            "conductor",
            "research",
            "token refresh",
            "--scope",
            "code",
            "--depth",
            "deep",
            "--file-type",
            "rs",
            "--file-type",
            "toml",
            "--since",
            "2026-01-01",
            "--format",
            "json",
        ]);
        let Some(Command::Research(args)) = cli.command else {
            panic!("expected research");
        };
        assert_eq!(args.scope, Some(ResearchScope::Codebase));
        assert_eq!(args.depth, Some(ResearchDepth::Deep));
        assert_eq!(args.file_types, vec!["rs", "toml"]);
        assert_eq!(args.since, NaiveDate::from_ymd_opt(2026, 1, 1));
        assert_eq!(args.format, ResearchFormat::Json);
    }

    #[test]
    fn test_report_and_global_flags() {
        let cli = Cli::parse_from([
            "conductor",
            "report",
            "run.json",
            "--format",
            "summary",
            "--no-config",
            "--config",
            "x.toml",
        ]);
        assert!(cli.no_config);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        let Some(Command::Report(args)) = cli.command else {
            panic!("expected report");
        };
        assert_eq!(args.format, ReportFormat::Summary);
        assert!(args.export.is_none());
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let result = Cli::try_parse_from(["conductor", "research", "q", "--since", "yesterday"]);
        assert!(result.is_err());
    }
}
