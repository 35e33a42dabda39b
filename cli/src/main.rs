//! CLI entrypoint for conductor
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use conductor_application::{
    AgentCoordinator, EventBus, ExecutionParams, ExecutionProgressNotifier, NoProgress,
    PlanRunner, QualityGateRunner, ReportStore, ResearchError, ResearchOrchestrator,
    RunPlanError, RunPlanInput,
};
use conductor_domain::{DateRange, ExecutionReport, ResearchConstraints, ResearchQuery, validate_plan};
use conductor_infrastructure::{
    ConfigLoader, FileConfig, JsonReportStore, JsonlEventLogger, PlanLoader, TokioCommandRunner,
    build_agent_registry,
};
use conductor_presentation::{
    Cli, Command, ConsoleFormatter, EventPrinter, ExecuteArgs, GatesArgs, OutputFormatter,
    ProgressReporter, ReportArgs, ReportFormat, ResearchArgs, ResearchFormat, SimpleProgress,
};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        return Ok(());
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?
    };

    let log_guard = init_logging(cli.verbose, &config);

    if cli.no_color || !config.output.color {
        colored::control::set_override(false);
    }

    check_config(&config)?;

    info!("Starting conductor");

    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let code = match command {
        Command::Execute(args) => execute(&cli, args, &config).await?,
        Command::Validate { plan } => validate(plan)?,
        Command::Gates(args) => gates(&cli, args, &config).await?,
        Command::Report(args) => report(args)?,
        Command::Research(args) => research(&cli, args, &config).await?,
    };

    // Flush the file log before exiting
    drop(log_guard);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Console logging from `-v`, plus a daily file when `logging.log_dir` is set.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_logging(verbose: u8, config: &FileConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_filter(verbose)));

    let (file_layer, guard) = match &config.logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "conductor.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    guard
}

fn verbosity_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    }
}

fn check_config(config: &FileConfig) -> Result<()> {
    let issues = config.validate();
    for issue in issues.iter().filter(|i| !i.is_error()) {
        warn!("Config: {}", issue);
    }
    let errors: Vec<String> = issues
        .iter()
        .filter(|i| i.is_error())
        .map(|i| i.to_string())
        .collect();
    if !errors.is_empty() {
        for message in &errors {
            error!("Config: {}", message);
        }
        bail!("Invalid configuration: {}", errors.join("; "));
    }
    Ok(())
}

/// Cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });
    token
}

/// Configured parameters with the command-line working directory applied.
fn execution_params(config: &FileConfig, working_dir: Option<&PathBuf>) -> ExecutionParams {
    let params = config.to_execution_params();
    match working_dir {
        Some(dir) => params.with_working_dir(dir),
        None => params,
    }
}

fn agent_root(params: &ExecutionParams) -> Result<PathBuf> {
    match &params.working_dir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().context("Cannot determine the current directory"),
    }
}

/// Bars on a terminal, plain lines otherwise; nothing for quiet or JSON output.
fn progress_for(cli: &Cli, json_output: bool) -> Box<dyn ExecutionProgressNotifier> {
    if cli.quiet || json_output {
        Box::new(NoProgress)
    } else if std::io::stderr().is_terminal() {
        Box::new(ProgressReporter::new())
    } else {
        Box::new(SimpleProgress)
    }
}

async fn execute(cli: &Cli, args: &ExecuteArgs, config: &FileConfig) -> Result<i32> {
    let plan = PlanLoader::load(&args.plan)?;

    let params = execution_params(config, args.working_dir.as_ref())
        .with_dry_run(args.dry_run)
        .with_continue_on_error(args.continue_on_error || config.execution.continue_on_error);

    // --gates-file, else the plan's own gates, else the configured set
    let gates = match &args.gates_file {
        Some(path) => Some(PlanLoader::load_gates(path)?),
        None if plan.quality_gates.is_none() => config.gates.resolve(),
        None => None,
    };
    let mut input = RunPlanInput::new(plan);
    if let Some(gates) = gates {
        input = input.with_gates(gates);
    }

    // === Dependency Injection ===
    let registry = Arc::new(build_agent_registry(
        agent_root(&params)?,
        &config.agents.external,
    ));
    let token = cancel_on_ctrl_c();
    let runner = PlanRunner::new(Arc::new(TokioCommandRunner::new()), registry, params)
        .with_cancellation(token);

    let progress = progress_for(cli, args.format == ReportFormat::Json);
    let report = match runner.execute_plan(input, progress.as_ref()).await {
        Ok(report) => report,
        Err(RunPlanError::Cancelled) => {
            eprintln!("Cancelled before any task started");
            return Ok(EXIT_CANCELLED);
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", render_report(&ConsoleFormatter, &report, args.format));

    if let Some(path) = args
        .report_output
        .as_ref()
        .or(config.execution.report_output.as_ref())
    {
        JsonReportStore::new().save(&report, path)?;
        eprintln!("Report saved to {}", path.display());
    }

    Ok(report.exit_code())
}

fn render_report(
    formatter: &dyn OutputFormatter,
    report: &ExecutionReport,
    format: ReportFormat,
) -> String {
    match format {
        ReportFormat::Full => formatter.format(report),
        ReportFormat::Summary => formatter.format_summary(report),
        ReportFormat::Json => formatter.format_json(report),
    }
}

fn validate(path: &Path) -> Result<i32> {
    let plan = PlanLoader::load(path)?;
    let validation = validate_plan(&plan);
    print!("{}", ConsoleFormatter::format_validation(&plan, &validation));
    Ok(if validation.has_errors() { 1 } else { 0 })
}

async fn gates(cli: &Cli, args: &GatesArgs, config: &FileConfig) -> Result<i32> {
    let gates = match &args.gates_file {
        Some(path) => PlanLoader::load_gates(path)?,
        None => config.gates.resolve().unwrap_or_default(),
    };
    if gates.is_empty() {
        println!("No quality gates configured");
        return Ok(0);
    }

    let params = execution_params(config, args.working_dir.as_ref()).with_dry_run(args.dry_run);
    let token = cancel_on_ctrl_c();
    let runner = QualityGateRunner::new(Arc::new(TokioCommandRunner::new()), params)
        .with_cancellation(token.clone());

    let progress = progress_for(cli, false);
    let report = runner.execute_quality_gates(&gates, progress.as_ref()).await;
    print!("{}", ConsoleFormatter::format_gates(&report));

    Ok(if token.is_cancelled() {
        EXIT_CANCELLED
    } else if report.passed() {
        0
    } else {
        1
    })
}

fn report(args: &ReportArgs) -> Result<i32> {
    let store = JsonReportStore::new();
    let report = store.load(&args.path)?;

    if let Some(export) = &args.export {
        store.save(&report, export)?;
        println!("Report exported to {}", export.display());
        return Ok(0);
    }

    println!("{}", render_report(&ConsoleFormatter, &report, args.format));
    Ok(0)
}

/// Query from the command line, falling back to configured depth and file cap.
fn research_query(args: &ResearchArgs, config: &FileConfig) -> Result<ResearchQuery> {
    let date_range = (args.since.is_some() || args.until.is_some()).then_some(DateRange {
        since: args.since,
        until: args.until,
    });
    if let Some(range) = &date_range
        && !range.is_valid()
    {
        bail!("--since must not be after --until");
    }

    Ok(ResearchQuery::new(args.query.clone())
        .with_scope(args.scope.unwrap_or_default())
        .with_depth(args.depth.unwrap_or_else(|| config.research.depth()))
        .with_constraints(ResearchConstraints {
            max_files: args.max_files.or(config.research.max_files),
            file_types: args.file_types.clone(),
            date_range,
        }))
}

async fn research(cli: &Cli, args: &ResearchArgs, config: &FileConfig) -> Result<i32> {
    let query = research_query(args, config)?;
    let params = execution_params(config, args.working_dir.as_ref());
    let registry = Arc::new(build_agent_registry(
        agent_root(&params)?,
        &config.agents.external,
    ));

    let bus = Arc::new(EventBus::default());
    let mut subscribers = Vec::new();
    if !cli.quiet && args.format == ResearchFormat::Full {
        subscribers.push(EventPrinter::spawn(bus.subscribe()));
    }
    if let Some(path) = &config.logging.event_log
        && let Some(logger) = JsonlEventLogger::new(path)
    {
        subscribers.push(Arc::new(logger).spawn_subscriber(bus.subscribe()));
    }

    let token = cancel_on_ctrl_c();
    let coordinator = AgentCoordinator::new(registry, params)
        .with_events(Arc::clone(&bus))
        .with_cancellation(token);
    let orchestrator = ResearchOrchestrator::new(coordinator)
        .with_discovery_agents(config.research.discovery())
        .with_analysis_agents(config.research.analysis());

    let result = orchestrator.run(query).await;

    // Subscribers finish once every handle on the bus is gone
    drop(orchestrator);
    drop(bus);
    for handle in subscribers {
        let _ = handle.await;
    }

    match result {
        Ok(report) => {
            let output = match args.format {
                ResearchFormat::Full => ConsoleFormatter::format_research(&report),
                ResearchFormat::Json => ConsoleFormatter::format_json(&report),
            };
            println!("{}", output);
            Ok(0)
        }
        Err(ResearchError::Cancelled) => {
            eprintln!("Research cancelled");
            Ok(EXIT_CANCELLED)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::{ResearchDepth, ResearchScope};

    fn research_args(extra: &[&str]) -> ResearchArgs {
        let mut argv = vec!["conductor", "research", "token refresh"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Some(Command::Research(args)) => args,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(verbosity_filter(0), "warn");
        assert_eq!(verbosity_filter(1), "info");
        assert_eq!(verbosity_filter(2), "debug");
        assert_eq!(verbosity_filter(7), "trace");
    }

    #[test]
    fn test_research_query_uses_config_fallbacks() {
        let mut config = FileConfig::default();
        config.research.depth = "deep".to_string();
        config.research.max_files = Some(7);

        let query = research_query(&research_args(&[]), &config).unwrap();
        assert_eq!(query.scope, ResearchScope::All);
        assert_eq!(query.depth, ResearchDepth::Deep);
        assert_eq!(query.constraints.max_files, Some(7));
        assert!(query.constraints.date_range.is_none());

        let query = research_query(
            &research_args(&["--depth", "shallow", "--max-files", "3", "--since", "2026-02-01"]),
            &config,
        )
        .unwrap();
        assert_eq!(query.depth, ResearchDepth::Shallow);
        assert_eq!(query.constraints.max_files, Some(3));
        assert!(query.constraints.date_range.is_some());
    }

    #[test]
    fn test_inverted_date_range_is_rejected() {
        let args = research_args(&["--since", "2026-03-01", "--until", "2026-01-01"]);
        assert!(research_query(&args, &FileConfig::default()).is_err());
    }

    #[test]
    fn test_command_line_working_dir_wins() {
        let mut config = FileConfig::default();
        config.execution.working_dir = Some(PathBuf::from("/from/config"));
        let cli_dir = PathBuf::from("/from/cli");

        let params = execution_params(&config, Some(&cli_dir));
        assert_eq!(params.working_dir, Some(cli_dir));
        let params = execution_params(&config, None);
        assert_eq!(params.working_dir, Some(PathBuf::from("/from/config")));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = FileConfig::default();
        config.agents.max_concurrency = 0;
        assert!(check_config(&config).is_err());
        assert!(check_config(&FileConfig::default()).is_ok());
    }
}
