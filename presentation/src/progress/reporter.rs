//! Progress reporting for plan execution

use colored::Colorize;
use conductor_application::ports::progress::ExecutionProgressNotifier;
use conductor_domain::{
    ExecutionReport, GateResult, GateStatus, Plan, QualityGate, QualityGateReport, Task,
    TaskResult, TaskStatus,
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Reports progress during plan execution with progress bars
pub struct ProgressReporter {
    multi: MultiProgress,
    task_bar: Mutex<Option<ProgressBar>>,
    gate_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            task_bar: Mutex::new(None),
            gate_bar: Mutex::new(None),
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn start_bar(&self, slot: &Mutex<Option<ProgressBar>>, prefix: &str, len: usize) {
        let pb = self.multi.add(ProgressBar::new(len as u64));
        pb.set_style(Self::bar_style());
        pb.set_prefix(prefix.to_string());
        pb.set_message("Starting...");
        pb.enable_steady_tick(Duration::from_millis(120));
        *slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(pb);
    }

    fn with_bar(slot: &Mutex<Option<ProgressBar>>, f: impl FnOnce(&ProgressBar)) {
        if let Some(pb) = slot.lock().unwrap_or_else(|p| p.into_inner()).as_ref() {
            f(pb);
        }
    }

    fn finish_bar(slot: &Mutex<Option<ProgressBar>>, message: String) {
        if let Some(pb) = slot.lock().unwrap_or_else(|p| p.into_inner()).take() {
            pb.finish_with_message(message);
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionProgressNotifier for ProgressReporter {
    fn on_plan_start(&self, plan: &Plan, total_tasks: usize) {
        self.start_bar(&self.task_bar, plan.display_title(), total_tasks);
    }

    fn on_task_start(&self, task: &Task, _index: usize, _total: usize) {
        Self::with_bar(&self.task_bar, |pb| pb.set_message(task.label().to_string()));
    }

    fn on_task_retry(&self, task: &Task, attempt: u32, max_attempts: u32, delay: Duration) {
        Self::with_bar(&self.task_bar, |pb| {
            pb.println(format!(
                "  {} {} retry {}/{} in {}ms",
                "~".yellow(),
                task.id,
                attempt,
                max_attempts,
                delay.as_millis()
            ));
        });
    }

    fn on_task_complete(&self, task: &Task, result: &TaskResult) {
        Self::with_bar(&self.task_bar, |pb| {
            let status = match result.status {
                TaskStatus::Completed => format!("{} {}", "v".green(), task.id),
                TaskStatus::Skipped => format!("{} {}", "-".yellow(), task.id),
                _ => format!("{} {}", "x".red(), task.id),
            };
            if result.is_failed() {
                pb.println(format!(
                    "  {} {}: {}",
                    "x".red(),
                    task.id,
                    result.error_message().unwrap_or("failed")
                ));
            }
            pb.set_message(status);
            pb.inc(1);
        });
    }

    fn on_gates_start(&self, total: usize) {
        Self::finish_bar(&self.task_bar, format!("{}", "tasks done".green()));
        self.start_bar(&self.gate_bar, "Quality gates", total);
    }

    fn on_gate_start(&self, gate: &QualityGate) {
        Self::with_bar(&self.gate_bar, |pb| pb.set_message(gate.label().to_string()));
    }

    fn on_gate_complete(&self, result: &GateResult) {
        Self::with_bar(&self.gate_bar, |pb| {
            let marker = match result.status {
                GateStatus::Passed => "v".green(),
                GateStatus::Failed => "x".red(),
                GateStatus::Skipped => "-".dimmed(),
            };
            pb.set_message(format!("{} {}", marker, result.name));
            pb.inc(1);
        });
    }

    fn on_gates_complete(&self, report: &QualityGateReport) {
        let message = if report.passed() {
            format!("{}", "gates passed".green())
        } else {
            format!("{}", "gates failed".red())
        };
        Self::finish_bar(&self.gate_bar, message);
    }

    fn on_plan_complete(&self, report: &ExecutionReport) {
        let message = if report.passed() {
            format!("{}", "complete!".green())
        } else {
            format!("{}", report.status.as_str().red())
        };
        Self::finish_bar(&self.task_bar, message);
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl ExecutionProgressNotifier for SimpleProgress {
    fn on_plan_start(&self, plan: &Plan, total_tasks: usize) {
        println!(
            "{} {} ({} tasks)",
            "->".cyan(),
            plan.display_title().bold(),
            total_tasks
        );
    }

    fn on_task_retry(&self, task: &Task, attempt: u32, max_attempts: u32, delay: Duration) {
        println!(
            "  {} {} retry {}/{} in {}ms",
            "~".yellow(),
            task.id,
            attempt,
            max_attempts,
            delay.as_millis()
        );
    }

    fn on_task_complete(&self, task: &Task, result: &TaskResult) {
        match result.status {
            TaskStatus::Completed => println!("  {} {}", "v".green(), task.id),
            TaskStatus::Skipped => println!("  {} {} (skipped)", "-".yellow(), task.id),
            _ => println!(
                "  {} {} ({})",
                "x".red(),
                task.id,
                result.error_message().unwrap_or("failed")
            ),
        }
    }

    fn on_gates_start(&self, total: usize) {
        println!("{} {} ({} gates)", "->".cyan(), "Quality gates".bold(), total);
    }

    fn on_gate_complete(&self, result: &GateResult) {
        match result.status {
            GateStatus::Passed => println!("  {} {}", "v".green(), result.name),
            GateStatus::Failed => println!("  {} {} (failed)", "x".red(), result.name),
            GateStatus::Skipped => println!("  {} {} (skipped)", "-".dimmed(), result.name),
        }
    }

    fn on_plan_complete(&self, _report: &ExecutionReport) {
        println!();
    }
}
