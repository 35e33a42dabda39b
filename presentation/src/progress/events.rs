//! Live display of orchestration events during research runs

use colored::Colorize;
use conductor_application::{EventEnvelope, OrchestrationEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Prints one line per orchestration event to stderr
pub struct EventPrinter;

impl EventPrinter {
    /// Render an event, or `None` for events not worth a line
    pub fn render(envelope: &EventEnvelope) -> Option<String> {
        let line = match &envelope.event {
            OrchestrationEvent::PhaseStarted { phase, agents } => format!(
                "{} {} ({} agents)",
                "->".cyan(),
                phase.as_str().bold(),
                agents
            ),
            OrchestrationEvent::PhaseCompleted {
                phase,
                duration_ms,
                succeeded,
                failed,
            } => {
                let counts = if *failed > 0 {
                    format!("{} ok, {} failed", succeeded, failed).yellow()
                } else {
                    format!("{} ok", succeeded).green()
                };
                format!("   {} {} in {}ms", phase, counts, duration_ms)
            }
            OrchestrationEvent::AgentStarted { .. } => return None,
            OrchestrationEvent::AgentCompleted {
                agent_type,
                duration_ms,
                confidence,
                ..
            } => {
                let confidence = confidence
                    .as_ref()
                    .map(|c| format!(", {} confidence", c))
                    .unwrap_or_default();
                format!(
                    "  {} {} {}",
                    "v".green(),
                    agent_type,
                    format!("({}ms{})", duration_ms, confidence).dimmed()
                )
            }
            OrchestrationEvent::AgentFailed {
                agent_type,
                status,
                error,
                ..
            } => format!("  {} {} {}: {}", "x".red(), agent_type, status, error),
        };
        Some(line)
    }

    /// Print events until the bus is dropped
    pub fn spawn(mut receiver: broadcast::Receiver<EventEnvelope>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(envelope) => {
                        if let Some(line) = Self::render(&envelope) {
                            eprintln!("{}", line);
                        }
                    }
                    Err(RecvError::Lagged(count)) => {
                        eprintln!("  {} {} events not shown", "!".yellow(), count);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
