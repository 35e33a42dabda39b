//! Presentation layer for conductor
//!
//! This crate contains CLI definitions, output formatters,
//! progress reporters and the live event display.

pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{
    Cli, Command, ExecuteArgs, GatesArgs, ReportArgs, ReportFormat, ResearchArgs, ResearchFormat,
};
pub use output::console::ConsoleFormatter;
pub use output::formatter::OutputFormatter;
pub use progress::events::EventPrinter;
pub use progress::reporter::{ProgressReporter, SimpleProgress};
