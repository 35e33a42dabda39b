//! Shell command execution for tasks and quality gates

mod runner;

pub use runner::TokioCommandRunner;
