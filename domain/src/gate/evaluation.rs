//! Gate pass/fail evaluation.
//!
//! The exit code decides by default. For test and build gates the captured
//! output is also inspected: a zero exit that still reports failing tests
//! fails, and a missing exit code (process killed by a signal) is resolved
//! from success/failure markers.

use super::entities::GateType;

/// Verdict for one gate execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateVerdict {
    pub passed: bool,
    pub reason: Option<String>,
}

impl GateVerdict {
    fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

pub fn evaluate_gate_output(gate_type: GateType, exit_code: Option<i32>, output: &str) -> GateVerdict {
    let inspects_output = matches!(gate_type, GateType::Tests | GateType::Build);

    match exit_code {
        Some(0) if inspects_output && has_failure_marker(gate_type, output) => GateVerdict::fail(
            format!("exit code 0 but output reports {} failures", gate_type),
        ),
        Some(0) => GateVerdict::pass(),
        Some(code) => GateVerdict::fail(format!("exited with code {}", code)),
        None if inspects_output => {
            if has_failure_marker(gate_type, output) {
                GateVerdict::fail(format!("no exit code; output reports {} failures", gate_type))
            } else if has_success_marker(gate_type, output) {
                GateVerdict::pass()
            } else {
                GateVerdict::fail("no exit code and no success marker in output")
            }
        }
        None => GateVerdict::fail("process terminated without an exit code"),
    }
}

fn has_failure_marker(gate_type: GateType, output: &str) -> bool {
    output.lines().any(|line| {
        let line = line.trim();
        match gate_type {
            GateType::Tests => {
                line.contains("test result: FAILED")
                    || line.starts_with("FAIL ")
                    || line == "failures:"
                    || reports_nonzero(line, "failed")
                    || reports_nonzero(line, "failing")
            }
            GateType::Build => {
                line.starts_with("error:")
                    || line.starts_with("error[")
                    || line.starts_with("ERROR in")
                    || line.to_lowercase().contains("build failed")
                    || line.contains("Compilation failed")
            }
            _ => false,
        }
    })
}

fn has_success_marker(gate_type: GateType, output: &str) -> bool {
    output.lines().any(|line| {
        let line = line.trim();
        match gate_type {
            GateType::Tests => {
                line.contains("test result: ok")
                    || line.contains("All tests passed")
                    || reports_nonzero(line, "passed")
                    || reports_nonzero(line, "passing")
            }
            GateType::Build => {
                line.starts_with("Finished")
                    || line.contains("Compiled successfully")
                    || line.contains("Build succeeded")
                    || line.contains("built in")
            }
            _ => false,
        }
    })
}

/// True when a line contains `<n> <word>` with `n > 0`, e.g. "2 failed".
fn reports_nonzero(line: &str, word: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    tokens.windows(2).any(|pair| {
        let label = pair[1].trim_matches(|c: char| !c.is_alphanumeric());
        label == word
            && pair[0]
                .trim_matches(|c: char| !c.is_ascii_digit())
                .parse::<u64>()
                .is_ok_and(|n| n > 0)
    })
}
