//! Agents implemented by external programs.
//!
//! The program receives the [`AgentRequest`] as JSON on stdin and must print
//! an [`AgentOutput`] as JSON on stdout. A non-zero exit is a failed call.

use async_trait::async_trait;
use conductor_application::{AgentError, AgentPort, AgentRequest};
use conductor_domain::{AgentOutput, AgentType};
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Bytes of stderr quoted in a failure.
const STDERR_TAIL: usize = 2048;

pub struct ExternalCommandAgent {
    agent_type: AgentType,
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl ExternalCommandAgent {
    pub fn new(agent_type: AgentType, program: impl Into<String>) -> Self {
        Self {
            agent_type,
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

fn tail(text: &str, max: usize) -> &str {
    let mut start = text.len().saturating_sub(max);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[async_trait]
impl AgentPort for ExternalCommandAgent {
    fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    async fn invoke(&self, request: AgentRequest) -> Result<AgentOutput, AgentError> {
        let input = serde_json::to_vec(&request)
            .map_err(|e| AgentError::Failed(format!("could not encode request: {}", e)))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }

        debug!("Invoking external {} agent: {}", self.agent_type, self.program);
        let mut child = cmd
            .spawn()
            .map_err(|e| AgentError::Unavailable(format!("{}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that exits without reading its input is not an error here.
            if let Err(e) = stdin.write_all(&input).await {
                debug!("External agent closed stdin early: {}", e);
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AgentError::Failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                tail(stderr.trim(), STDERR_TAIL)
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| AgentError::InvalidResponse(format!("{}: {}", self.program, e)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use conductor_domain::{AgentInput, ConfidenceLevel};
    use serde_json::json;

    fn sh(agent_type: AgentType, script: &str) -> ExternalCommandAgent {
        ExternalCommandAgent::new(agent_type, "sh").with_args(vec!["-c".into(), script.into()])
    }

    fn request() -> AgentRequest {
        AgentRequest::new(
            "discovery-code-locator",
            AgentType::CodeLocator,
            AgentInput::new(json!({ "query": "auth" })),
        )
    }

    #[tokio::test]
    async fn test_reads_output_json() {
        let agent = sh(
            AgentType::CodeLocator,
            r#"cat > /dev/null; echo '{"success": true, "payload": {"files": []}, "confidence": "high"}'"#,
        );
        let output = agent.invoke(request()).await.unwrap();
        assert!(output.success);
        assert_eq!(output.confidence, ConfidenceLevel::High);
        assert_eq!(agent.agent_type(), AgentType::CodeLocator);
    }

    #[tokio::test]
    async fn test_receives_request_on_stdin() {
        let agent = sh(
            AgentType::CodeLocator,
            r#"grep -q '"task_id":"discovery-code-locator"' && echo '{"success": true, "confidence": "low"}'"#,
        );
        let output = agent.invoke(request()).await.unwrap();
        assert_eq!(output.confidence, ConfidenceLevel::Low);
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails_with_stderr() {
        let agent = sh(AgentType::PatternFinder, "echo 'index missing' >&2; exit 2");
        let err = agent.invoke(request()).await.unwrap_err();
        assert!(matches!(err, AgentError::Failed(_)));
        assert!(err.to_string().contains("index missing"));
    }

    #[tokio::test]
    async fn test_invalid_output_is_invalid_response() {
        let agent = sh(AgentType::PatternFinder, "cat");
        let err = agent.invoke(request()).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let agent = ExternalCommandAgent::new(AgentType::CodeLocator, "/no/such/agent-binary");
        let err = agent.invoke(request()).await.unwrap_err();
        assert!(matches!(err, AgentError::Unavailable(_)));
    }
}
