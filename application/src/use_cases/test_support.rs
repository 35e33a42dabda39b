//! Scripted port implementations shared by the use case tests.

use crate::ports::agent::{AgentError, AgentPort, AgentRequest};
use crate::ports::command_runner::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use async_trait::async_trait;
use conductor_domain::{AgentOutput, AgentType};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// A scripted reply for [`ScriptedRunner`]
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Exit(i32, &'static str),
    TimedOut(&'static str),
    SpawnError,
}

/// Command runner that answers from per-command scripts.
///
/// Commands without a script exit 0 with empty output. `delay` is awaited
/// before every reply (use paused time in tests).
pub(crate) struct ScriptedRunner {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<CommandSpec>>,
    delay: Duration,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn script(self, command: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(command.to_string(), replies.into());
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.command.clone())
            .collect()
    }

    pub(crate) fn last_spec(&self) -> Option<CommandSpec> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(spec.clone());
        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&spec.command)
            .and_then(|q| q.pop_front())
            .unwrap_or(Reply::Exit(0, ""));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match reply {
            Reply::Exit(code, output) => Ok(CommandOutput {
                exit_code: Some(code),
                output: output.to_string(),
                timed_out: false,
                duration: self.delay,
            }),
            Reply::TimedOut(partial) => Ok(CommandOutput {
                exit_code: None,
                output: partial.to_string(),
                timed_out: true,
                duration: spec.timeout,
            }),
            Reply::SpawnError => Err(CommandError::Spawn {
                command: spec.command.clone(),
                message: "No such file or directory".to_string(),
            }),
        }
    }
}

/// A scripted agent behaviour for [`ScriptedAgent`]
#[derive(Clone)]
pub(crate) enum AgentScript {
    Output(AgentOutput),
    Error(&'static str),
    /// Sleep this long, then return the output
    Slow(Duration, AgentOutput),
}

/// Agent that returns a fixed script and records every request.
pub(crate) struct ScriptedAgent {
    agent_type: AgentType,
    script: AgentScript,
    requests: Mutex<Vec<AgentRequest>>,
}

impl ScriptedAgent {
    pub(crate) fn new(agent_type: AgentType, script: AgentScript) -> Self {
        Self {
            agent_type,
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentPort for ScriptedAgent {
    fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    async fn invoke(&self, request: AgentRequest) -> Result<AgentOutput, AgentError> {
        self.requests.lock().unwrap().push(request);
        match &self.script {
            AgentScript::Output(output) => Ok(output.clone()),
            AgentScript::Error(message) => Err(AgentError::Failed(message.to_string())),
            AgentScript::Slow(delay, output) => {
                tokio::time::sleep(*delay).await;
                Ok(output.clone())
            }
        }
    }
}
