//! [`CommandRunner`] adapter running `sh -c` under tokio.
//!
//! Output from both streams is captured incrementally, so a command killed
//! on timeout still reports what it printed. Each stream is capped at
//! [`MAX_OUTPUT_SIZE`]; the remainder is drained and discarded.

use async_trait::async_trait;
use conductor_application::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Maximum captured size per stream (1 MB)
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// How long stream readers may keep draining after the process exits.
/// Background grandchildren can hold a pipe open indefinitely.
const READER_GRACE: Duration = Duration::from_millis(500);

const STDERR_SEPARATOR: &str = "\n--- stderr ---\n";
const TRUNCATION_MARKER: &str = "\n... (output truncated)";

#[derive(Default)]
struct Capture {
    bytes: Vec<u8>,
    truncated: bool,
}

type SharedCapture = Arc<Mutex<Capture>>;

/// Runs commands through the platform shell.
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }

    fn build(spec: &CommandSpec) -> Result<Command, CommandError> {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", &spec.command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", &spec.command]);
            c
        };

        if let Some(dir) = &spec.working_dir {
            if !dir.is_dir() {
                return Err(CommandError::Spawn {
                    command: spec.command.clone(),
                    message: format!("working directory does not exist: {}", dir.display()),
                });
            }
            cmd.current_dir(dir);
        }

        cmd.envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so a timeout can take down the whole pipeline.
        #[cfg(unix)]
        cmd.process_group(0);

        // Linux: request kernel to send SIGTERM to child when parent dies.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        Ok(cmd)
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let mut cmd = Self::build(spec)?;
        let start = Instant::now();

        debug!("Running `{}` (timeout {:?})", spec.command, spec.timeout);
        let mut child = cmd.spawn().map_err(|e| CommandError::Spawn {
            command: spec.command.clone(),
            message: e.to_string(),
        })?;
        let mut group = ProcessGroup::new(&child);

        let stdout = SharedCapture::default();
        let stderr = SharedCapture::default();
        let mut readers = Vec::with_capacity(2);
        if let Some(pipe) = child.stdout.take() {
            readers.push(spawn_reader(pipe, stdout.clone()));
        }
        if let Some(pipe) = child.stderr.take() {
            readers.push(spawn_reader(pipe, stderr.clone()));
        }

        let (exit_code, timed_out) = match tokio::time::timeout(spec.timeout, child.wait()).await {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(e)) => {
                group.kill(&mut child);
                return Err(CommandError::Io(e.to_string()));
            }
            Err(_) => {
                warn!(
                    "Command `{}` timed out after {:?}; killing it",
                    spec.command, spec.timeout
                );
                group.kill(&mut child);
                if let Err(e) = child.wait().await {
                    warn!("Failed to reap timed-out command: {}", e);
                }
                (None, true)
            }
        };
        group.disarm();

        for mut reader in readers {
            if tokio::time::timeout(READER_GRACE, &mut reader).await.is_err() {
                reader.abort();
            }
        }

        let output = combine(&stdout, &stderr);
        let duration = start.elapsed();
        debug!(
            "Command `{}` finished: exit={:?} timed_out={} in {:?}",
            spec.command, exit_code, timed_out, duration
        );

        Ok(CommandOutput {
            exit_code,
            output,
            timed_out,
            duration,
        })
    }
}

fn spawn_reader<R>(mut pipe: R, capture: SharedCapture) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            let n = match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let mut capture = capture.lock().unwrap_or_else(|p| p.into_inner());
            let room = MAX_OUTPUT_SIZE.saturating_sub(capture.bytes.len());
            if n > room {
                capture.bytes.extend_from_slice(&chunk[..room]);
                capture.truncated = true;
            } else {
                capture.bytes.extend_from_slice(&chunk[..n]);
            }
        }
    })
}

fn render(capture: &SharedCapture) -> String {
    let capture = capture.lock().unwrap_or_else(|p| p.into_inner());
    let mut text = String::from_utf8_lossy(&capture.bytes).into_owned();
    if capture.truncated {
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

fn combine(stdout: &SharedCapture, stderr: &SharedCapture) -> String {
    let mut combined = render(stdout);
    let err = render(stderr);
    if !err.is_empty() {
        if !combined.is_empty() {
            combined.push_str(STDERR_SEPARATOR);
        }
        combined.push_str(&err);
    }
    combined
}

/// Kills the child's process group unless disarmed.
///
/// Dropping an armed guard (the run future was cancelled) kills the group
/// so no grandchild outlives the task.
struct ProcessGroup {
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    pid: Option<u32>,
    armed: bool,
}

impl ProcessGroup {
    fn new(child: &Child) -> Self {
        Self {
            pid: child.id(),
            armed: true,
        }
    }

    fn kill(&mut self, child: &mut Child) {
        self.signal_group();
        if let Err(e) = child.start_kill() {
            debug!("start_kill failed: {}", e);
        }
        self.armed = false;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    #[cfg(target_os = "linux")]
    fn signal_group(&self) {
        if let Some(pid) = self.pid.and_then(|p| i32::try_from(p).ok()) {
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn signal_group(&self) {}
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.armed {
            self.signal_group();
        }
    }
}
