//! JSONL file writer for orchestration events.
//!
//! Each [`EventEnvelope`] is serialized as a single JSON line carrying its
//! `type`, `sequence` and a millisecond `timestamp`, appended to the file via
//! a buffered writer.

use conductor_application::EventEnvelope;
use serde_json::{Value, json};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::warn;

/// JSONL event logger that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlEventLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

fn now_millis() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

impl JsonlEventLogger {
    /// Create a new logger writing to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create event log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not create event log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, envelope: &EventEnvelope) {
        let mut record = serde_json::to_value(envelope).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut record {
            map.insert(
                "timestamp".to_string(),
                Value::String(
                    envelope
                        .timestamp
                        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                ),
            );
        }
        self.write_record(&record);
    }

    fn write_record(&self, record: &Value) {
        let Ok(line) = serde_json::to_string(record) else {
            return;
        };
        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        let _ = writeln!(writer, "{}", line);
        // JSONL is append-only; flush each line so a crash loses nothing
        let _ = writer.flush();
    }

    /// Write every event from `receiver` until its bus is dropped.
    ///
    /// A lagging receiver records how many events it missed and continues.
    pub fn spawn_subscriber(
        self: Arc<Self>,
        mut receiver: broadcast::Receiver<EventEnvelope>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(envelope) => self.log(&envelope),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Event log fell behind; {} events dropped", missed);
                        self.write_record(&json!({
                            "type": "events_dropped",
                            "timestamp": now_millis(),
                            "count": missed,
                        }));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Drop for JsonlEventLogger {
    fn drop(&mut self) {
        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        let _ = writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_application::{EventBus, OrchestrationEvent};
    use conductor_domain::{AgentType, ResearchPhase};

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_subscriber_writes_events_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/run.events.jsonl");
        let logger = Arc::new(JsonlEventLogger::new(&path).unwrap());

        let bus = EventBus::default();
        let handle = logger.clone().spawn_subscriber(bus.subscribe());

        bus.publish(OrchestrationEvent::PhaseStarted {
            phase: ResearchPhase::Discovery,
            agents: 3,
        });
        bus.publish(OrchestrationEvent::AgentStarted {
            task_id: "discovery-code-locator".to_string(),
            agent_type: AgentType::CodeLocator,
            phase: Some(ResearchPhase::Discovery),
        });
        drop(bus);
        handle.await.unwrap();
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "phase_started");
        assert_eq!(lines[0]["sequence"], 1);
        assert_eq!(lines[0]["agents"], 3);
        assert_eq!(lines[1]["type"], "agent_started");
        assert_eq!(lines[1]["agent_type"], "code-locator");

        let timestamp = lines[0]["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
        assert!(timestamp.ends_with('Z'));
        assert_eq!(timestamp.len(), "2026-01-01T00:00:00.000Z".len());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_records_drops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let logger = Arc::new(JsonlEventLogger::new(&path).unwrap());

        let bus = EventBus::new(2);
        let receiver = bus.subscribe();
        for _ in 0..5 {
            bus.publish(OrchestrationEvent::PhaseStarted {
                phase: ResearchPhase::Analysis,
                agents: 1,
            });
        }
        drop(bus);
        logger.clone().spawn_subscriber(receiver).await.unwrap();
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines[0]["type"], "events_dropped");
        assert_eq!(lines[0]["count"], 3);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2]["sequence"], 5);
    }

    #[test]
    fn test_returns_none_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        assert!(JsonlEventLogger::new(blocker.join("events.jsonl")).is_none());
    }
}
