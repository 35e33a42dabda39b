//! Orchestration event channel
//!
//! Coordination and research runs publish typed events to an [`EventBus`].
//! Each subscriber owns an independent receiver, so subscribers never
//! interfere with one another. Events carry a bus-wide sequence number that
//! reflects publication order.

use chrono::{DateTime, Utc};
use conductor_domain::{AgentStatus, AgentType, ConfidenceLevel, ResearchPhase};
use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber before it lags.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    PhaseStarted {
        phase: ResearchPhase,
        agents: usize,
    },
    PhaseCompleted {
        phase: ResearchPhase,
        duration_ms: u64,
        succeeded: usize,
        failed: usize,
    },
    AgentStarted {
        task_id: String,
        agent_type: AgentType,
        phase: Option<ResearchPhase>,
    },
    AgentCompleted {
        task_id: String,
        agent_type: AgentType,
        phase: Option<ResearchPhase>,
        duration_ms: u64,
        confidence: Option<ConfidenceLevel>,
    },
    /// Failed, timed out or skipped
    AgentFailed {
        task_id: String,
        agent_type: AgentType,
        phase: Option<ResearchPhase>,
        status: AgentStatus,
        error: String,
    },
}

impl OrchestrationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrchestrationEvent::PhaseStarted { .. } => "phase_started",
            OrchestrationEvent::PhaseCompleted { .. } => "phase_completed",
            OrchestrationEvent::AgentStarted { .. } => "agent_started",
            OrchestrationEvent::AgentCompleted { .. } => "agent_completed",
            OrchestrationEvent::AgentFailed { .. } => "agent_failed",
        }
    }
}

/// An event stamped with its position and time of publication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEnvelope {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: OrchestrationEvent,
}

/// Bounded multi-subscriber event channel.
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    next_sequence: Mutex<u64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            next_sequence: Mutex::new(0),
        }
    }

    /// New independent receiver; it sees events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish an event. Returns its sequence number. Publishing with no
    /// subscribers is not an error.
    pub fn publish(&self, event: OrchestrationEvent) -> u64 {
        let mut next = self
            .next_sequence
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *next += 1;
        let sequence = *next;
        let _ = self.sender.send(EventEnvelope {
            sequence,
            timestamp: Utc::now(),
            event,
        });
        sequence
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
