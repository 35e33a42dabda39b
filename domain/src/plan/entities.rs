//! Plan entity

use super::task::{Task, TaskId};
use crate::gate::QualityGate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named group of tasks. Phases only affect declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPhase {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "title")]
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// A structured unit of declared work.
///
/// Owns its tasks and gates; read-only for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub phases: Vec<PlanPhase>,
    /// Tasks declared outside any phase; ordered after phased tasks
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Gates declared by the plan; `None` defers to configuration
    #[serde(default)]
    pub quality_gates: Option<Vec<QualityGate>>,
}

impl Plan {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            metadata: BTreeMap::new(),
            phases: Vec::new(),
            tasks: Vec::new(),
            quality_gates: None,
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_phase(mut self, phase: PlanPhase) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn with_gates(mut self, gates: Vec<QualityGate>) -> Self {
        self.quality_gates = Some(gates);
        self
    }

    /// All tasks in declaration order (phases first, then loose tasks).
    pub fn all_tasks(&self) -> Vec<&Task> {
        self.phases
            .iter()
            .flat_map(|p| p.tasks.iter())
            .chain(self.tasks.iter())
            .collect()
    }

    /// Owned copy of all tasks in declaration order.
    pub fn tasks_in_order(&self) -> Vec<Task> {
        self.all_tasks().into_iter().cloned().collect()
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.all_tasks().into_iter().find(|t| &t.id == id)
    }

    pub fn task_count(&self) -> usize {
        self.phases.iter().map(|p| p.tasks.len()).sum::<usize>() + self.tasks.len()
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

impl PlanPhase {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }
}
