use crate::agent::AgentType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How findings from several agents are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    #[default]
    Merge,
    Vote,
    Weighted,
    Priority,
}

impl AggregationKind {
    pub fn as_str(&self) -> &str {
        match self {
            AggregationKind::Merge => "merge",
            AggregationKind::Vote => "vote",
            AggregationKind::Weighted => "weighted",
            AggregationKind::Priority => "priority",
        }
    }
}

impl std::fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to do when agents disagree about the same entity.
///
/// Ignored by [`AggregationKind::Priority`], which always lets the
/// earlier-listed agent win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictRule {
    /// Keep every competing finding
    #[default]
    KeepAll,
    /// Keep the finding with the highest aggregated score
    HighestConfidence,
    /// Keep the finding from the latest-declared agent task
    MostRecent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AggregationStrategy {
    pub kind: AggregationKind,
    #[serde(default)]
    pub weights: HashMap<AgentType, f64>,
    #[serde(default)]
    pub priority_order: Vec<AgentType>,
    #[serde(default)]
    pub conflict_rule: ConflictRule,
}

impl AggregationStrategy {
    pub fn merge() -> Self {
        Self::default()
    }

    pub fn vote() -> Self {
        Self {
            kind: AggregationKind::Vote,
            ..Self::default()
        }
    }

    pub fn weighted(weights: HashMap<AgentType, f64>) -> Self {
        Self {
            kind: AggregationKind::Weighted,
            weights,
            ..Self::default()
        }
    }

    pub fn priority(order: Vec<AgentType>) -> Self {
        Self {
            kind: AggregationKind::Priority,
            priority_order: order,
            ..Self::default()
        }
    }

    pub fn with_conflict_rule(mut self, rule: ConflictRule) -> Self {
        self.conflict_rule = rule;
        self
    }

    /// Weight for an agent type; unlisted types weigh 1.0, negative weights count as zero.
    pub fn weight_for(&self, agent_type: AgentType) -> f64 {
        self.weights
            .get(&agent_type)
            .copied()
            .filter(|w| w.is_finite())
            .map(|w| w.max(0.0))
            .unwrap_or(1.0)
    }

    /// Rank in the priority list; unlisted agent types rank after every listed one.
    pub fn priority_rank(&self, agent_type: AgentType) -> usize {
        self.priority_order
            .iter()
            .position(|t| *t == agent_type)
            .unwrap_or(self.priority_order.len())
    }
}
