//! Aggregation of agent results

use super::confidence::ConfidenceLevel;
use super::finding::{Finding, FindingKey};
use super::strategy::{AggregationKind, AggregationStrategy, ConflictRule};
use crate::agent::{AgentTaskResult, AgentType};
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A deduplicated finding with its combined confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedFinding {
    pub entity: String,
    pub content: String,
    pub category: Option<String>,
    pub confidence: ConfidenceLevel,
    /// Aggregated numeric score behind `confidence`
    pub confidence_score: f64,
    /// Ids of the agent tasks that reported this finding, in declaration order
    pub sources: Vec<String>,
    pub agent_types: Vec<AgentType>,
    pub votes: usize,
}

/// A finding that lost a conflict, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscardedFinding {
    pub content: String,
    pub sources: Vec<String>,
    pub confidence: ConfidenceLevel,
    pub confidence_score: f64,
}

/// Audit entry for one resolved conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub entity: String,
    pub kept: String,
    pub kept_sources: Vec<String>,
    pub discarded: Vec<DiscardedFinding>,
    pub resolution: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub strategy: AggregationKind,
    pub findings: Vec<AggregatedFinding>,
    pub conflicts: Vec<ConflictRecord>,
    pub participants: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub confidence: ConfidenceLevel,
    /// Mean agent confidence scaled by the share of agents that succeeded
    pub confidence_score: f64,
}

impl AggregatedResult {
    pub fn is_partial(&self) -> bool {
        self.failed > 0
    }
}

struct Contribution<'a> {
    /// Declaration order of the agent task
    order: usize,
    result: &'a AgentTaskResult,
    finding: &'a Finding,
}

struct Group<'a> {
    key: FindingKey,
    contributions: Vec<Contribution<'a>>,
    score: f64,
}

impl Group<'_> {
    fn latest_order(&self) -> usize {
        self.contributions.iter().map(|c| c.order).max().unwrap_or(0)
    }

    fn best_priority(&self, strategy: &AggregationStrategy) -> (usize, usize) {
        self.contributions
            .iter()
            .map(|c| (strategy.priority_rank(c.result.agent_type), c.order))
            .min()
            .unwrap_or((usize::MAX, usize::MAX))
    }

    fn sources(&self) -> Vec<String> {
        self.contributions
            .iter()
            .map(|c| c.result.task_id.clone())
            .collect()
    }

    fn content(&self) -> String {
        self.key.signature.clone()
    }
}

/// Combine agent results under `strategy`.
///
/// Fails only when there is nothing usable: no results at all, or every
/// participant failed. Partial failure lowers the overall confidence.
pub fn aggregate(
    results: &[AgentTaskResult],
    strategy: &AggregationStrategy,
) -> Result<AggregatedResult, DomainError> {
    if results.is_empty() {
        return Err(DomainError::NothingToAggregate);
    }

    let succeeded: Vec<(usize, &AgentTaskResult)> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_success())
        .collect();
    if succeeded.is_empty() {
        return Err(DomainError::AllAgentsFailed(results.len()));
    }

    let mut groups = collect_groups(&succeeded);
    for group in &mut groups {
        group.score = group_score(group, strategy);
    }

    let (kept, conflicts) = resolve_conflicts(groups, strategy);
    let mut findings: Vec<AggregatedFinding> = kept.iter().map(to_aggregated).collect();

    match strategy.kind {
        AggregationKind::Vote => findings.sort_by(|a, b| {
            b.votes
                .cmp(&a.votes)
                .then(b.confidence_score.total_cmp(&a.confidence_score))
        }),
        AggregationKind::Weighted => {
            findings.sort_by(|a, b| b.confidence_score.total_cmp(&a.confidence_score))
        }
        AggregationKind::Merge | AggregationKind::Priority => {}
    }

    let mean = ConfidenceLevel::mean(
        succeeded
            .iter()
            .map(|(_, r)| r.confidence.unwrap_or(ConfidenceLevel::Low)),
    )
    .unwrap_or(0.0);
    let participation = succeeded.len() as f64 / results.len() as f64;
    let confidence_score = mean * participation;

    Ok(AggregatedResult {
        strategy: strategy.kind,
        findings,
        conflicts,
        participants: results.len(),
        succeeded: succeeded.len(),
        failed: results.len() - succeeded.len(),
        confidence: ConfidenceLevel::from_score(confidence_score),
        confidence_score,
    })
}

fn collect_groups<'a>(succeeded: &[(usize, &'a AgentTaskResult)]) -> Vec<Group<'a>> {
    let mut groups: Vec<Group<'a>> = Vec::new();
    let mut index: HashMap<FindingKey, usize> = HashMap::new();

    for &(order, result) in succeeded {
        for finding in &result.findings {
            let key = finding.key();
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                groups.push(Group {
                    key,
                    contributions: Vec::new(),
                    score: 0.0,
                });
                groups.len() - 1
            });

            // One vote per agent task; a repeated report keeps its strongest confidence.
            let group = &mut groups[slot];
            match group.contributions.iter_mut().find(|c| c.order == order) {
                Some(existing) => {
                    if finding.confidence > existing.finding.confidence {
                        existing.finding = finding;
                    }
                }
                None => group.contributions.push(Contribution {
                    order,
                    result,
                    finding,
                }),
            }
        }
    }
    groups
}

fn group_score(group: &Group<'_>, strategy: &AggregationStrategy) -> f64 {
    let anchors = || group.contributions.iter().map(|c| c.finding.confidence.anchor());
    let mean = || {
        ConfidenceLevel::mean(group.contributions.iter().map(|c| c.finding.confidence))
            .unwrap_or(0.0)
    };

    match strategy.kind {
        AggregationKind::Merge => anchors().fold(0.0, f64::max),
        AggregationKind::Vote => mean(),
        AggregationKind::Weighted => {
            let (weighted, total) = group.contributions.iter().fold((0.0, 0.0), |(sum, w), c| {
                let weight = strategy.weight_for(c.result.agent_type);
                (sum + weight * c.finding.confidence.anchor(), w + weight)
            });
            if total > 0.0 { weighted / total } else { mean() }
        }
        AggregationKind::Priority => group
            .contributions
            .iter()
            .min_by_key(|c| (strategy.priority_rank(c.result.agent_type), c.order))
            .map(|c| c.finding.confidence.anchor())
            .unwrap_or(0.0),
    }
}

/// Findings about the same entity with different content are in conflict.
fn resolve_conflicts<'a>(
    groups: Vec<Group<'a>>,
    strategy: &AggregationStrategy,
) -> (Vec<Group<'a>>, Vec<ConflictRecord>) {
    let mut by_entity: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        match by_entity.iter_mut().find(|(e, _)| *e == group.key.entity) {
            Some((_, members)) => members.push(i),
            None => by_entity.push((group.key.entity.clone(), vec![i])),
        }
    }

    let mut discarded = vec![false; groups.len()];
    let mut conflicts = Vec::new();

    for (entity, members) in by_entity.iter().filter(|(_, m)| m.len() > 1) {
        let (winner, resolution) = match (strategy.kind, strategy.conflict_rule) {
            (AggregationKind::Priority, _) => (
                pick(members, |a, b| {
                    groups[b].best_priority(strategy) < groups[a].best_priority(strategy)
                }),
                "priority",
            ),
            (_, ConflictRule::KeepAll) => continue,
            (_, ConflictRule::HighestConfidence) => (
                pick(members, |a, b| groups[b].score > groups[a].score),
                "highest_confidence",
            ),
            (_, ConflictRule::MostRecent) => (
                pick(members, |a, b| {
                    groups[b].latest_order() >= groups[a].latest_order()
                }),
                "most_recent",
            ),
        };

        let losers: Vec<DiscardedFinding> = members
            .iter()
            .filter(|&&m| m != winner)
            .map(|&m| {
                discarded[m] = true;
                DiscardedFinding {
                    content: groups[m].content(),
                    sources: groups[m].sources(),
                    confidence: ConfidenceLevel::from_score(groups[m].score),
                    confidence_score: groups[m].score,
                }
            })
            .collect();

        conflicts.push(ConflictRecord {
            entity: entity.clone(),
            kept: groups[winner].content(),
            kept_sources: groups[winner].sources(),
            discarded: losers,
            resolution: resolution.to_string(),
        });
    }

    let kept = groups
        .into_iter()
        .zip(discarded)
        .filter_map(|(g, d)| (!d).then_some(g))
        .collect();
    (kept, conflicts)
}

/// Walk `members` in order, replacing the current pick whenever `better(current, candidate)`.
fn pick(members: &[usize], better: impl Fn(usize, usize) -> bool) -> usize {
    let mut best = members[0];
    for &candidate in &members[1..] {
        if better(best, candidate) {
            best = candidate;
        }
    }
    best
}

fn to_aggregated(group: &Group<'_>) -> AggregatedFinding {
    let first = &group.contributions[0];
    let mut agent_types = Vec::new();
    for c in &group.contributions {
        if !agent_types.contains(&c.result.agent_type) {
            agent_types.push(c.result.agent_type);
        }
    }
    AggregatedFinding {
        entity: first.finding.entity.trim().to_string(),
        content: group.content(),
        category: group
            .contributions
            .iter()
            .find_map(|c| c.finding.category.clone()),
        confidence: ConfidenceLevel::from_score(group.score),
        confidence_score: group.score,
        sources: group.sources(),
        agent_types,
        votes: group.contributions.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentOutput, AgentTask};
    use crate::core::error::TaskError;
    use serde_json::Value;

    fn ok(
        id: &str,
        agent_type: AgentType,
        confidence: ConfidenceLevel,
        findings: Vec<Finding>,
    ) -> AgentTaskResult {
        let task = AgentTask::new(id, agent_type);
        AgentTaskResult::from_output(
            &task,
            AgentOutput::success(Value::Null, confidence).with_findings(findings),
        )
    }

    fn failed(id: &str, agent_type: AgentType) -> AgentTaskResult {
        AgentTaskResult::failed(
            &AgentTask::new(id, agent_type),
            TaskError::execution("boom"),
        )
    }

    fn finding(entity: &str, content: &str, confidence: ConfidenceLevel) -> Finding {
        Finding::new(entity, content, confidence)
    }

    #[test]
    fn test_weighted_equal_weights_lands_between_anchors() {
        let results = vec![
            ok(
                "a",
                AgentType::CodeLocator,
                ConfidenceLevel::Low,
                vec![finding("src/auth.rs", "handles login", ConfidenceLevel::Low)],
            ),
            ok(
                "b",
                AgentType::PatternFinder,
                ConfidenceLevel::Medium,
                vec![finding("src/auth.rs", "handles login", ConfidenceLevel::Medium)],
            ),
            ok(
                "c",
                AgentType::DocumentationLocator,
                ConfidenceLevel::High,
                vec![finding("src/auth.rs", "handles login", ConfidenceLevel::High)],
            ),
        ];
        let out = aggregate(&results, &AggregationStrategy::weighted(HashMap::new())).unwrap();

        assert_eq!(out.findings.len(), 1);
        let merged = &out.findings[0];
        assert!(merged.confidence_score > ConfidenceLevel::Low.anchor());
        assert!(merged.confidence_score < ConfidenceLevel::High.anchor());
        assert_eq!(merged.confidence, ConfidenceLevel::Medium);
        assert_eq!(merged.votes, 3);
    }

    #[test]
    fn test_weighted_respects_weights() {
        let results = vec![
            ok(
                "a",
                AgentType::CodeLocator,
                ConfidenceLevel::Low,
                vec![finding("x", "y", ConfidenceLevel::Low)],
            ),
            ok(
                "b",
                AgentType::PatternFinder,
                ConfidenceLevel::VeryHigh,
                vec![finding("x", "y", ConfidenceLevel::VeryHigh)],
            ),
        ];
        let mut weights = HashMap::new();
        weights.insert(AgentType::CodeLocator, 0.0);
        let out = aggregate(&results, &AggregationStrategy::weighted(weights)).unwrap();
        assert_eq!(out.findings[0].confidence, ConfidenceLevel::VeryHigh);
    }

    #[test]
    fn test_vote_ranks_corroborated_first() {
        let results = vec![
            ok(
                "a",
                AgentType::CodeLocator,
                ConfidenceLevel::High,
                vec![
                    finding("lone.rs", "solo claim", ConfidenceLevel::VeryHigh),
                    finding("shared.rs", "common claim", ConfidenceLevel::Low),
                ],
            ),
            ok(
                "b",
                AgentType::PatternFinder,
                ConfidenceLevel::High,
                vec![finding("shared.rs", "common claim", ConfidenceLevel::Low)],
            ),
        ];
        let out = aggregate(&results, &AggregationStrategy::vote()).unwrap();
        assert_eq!(out.findings[0].entity, "shared.rs");
        assert_eq!(out.findings[0].votes, 2);
        assert_eq!(out.findings[1].votes, 1);
    }

    #[test]
    fn test_same_task_counts_once() {
        let results = vec![ok(
            "a",
            AgentType::CodeLocator,
            ConfidenceLevel::High,
            vec![
                finding("a.rs", "claim", ConfidenceLevel::Low),
                finding("./A.rs", "claim", ConfidenceLevel::High),
            ],
        )];
        let out = aggregate(&results, &AggregationStrategy::vote()).unwrap();
        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].votes, 1);
        assert_eq!(out.findings[0].confidence, ConfidenceLevel::High);
    }

    #[test]
    fn test_merge_keeps_conflicting_findings() {
        let results = vec![
            ok(
                "a",
                AgentType::CodeLocator,
                ConfidenceLevel::High,
                vec![finding("db.rs", "uses postgres", ConfidenceLevel::High)],
            ),
            ok(
                "b",
                AgentType::PatternFinder,
                ConfidenceLevel::High,
                vec![finding("db.rs", "uses sqlite", ConfidenceLevel::Low)],
            ),
        ];
        let out = aggregate(&results, &AggregationStrategy::merge()).unwrap();
        assert_eq!(out.findings.len(), 2);
        assert!(out.conflicts.is_empty());
    }

    #[test]
    fn test_priority_records_discarded_alternative() {
        let results = vec![
            ok(
                "loc",
                AgentType::CodeLocator,
                ConfidenceLevel::High,
                vec![finding("db.rs", "uses postgres", ConfidenceLevel::VeryHigh)],
            ),
            ok(
                "pat",
                AgentType::PatternFinder,
                ConfidenceLevel::High,
                vec![finding("db.rs", "uses sqlite", ConfidenceLevel::Low)],
            ),
        ];
        let strategy =
            AggregationStrategy::priority(vec![AgentType::PatternFinder, AgentType::CodeLocator]);
        let out = aggregate(&results, &strategy).unwrap();

        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].content, "uses sqlite");
        assert_eq!(out.conflicts.len(), 1);
        let conflict = &out.conflicts[0];
        assert_eq!(conflict.kept_sources, vec!["pat"]);
        assert_eq!(conflict.discarded[0].content, "uses postgres");
        assert_eq!(conflict.discarded[0].sources, vec!["loc"]);
        assert_eq!(conflict.resolution, "priority");
    }

    #[test]
    fn test_conflict_rules() {
        let results = vec![
            ok(
                "first",
                AgentType::CodeLocator,
                ConfidenceLevel::High,
                vec![finding("cfg", "old value", ConfidenceLevel::High)],
            ),
            ok(
                "second",
                AgentType::PatternFinder,
                ConfidenceLevel::High,
                vec![finding("cfg", "new value", ConfidenceLevel::Low)],
            ),
        ];

        let recent = aggregate(
            &results,
            &AggregationStrategy::merge().with_conflict_rule(ConflictRule::MostRecent),
        )
        .unwrap();
        assert_eq!(recent.findings.len(), 1);
        assert_eq!(recent.findings[0].content, "new value");

        let highest = aggregate(
            &results,
            &AggregationStrategy::merge().with_conflict_rule(ConflictRule::HighestConfidence),
        )
        .unwrap();
        assert_eq!(highest.findings.len(), 1);
        assert_eq!(highest.findings[0].content, "old value");
        assert_eq!(highest.conflicts[0].resolution, "highest_confidence");
    }

    #[test]
    fn test_partial_failure_lowers_confidence() {
        let results = vec![
            ok("a", AgentType::CodeLocator, ConfidenceLevel::High, vec![]),
            ok("b", AgentType::PatternFinder, ConfidenceLevel::High, vec![]),
            failed("c", AgentType::DocumentationLocator),
        ];
        let out = aggregate(&results, &AggregationStrategy::merge()).unwrap();
        assert_eq!(out.succeeded, 2);
        assert_eq!(out.failed, 1);
        assert!(out.is_partial());
        assert_eq!(out.confidence, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_all_failed_is_an_error() {
        let results = vec![
            failed("a", AgentType::CodeLocator),
            failed("b", AgentType::PatternFinder),
        ];
        assert_eq!(
            aggregate(&results, &AggregationStrategy::merge()),
            Err(DomainError::AllAgentsFailed(2))
        );
        assert_eq!(
            aggregate(&[], &AggregationStrategy::merge()),
            Err(DomainError::NothingToAggregate)
        );
    }
}
