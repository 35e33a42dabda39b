//! Dependency resolution
//!
//! Produces a deterministic execution order via depth-first post-order
//! traversal: dependencies are visited (in declared order) before the node
//! itself is appended. Nodes are visited in declaration order, so identical
//! input always yields identical output.
//!
//! Both walks keep their own stack, so long dependency chains cannot
//! exhaust the thread stack.
//!
//! A node met again while still "visiting" means a cycle. When that happens
//! the resolver computes the strongly connected components of the graph so
//! that **every** task implicated in any cycle is reported, not just the
//! first back-edge found.

use super::task::Task;
use crate::agent::AgentTask;
use crate::core::error::DomainError;
use crate::plan::validation::{IssueCode, ValidationIssue};
use std::collections::{HashMap, HashSet};

/// Anything with an id and a list of dependency ids.
pub trait DependencyNode {
    fn node_id(&self) -> &str;
    fn dependency_ids(&self) -> Vec<&str>;
}

impl DependencyNode for Task {
    fn node_id(&self) -> &str {
        self.id.as_str()
    }

    fn dependency_ids(&self) -> Vec<&str> {
        self.dependencies.iter().map(|d| d.as_str()).collect()
    }
}

impl DependencyNode for AgentTask {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn dependency_ids(&self) -> Vec<&str> {
        self.dependencies.iter().map(String::as_str).collect()
    }
}

impl<T: DependencyNode> DependencyNode for &T {
    fn node_id(&self) -> &str {
        T::node_id(self)
    }

    fn dependency_ids(&self) -> Vec<&str> {
        T::dependency_ids(self)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Builds execution orders from declared dependencies.
pub struct DependencyResolver;

impl DependencyResolver {
    /// Resolve an execution order, returned as indices into `nodes`.
    ///
    /// Fails with [`DomainError::Validation`] for duplicate or dangling ids
    /// and with [`DomainError::CircularDependency`] naming every task in
    /// any cycle.
    pub fn resolve_indices<N: DependencyNode>(nodes: &[N]) -> Result<Vec<usize>, DomainError> {
        let index = Self::index_nodes(nodes)?;

        let mut marks = vec![Mark::Unvisited; nodes.len()];
        let mut order = Vec::with_capacity(nodes.len());
        let mut cycle_seen = false;

        for start in 0..nodes.len() {
            Self::visit(start, nodes, &index, &mut marks, &mut order, &mut cycle_seen);
        }

        if cycle_seen {
            return Err(DomainError::CircularDependency(Self::find_cycle_members(
                nodes,
            )));
        }

        Ok(order)
    }

    /// Resolve an execution order, returning references in order.
    pub fn resolve<N: DependencyNode>(nodes: &[N]) -> Result<Vec<&N>, DomainError> {
        Ok(Self::resolve_indices(nodes)?
            .into_iter()
            .map(|i| &nodes[i])
            .collect())
    }

    /// Every node id that takes part in a cycle, in declaration order.
    ///
    /// Unknown dependency ids are ignored here; they are reported separately.
    pub fn find_cycle_members<N: DependencyNode>(nodes: &[N]) -> Vec<String> {
        let mut index = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            index.entry(node.node_id()).or_insert(i);
        }

        let mut tarjan = Tarjan::new(nodes.len());
        for i in 0..nodes.len() {
            if tarjan.indices[i].is_none() {
                tarjan.strong_connect(i, nodes, &index);
            }
        }

        let mut members = HashSet::new();
        for component in &tarjan.components {
            let self_loop = component.len() == 1 && {
                let only = component[0];
                nodes[only]
                    .dependency_ids()
                    .contains(&nodes[only].node_id())
            };
            if component.len() > 1 || self_loop {
                members.extend(component.iter().copied());
            }
        }

        let mut ordered: Vec<usize> = members.into_iter().collect();
        ordered.sort_unstable();
        ordered
            .into_iter()
            .map(|i| nodes[i].node_id().to_string())
            .collect()
    }

    fn index_nodes<N: DependencyNode>(nodes: &[N]) -> Result<HashMap<&str, usize>, DomainError> {
        let mut index = HashMap::with_capacity(nodes.len());
        let mut issues = Vec::new();

        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.node_id(), i).is_some() {
                issues.push(ValidationIssue::error(
                    IssueCode::DuplicateTaskId,
                    Some(node.node_id()),
                    format!("Duplicate task id '{}'", node.node_id()),
                ));
            }
        }

        for node in nodes {
            for dep in node.dependency_ids() {
                if !index.contains_key(dep) {
                    issues.push(ValidationIssue::error(
                        IssueCode::MissingDependency,
                        Some(node.node_id()),
                        format!(
                            "Task '{}' depends on unknown task '{}'",
                            node.node_id(),
                            dep
                        ),
                    ));
                }
            }
        }

        if issues.is_empty() {
            Ok(index)
        } else {
            Err(DomainError::Validation(issues))
        }
    }

    fn visit<N: DependencyNode>(
        start: usize,
        nodes: &[N],
        index: &HashMap<&str, usize>,
        marks: &mut [Mark],
        order: &mut Vec<usize>,
        cycle_seen: &mut bool,
    ) {
        if marks[start] != Mark::Unvisited {
            return;
        }

        // (node, resolved dependencies, next dependency to visit)
        let mut stack = vec![(start, dependency_indices(&nodes[start], index), 0)];
        marks[start] = Mark::Visiting;

        while let Some((node, deps, cursor)) = stack.last_mut() {
            let Some(&dep) = deps.get(*cursor) else {
                let node = *node;
                stack.pop();
                marks[node] = Mark::Done;
                order.push(node);
                continue;
            };
            *cursor += 1;
            match marks[dep] {
                Mark::Done => {}
                Mark::Visiting => *cycle_seen = true,
                Mark::Unvisited => {
                    marks[dep] = Mark::Visiting;
                    stack.push((dep, dependency_indices(&nodes[dep], index), 0));
                }
            }
        }
    }
}

/// Known dependency indices of `node`, in declared order.
fn dependency_indices<N: DependencyNode>(node: &N, index: &HashMap<&str, usize>) -> Vec<usize> {
    node.dependency_ids()
        .into_iter()
        .filter_map(|dep| index.get(dep).copied())
        .collect()
}

/// Tarjan's strongly connected components over the dependency edges.
struct Tarjan {
    next_index: usize,
    indices: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    components: Vec<Vec<usize>>,
}

impl Tarjan {
    fn new(n: usize) -> Self {
        Self {
            next_index: 0,
            indices: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            components: Vec::new(),
        }
    }

    fn open(&mut self, v: usize) {
        self.indices[v] = Some(self.next_index);
        self.lowlink[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
    }

    fn strong_connect<N: DependencyNode>(
        &mut self,
        root: usize,
        nodes: &[N],
        index: &HashMap<&str, usize>,
    ) {
        self.open(root);
        let mut calls = vec![(root, dependency_indices(&nodes[root], index), 0)];

        while let Some((v, deps, cursor)) = calls.last_mut() {
            let v = *v;
            if let Some(&w) = deps.get(*cursor) {
                *cursor += 1;
                match self.indices[w] {
                    None => {
                        self.open(w);
                        calls.push((w, dependency_indices(&nodes[w], index), 0));
                    }
                    Some(w_index) if self.on_stack[w] => {
                        self.lowlink[v] = self.lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            calls.pop();
            if let Some(&(parent, _, _)) = calls.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[v]);
            }

            if Some(self.lowlink[v]) == self.indices[v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::task::Task;

    fn task(id: &str, deps: &[&str]) -> Task {
        deps.iter()
            .fold(Task::new(id, id), |t, d| t.with_dependency(*d))
    }

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.id.to_string()).collect()
    }

    fn position(order: &[String], id: &str) -> usize {
        order.iter().position(|x| x == id).unwrap()
    }

    #[test]
    fn test_independent_tasks_keep_declaration_order() {
        let tasks = vec![task("a", &[]), task("b", &[]), task("c", &[])];
        let order = DependencyResolver::resolve(&tasks).unwrap();
        assert_eq!(ids(&order), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dependencies_come_first() {
        let tasks = vec![
            task("deploy", &["build", "test"]),
            task("test", &["build"]),
            task("build", &["setup"]),
            task("setup", &[]),
        ];
        let order = ids(&DependencyResolver::resolve(&tasks).unwrap());
        assert_eq!(order, vec!["setup", "build", "test", "deploy"]);
    }

    #[test]
    fn test_every_task_after_transitive_dependencies() {
        let tasks = vec![
            task("e", &["d", "b"]),
            task("d", &["c"]),
            task("c", &["a"]),
            task("b", &["a"]),
            task("a", &[]),
            task("f", &[]),
        ];
        let order = ids(&DependencyResolver::resolve(&tasks).unwrap());
        assert_eq!(order.len(), tasks.len());
        for t in &tasks {
            for dep in &t.dependencies {
                assert!(position(&order, dep.as_str()) < position(&order, t.id.as_str()));
            }
        }
    }

    #[test]
    fn test_order_is_stable() {
        let tasks = vec![task("x", &["z"]), task("y", &[]), task("z", &[])];
        let first = ids(&DependencyResolver::resolve(&tasks).unwrap());
        let second = ids(&DependencyResolver::resolve(&tasks).unwrap());
        assert_eq!(first, second);
        assert_eq!(first, vec!["z", "x", "y"]);
    }

    #[test]
    fn test_cycle_reports_all_members() {
        let tasks = vec![
            task("a", &["b"]),
            task("b", &["a"]),
            task("c", &["d"]),
            task("d", &["c"]),
            task("e", &["a"]),
        ];
        let err = DependencyResolver::resolve(&tasks).unwrap_err();
        assert_eq!(
            err,
            DomainError::CircularDependency(vec![
                "a".into(),
                "b".into(),
                "c".into(),
                "d".into()
            ])
        );
    }

    #[test]
    fn test_cycle_through_finished_node_is_fully_reported() {
        // m -> p -> m is found first; n sits on m -> n -> p -> m which a
        // plain back-edge walk would miss.
        let tasks = vec![task("m", &["p", "n"]), task("n", &["p"]), task("p", &["m"])];
        let members = DependencyResolver::find_cycle_members(&tasks);
        assert_eq!(members, vec!["m", "n", "p"]);
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let tasks = vec![task("a", &["a"]), task("b", &[])];
        let err = DependencyResolver::resolve(&tasks).unwrap_err();
        assert_eq!(err, DomainError::CircularDependency(vec!["a".into()]));
    }

    #[test]
    fn test_long_chain_resolves() {
        const LEN: usize = 100_000;
        // Declared newest first so the walk descends the whole chain at once.
        let tasks: Vec<Task> = (0..LEN)
            .rev()
            .map(|i| {
                let t = Task::new(format!("t{i}"), "step");
                if i == 0 { t } else { t.with_dependency(format!("t{}", i - 1)) }
            })
            .collect();

        let order = DependencyResolver::resolve(&tasks).unwrap();
        assert_eq!(order.len(), LEN);
        assert_eq!(order[0].id.as_str(), "t0");
        assert_eq!(order[LEN - 1].id.as_str(), format!("t{}", LEN - 1));
        assert!(DependencyResolver::find_cycle_members(&tasks).is_empty());
    }

    #[test]
    fn test_long_cycle_reports_every_member() {
        const LEN: usize = 50_000;
        let tasks: Vec<Task> = (0..LEN)
            .map(|i| Task::new(format!("t{i}"), "step").with_dependency(format!("t{}", (i + 1) % LEN)))
            .collect();

        match DependencyResolver::resolve(&tasks).unwrap_err() {
            DomainError::CircularDependency(members) => assert_eq!(members.len(), LEN),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_dangling_dependency_is_validation_error() {
        let tasks = vec![task("a", &["missing"])];
        let err = DependencyResolver::resolve(&tasks).unwrap_err();
        match err {
            DomainError::Validation(issues) => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].code, IssueCode::MissingDependency);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let tasks = vec![task("a", &[]), task("a", &[])];
        assert!(matches!(
            DependencyResolver::resolve(&tasks),
            Err(DomainError::Validation(_))
        ));
    }
}
