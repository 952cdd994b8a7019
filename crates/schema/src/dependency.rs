//! Dependency graph between computed fields
//!
//! Each computed field is a node with an edge to every dependency that is
//! itself a computed field of the same type. Plain fields are leaves and are
//! not part of the graph.

use crate::field::FieldDefinition;
use loreforge_core::{EngineError, EngineResult};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Result of scanning field definitions for dependency cycles
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircularDependencyReport {
    pub has_circular: bool,

    /// Keys from the cycle's entry node back to itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_path: Option<Vec<String>>,
}

impl CircularDependencyReport {
    /// Path rendered as `a -> b -> a`
    pub fn describe(&self) -> Option<String> {
        self.cycle_path.as_ref().map(|path| path.join(" -> "))
    }
}

/// Adjacency list over computed fields, in declaration order
struct DependencyGraph<'a> {
    nodes: Vec<&'a str>,
    edges: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> DependencyGraph<'a> {
    fn build(fields: &'a [FieldDefinition]) -> Self {
        let nodes: Vec<&str> = fields
            .iter()
            .filter(|f| f.is_computed())
            .map(|f| f.key.as_str())
            .collect();
        let computed: HashSet<&str> = nodes.iter().copied().collect();

        let edges = fields
            .iter()
            .filter(|f| f.is_computed())
            .map(|f| {
                let targets = f
                    .dependencies()
                    .iter()
                    .map(String::as_str)
                    .filter(|dep| computed.contains(dep))
                    .collect();
                (f.key.as_str(), targets)
            })
            .collect();

        Self { nodes, edges }
    }

    fn targets(&self, node: &str) -> &[&'a str] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Depth-first walk state
struct Walk<'a> {
    visited: HashSet<&'a str>,
    on_stack: HashSet<&'a str>,
    path: Vec<&'a str>,
    finished: Vec<&'a str>,
}

impl<'a> Walk<'a> {
    fn new() -> Self {
        Self {
            visited: HashSet::new(),
            on_stack: HashSet::new(),
            path: Vec::new(),
            finished: Vec::new(),
        }
    }

    /// Visit `node`; returns the cycle if one is reachable from it
    fn visit(&mut self, graph: &DependencyGraph<'a>, node: &'a str) -> Option<Vec<String>> {
        self.visited.insert(node);
        self.on_stack.insert(node);
        self.path.push(node);

        for &dep in graph.targets(node) {
            if self.on_stack.contains(dep) {
                let start = self.path.iter().position(|n| *n == dep).unwrap_or(0);
                let mut cycle: Vec<String> =
                    self.path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(dep.to_string());
                return Some(cycle);
            }
            if !self.visited.contains(dep) {
                if let Some(cycle) = self.visit(graph, dep) {
                    return Some(cycle);
                }
            }
        }

        self.on_stack.remove(node);
        self.path.pop();
        self.finished.push(node);
        None
    }
}

/// Detect a dependency cycle among computed fields
pub fn detect_circular_dependencies(fields: &[FieldDefinition]) -> CircularDependencyReport {
    let graph = DependencyGraph::build(fields);
    let mut walk = Walk::new();

    for &node in &graph.nodes {
        if walk.visited.contains(node) {
            continue;
        }
        if let Some(cycle) = walk.visit(&graph, node) {
            tracing::debug!(cycle = %cycle.join(" -> "), "circular dependency");
            return CircularDependencyReport {
                has_circular: true,
                cycle_path: Some(cycle),
            };
        }
    }

    CircularDependencyReport::default()
}

/// Computed field keys ordered so every field comes after its dependencies
pub fn evaluation_order(fields: &[FieldDefinition]) -> EngineResult<Vec<String>> {
    let graph = DependencyGraph::build(fields);
    let mut walk = Walk::new();

    for &node in &graph.nodes {
        if walk.visited.contains(node) {
            continue;
        }
        if let Some(path) = walk.visit(&graph, node) {
            return Err(EngineError::CircularDependency { path });
        }
    }

    Ok(walk.finished.iter().map(|n| n.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ComputedFieldConfig;
    use loreforge_core::{FieldType, OutputType};
    use proptest::prelude::*;

    fn computed(key: &str, deps: &[&str]) -> FieldDefinition {
        FieldDefinition::computed(
            key,
            key,
            ComputedFieldConfig::new("", deps.iter().copied(), OutputType::Number),
        )
    }

    fn plain(key: &str) -> FieldDefinition {
        FieldDefinition::new(key, key, FieldType::Number)
    }

    #[test]
    fn test_no_computed_fields() {
        let report = detect_circular_dependencies(&[plain("a"), plain("b")]);
        assert!(!report.has_circular);
        assert!(report.cycle_path.is_none());
        assert!(!detect_circular_dependencies(&[]).has_circular);
    }

    #[test]
    fn test_empty_dependencies() {
        let report = detect_circular_dependencies(&[computed("a", &[]), computed("b", &[])]);
        assert!(!report.has_circular);
    }

    #[test]
    fn test_self_loop() {
        let report = detect_circular_dependencies(&[computed("a", &["a"])]);
        assert!(report.has_circular);
        assert_eq!(report.cycle_path, Some(vec!["a".to_string(), "a".to_string()]));
    }

    #[test]
    fn test_two_node_cycle() {
        let report = detect_circular_dependencies(&[
            computed("fieldA", &["fieldB"]),
            computed("fieldB", &["fieldA"]),
        ]);
        assert!(report.has_circular);
        let path = report.cycle_path.clone().unwrap();
        assert!(path.contains(&"fieldA".to_string()));
        assert!(path.contains(&"fieldB".to_string()));
        assert_eq!(report.describe().unwrap(), "fieldA -> fieldB -> fieldA");
    }

    #[test]
    fn test_three_node_cycle_starts_at_entry() {
        let report = detect_circular_dependencies(&[
            computed("lead", &["a"]),
            computed("a", &["b"]),
            computed("b", &["c"]),
            computed("c", &["a"]),
        ]);
        assert_eq!(
            report.cycle_path,
            Some(vec!["a".into(), "b".into(), "c".into(), "a".into()])
        );
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let report = detect_circular_dependencies(&[
            computed("top", &["left", "right"]),
            computed("left", &["bottom"]),
            computed("right", &["bottom"]),
            computed("bottom", &[]),
        ]);
        assert!(!report.has_circular);
    }

    #[test]
    fn test_plain_dependencies_are_leaves() {
        // `b` is not computed, so `a -> b` ends the walk
        let report = detect_circular_dependencies(&[computed("a", &["b"]), plain("b")]);
        assert!(!report.has_circular);
    }

    #[test]
    fn test_evaluation_order() {
        let fields = vec![
            computed("total", &["subtotal", "tax"]),
            plain("price"),
            computed("subtotal", &["price"]),
            computed("tax", &["subtotal"]),
        ];
        assert_eq!(evaluation_order(&fields).unwrap(), vec!["subtotal", "tax", "total"]);
    }

    #[test]
    fn test_evaluation_order_rejects_cycles() {
        let err = evaluation_order(&[computed("a", &["b"]), computed("b", &["a"])]).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
    }

    proptest! {
        // edges only point to lower indices, so the graph is always acyclic
        #[test]
        fn prop_dags_have_no_cycle(edges in proptest::collection::vec(
            proptest::collection::vec(any::<prop::sample::Index>(), 0..4),
            1..8,
        )) {
            let keys: Vec<String> = (0..edges.len()).map(|i| format!("f{}", i)).collect();
            let fields: Vec<FieldDefinition> = edges
                .iter()
                .enumerate()
                .map(|(i, targets)| {
                    let deps: Vec<&str> = if i == 0 {
                        Vec::new()
                    } else {
                        targets.iter().map(|t| keys[t.index(i)].as_str()).collect()
                    };
                    computed(&keys[i], &deps)
                })
                .collect();
            prop_assert!(!detect_circular_dependencies(&fields).has_circular);
            prop_assert_eq!(evaluation_order(&fields).unwrap().len(), fields.len());
        }

        #[test]
        fn prop_ring_is_a_cycle(len in 1usize..8) {
            let keys: Vec<String> = (0..len).map(|i| format!("f{}", i)).collect();
            let fields: Vec<FieldDefinition> = (0..len)
                .map(|i| computed(&keys[i], &[keys[(i + 1) % len].as_str()]))
                .collect();
            let report = detect_circular_dependencies(&fields);
            prop_assert!(report.has_circular);
            let path = report.cycle_path.unwrap();
            prop_assert_eq!(path.len(), len + 1);
            prop_assert_eq!(path.first(), path.last());
        }
    }
}
