use std::collections::{HashMap, HashSet};

use crate::error::{Result, StackForgeError};

/// Details about a detected dependency cycle
#[derive(Debug, Clone)]
pub struct CycleInfo {
    /// The services participating in the cycle, in traversal order, without
    /// repeating the closing node
    pub cycle_path: Vec<String>,
    pub description: String,
}

/// Directed dependency graph for one stage. Every edge points from a
/// dependency to its dependent, so a topological order provisions producers
/// before consumers. Nodes keep their declaration order, which is also the
/// tie-breaking order of the sort.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    indices: HashMap<String, usize>,
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Creates a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: impl Into<String>) {
        let node = node.into();
        if !self.indices.contains_key(&node) {
            self.indices.insert(node.clone(), self.nodes.len());
            self.edges.entry(node.clone()).or_default();
            self.nodes.push(node);
        }
    }

    /// Adds an edge from a dependency to one of its dependents
    pub fn add_edge(&mut self, dependency: impl Into<String>, dependent: impl Into<String>) {
        let dependency = dependency.into();
        let dependent = dependent.into();
        self.add_node(dependency.clone());
        self.add_node(dependent.clone());
        if let Some(dependents) = self.edges.get_mut(&dependency) {
            if !dependents.contains(&dependent) {
                dependents.push(dependent);
            }
        }
    }

    pub fn contains(&self, node: &str) -> bool {
        self.indices.contains_key(node)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The services that directly depend on the given node
    pub fn dependents_of(&self, node: &str) -> &[String] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn detect_cycles(&self) -> Option<CycleInfo> {
        // A node is either untouched, on the active path (path_set), or fully
        // explored (visited_set only). An edge back into the active path is
        // the only way to close a cycle.
        let mut visited_set = HashSet::new();
        let mut path_set = HashSet::new();
        let mut path = Vec::new();

        for start_node in &self.nodes {
            if !visited_set.contains(start_node)
                && self.dfs_detect_cycle(start_node, &mut visited_set, &mut path, &mut path_set)
            {
                // The traversal pushed the closing node again; the cycle spans
                // from its first occurrence up to (but not including) the repeat
                let last = path.last().cloned().unwrap_or_default();
                let cycle_start = path.iter().position(|n| *n == last).unwrap_or(0);
                let closed = path[cycle_start..].to_vec();
                let cycle = closed[..closed.len().saturating_sub(1)].to_vec();

                return Some(CycleInfo {
                    cycle_path: cycle,
                    description: format!("Circular dependency detected: {}", closed.join(" -> ")),
                });
            }
        }

        None
    }

    /// Walks dependents depth-first, keeping `path` as the active chain
    fn dfs_detect_cycle(
        &self,
        node: &String,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
        path_set: &mut HashSet<String>,
    ) -> bool {
        if path_set.contains(node) {
            // Push the closing node again so the caller can slice the cycle
            // out of the path
            path.push(node.clone());
            return true;
        }

        if visited.contains(node) {
            return false;
        }

        visited.insert(node.clone());
        path.push(node.clone());
        path_set.insert(node.clone());

        if let Some(dependents) = self.edges.get(node) {
            for dependent in dependents {
                if self.dfs_detect_cycle(dependent, visited, path, path_set) {
                    return true;
                }
            }
        }

        path.pop();
        path_set.remove(node);

        false
    }

    /// Produces the deterministic topological provisioning order: every
    /// dependency comes before its dependents, ties broken by declaration
    /// order so identical input always yields an identical order.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut indegree: HashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.as_str(), 0)).collect();
        for dependents in self.edges.values() {
            for dependent in dependents {
                if let Some(count) = indegree.get_mut(dependent.as_str()) {
                    *count += 1;
                }
            }
        }

        // Ready set keyed by declaration index keeps the selection deterministic
        let mut ready: std::collections::BTreeSet<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| indegree[n.as_str()] == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(&index) = ready.iter().next() {
            ready.remove(&index);
            let node = &self.nodes[index];
            order.push(node.clone());

            for dependent in self.dependents_of(node) {
                let count = indegree
                    .get_mut(dependent.as_str())
                    .ok_or_else(|| StackForgeError::Config(format!("Unknown node '{}'", dependent)))?;
                *count -= 1;
                if *count == 0 {
                    ready.insert(self.indices[dependent.as_str()]);
                }
            }
        }

        if order.len() < self.nodes.len() {
            let cycle = self
                .detect_cycles()
                .map(|info| info.cycle_path)
                .unwrap_or_else(|| self.nodes.iter().filter(|n| !order.contains(n)).cloned().collect());
            return Err(StackForgeError::CyclicDependency(cycle));
        }

        Ok(order)
    }
}
