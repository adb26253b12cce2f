use crate::error::{Error, Result};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Dependency graph over registered feature names.
///
/// Nodes are stored in registration order and the topological sort breaks
/// ties by that order, so resolving the same registration sequence twice
/// always yields the same result.
#[derive(Debug, Default, Clone)]
pub struct Graph {
    /// Node names in registration order.
    names: Vec<String>,
    index: HashMap<String, usize>,
    /// `after[f] = [d, ...]` means `f` enters each phase only after `d`
    after: Vec<Vec<usize>>,
    /// `dependents[d] = [f, ...]` means `f` runs after `d`
    dependents: Vec<Vec<usize>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Returns false if the name is already present.
    pub fn add_node(&mut self, name: &str) -> bool {
        if self.index.contains_key(name) {
            return false;
        }
        self.index.insert(name.to_string(), self.names.len());
        self.names.push(name.to_string());
        self.after.push(Vec::new());
        self.dependents.push(Vec::new());
        true
    }

    /// Add a "runs after" edge. Returns false when either endpoint is
    /// unknown; a constraint naming an absent feature is simply ignored by
    /// the caller rather than treated as an error.
    pub fn add_edge(&mut self, feature: &str, after: &str) -> bool {
        let (Some(&f), Some(&d)) = (self.index.get(feature), self.index.get(after)) else {
            return false;
        };
        if !self.after[f].contains(&d) {
            self.after[f].push(d);
            self.dependents[d].push(f);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Topological sort: every node exactly once, each node after everything
    /// it declared itself after. Ties break by registration order.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let mut in_degree: Vec<usize> = self.after.iter().map(Vec::len).collect();

        // Min-heap over registration indices keeps the output deterministic.
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut result = Vec::with_capacity(self.names.len());

        while let Some(Reverse(node)) = ready.pop() {
            result.push(self.names[node].clone());

            for &dependent in &self.dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if result.len() != self.names.len() {
            return Err(Error::DependencyCycle(self.find_cycle()));
        }

        Ok(result)
    }

    /// Find one cycle and return it as a path for the error message.
    fn find_cycle(&self) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for node in 0..self.names.len() {
            if !visited.contains(&node) {
                if let Some(cycle) = self.find_cycle_dfs(node, &mut visited, &mut rec_stack, &mut path)
                {
                    return cycle;
                }
            }
        }

        // Fallback if we cannot reconstruct the exact path
        self.names.iter().take(3).cloned().collect()
    }

    fn find_cycle_dfs(
        &self,
        node: usize,
        visited: &mut HashSet<usize>,
        rec_stack: &mut HashSet<usize>,
        path: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        for &dep in &self.after[node] {
            if !visited.contains(&dep) {
                if let Some(cycle) = self.find_cycle_dfs(dep, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(&dep) {
                let cycle_start = path.iter().position(|&n| n == dep).unwrap_or(0);
                let mut cycle: Vec<String> = path[cycle_start..]
                    .iter()
                    .map(|&n| self.names[n].clone())
                    .collect();
                cycle.push(self.names[dep].clone());
                return Some(cycle);
            }
        }

        rec_stack.remove(&node);
        path.pop();
        None
    }
}
