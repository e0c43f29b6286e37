//! Directed graph with deterministic topological sorting.
//!
//! Both the module import graph and the resource dependency graph are
//! instances of [`Graph`]. An edge `A -> B` reads "A depends on B": a
//! topological sort places B before A, so dependencies always come
//! first in the resulting sequence.
//!
//! Cycles are a user error. [`Graph::sort`] detects them via Kahn's
//! residual set rather than recursion-stack tracking, so the returned
//! error names every node still entangled in the cycle; callers can
//! render that residue with [`Graph::residual_graph`] and
//! [`Graph::as_dot`] for diagnosis.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::io;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use thiserror::Error;

/// Errors that can occur during graph operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// An edge endpoint was never added as a node.
    #[error("node {0} is not in the graph")]
    NodeNotFound(String),

    /// The graph contains at least one cycle.
    ///
    /// `residual` holds every node whose dependencies could not be
    /// satisfied - all cycle participants plus anything that depends
    /// on them.
    #[error("circular dependency detected, residual nodes: {}", residual.join(", "))]
    CircularDependency { residual: Vec<String> },
}

/// A directed graph over string-keyed nodes.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl Graph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Adds a node to the graph.
    ///
    /// Adding a node that already exists is a no-op.
    pub fn add_node(&mut self, name: &str) {
        if self.index.contains_key(name) {
            return;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
    }

    /// Returns true if the named node is in the graph.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Adds a directed edge from `from` to `to`, meaning `from`
    /// depends on `to`.
    ///
    /// Adding an edge twice is a no-op. Both endpoints must already be
    /// nodes in the graph.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let from_idx = *self
            .index
            .get(from)
            .ok_or_else(|| GraphError::NodeNotFound(from.to_string()))?;
        let to_idx = *self
            .index
            .get(to)
            .ok_or_else(|| GraphError::NodeNotFound(to.to_string()))?;

        if self.graph.find_edge(from_idx, to_idx).is_none() {
            self.graph.add_edge(from_idx, to_idx, ());
        }
        Ok(())
    }

    /// Returns the direct dependencies of a node (targets of its
    /// outgoing edges), sorted by name.
    ///
    /// An unknown node has no dependencies.
    pub fn dependencies(&self, name: &str) -> Vec<String> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut deps: Vec<String> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].clone())
            .collect();
        deps.sort();
        deps
    }

    /// Returns the nodes in dependency-first order.
    ///
    /// Kahn's algorithm with lexicographic tie-breaking: whenever more
    /// than one node is ready, the smallest name is emitted first, so
    /// the same graph always sorts to the same sequence.
    ///
    /// # Errors
    ///
    /// [`GraphError::CircularDependency`] when not every node can be
    /// ordered; the error carries the residual node set.
    pub fn sort(&self) -> Result<Vec<String>, GraphError> {
        // Out-degree counts unsatisfied dependencies; a node is ready
        // once all of its dependencies have been emitted.
        let mut pending: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                (
                    idx,
                    self.graph
                        .neighbors_directed(idx, Direction::Outgoing)
                        .count(),
                )
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<(String, NodeIndex)>> = pending
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&idx, _)| Reverse((self.graph[idx].clone(), idx)))
            .collect();

        let mut sorted = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((name, idx))) = ready.pop() {
            sorted.push(name);
            for dependent in self.graph.neighbors_directed(idx, Direction::Incoming) {
                if let Some(count) = pending.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse((self.graph[dependent].clone(), dependent)));
                    }
                }
            }
            pending.remove(&idx);
        }

        if sorted.len() != self.graph.node_count() {
            let mut residual: Vec<String> = pending
                .iter()
                .filter(|(_, &count)| count > 0)
                .map(|(&idx, _)| self.graph[idx].clone())
                .collect();
            residual.sort();
            return Err(GraphError::CircularDependency { residual });
        }

        Ok(sorted)
    }

    /// Builds the subgraph induced by the given nodes.
    ///
    /// Used to materialize the residue of a failed sort so it can be
    /// rendered with [`Graph::as_dot`].
    pub fn residual_graph(&self, nodes: &[String]) -> Graph {
        let mut residual = Graph::new();
        for name in nodes {
            if self.contains(name) {
                residual.add_node(name);
            }
        }
        for name in nodes {
            for dep in self.dependencies(name) {
                if residual.contains(&dep) {
                    // Both endpoints were just added.
                    let _ = residual.add_edge(name, &dep);
                }
            }
        }
        residual
    }

    /// Writes the graph as a DOT document named `name`.
    ///
    /// Nodes and edges are emitted in lexicographic order so the
    /// output is reproducible.
    pub fn as_dot<W: io::Write>(&self, name: &str, w: &mut W) -> io::Result<()> {
        writeln!(w, "digraph {} {{", name)?;

        let mut names: Vec<&String> = self.index.keys().collect();
        names.sort();
        for node in &names {
            writeln!(w, "\t\"{}\";", node)?;
        }
        for node in &names {
            for dep in self.dependencies(node) {
                writeln!(w, "\t\"{}\" -> \"{}\";", node, dep)?;
            }
        }

        writeln!(w, "}}")
    }
}
