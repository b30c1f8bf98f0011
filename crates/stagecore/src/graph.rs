use crate::{CycleError, GraphError, Grouping};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::fmt;

/// Stable identity of a node inside one [`WorkGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(NodeIndex);

impl NodeId {
    /// Position of the node in insertion order
    pub fn index(self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0.index())
    }
}

/// A node of the work graph: an opaque payload plus its ordered dependencies
#[derive(Debug, Clone)]
pub struct WorkNode<T> {
    value: T,
    dependencies: Vec<NodeId>,
}

impl<T> WorkNode<T> {
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Declared dependencies in the order they were added
    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }
}

/// Arena of work nodes with dependency edges.
///
/// Edges are stored in the petgraph arena pointing from a dependency to its
/// dependent, so the outgoing neighbours of a node are the nodes waiting on it.
/// The forward dependency order lives on the node itself because it decides
/// how dependency results are handed to a task.
#[derive(Debug, Clone)]
pub struct WorkGraph<T> {
    graph: DiGraph<WorkNode<T>, ()>,
}

impl<T> WorkGraph<T> {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
        }
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            graph: DiGraph::with_capacity(nodes, edges),
        }
    }

    /// Add a node without dependencies
    pub fn add_node(&mut self, value: T) -> NodeId {
        NodeId(self.graph.add_node(WorkNode {
            value,
            dependencies: Vec::new(),
        }))
    }

    /// Add a node together with its dependencies
    pub fn add_node_with_dependencies(
        &mut self,
        value: T,
        dependencies: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        for dependency in dependencies {
            self.check(*dependency)?;
        }

        let id = self.add_node(value);
        for dependency in dependencies {
            self.add_dependency(id, *dependency)?;
        }
        Ok(id)
    }

    /// Register `dependency` as a prerequisite of `node`.
    ///
    /// Returns `false` when the edge already existed, in which case nothing
    /// changes.
    pub fn add_dependency(&mut self, node: NodeId, dependency: NodeId) -> Result<bool, GraphError> {
        self.check(node)?;
        self.check(dependency)?;

        if self.graph.contains_edge(dependency.0, node.0) {
            return Ok(false);
        }

        self.graph.add_edge(dependency.0, node.0, ());
        self.graph[node.0].dependencies.push(dependency);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.graph.node_count()
    }

    /// True when `node` depends directly on `dependency`
    pub fn contains_edge(&self, node: NodeId, dependency: NodeId) -> bool {
        self.contains(node) && self.contains(dependency) && self.graph.contains_edge(dependency.0, node.0)
    }

    pub fn node(&self, id: NodeId) -> Option<&WorkNode<T>> {
        self.graph.node_weight(id.0)
    }

    pub fn value(&self, id: NodeId) -> Option<&T> {
        self.node(id).map(WorkNode::value)
    }

    pub fn dependencies(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(WorkNode::dependencies).unwrap_or(&[])
    }

    /// Nodes that declared `id` as a dependency, in the order the edges were added
    pub fn dependents(&self, id: NodeId) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }

        // petgraph lists the most recently added edge first
        let mut dependents: Vec<NodeId> = self
            .graph
            .neighbors_directed(id.0, Direction::Outgoing)
            .map(NodeId)
            .collect();
        dependents.reverse();
        dependents
    }

    /// All node ids in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices().map(NodeId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &WorkNode<T>)> + '_ {
        self.graph
            .node_indices()
            .map(move |idx| (NodeId(idx), &self.graph[idx]))
    }

    /// Underlying petgraph arena, edges pointing from dependency to dependent
    pub fn as_petgraph(&self) -> &DiGraph<WorkNode<T>, ()> {
        &self.graph
    }

    fn check(&self, id: NodeId) -> Result<(), GraphError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(GraphError::NodeNotFound(id.to_string()))
        }
    }
}

impl<T: fmt::Display> WorkGraph<T> {
    /// Group the nodes into rounds, see [`crate::grouped_topological_sort`]
    pub fn grouped_topological_sort(&self) -> Result<Grouping, CycleError> {
        crate::grouped_topological_sort(self)
    }
}

impl<T> Default for WorkGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}
