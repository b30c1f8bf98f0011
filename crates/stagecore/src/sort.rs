use crate::{CycleError, NodeId, WorkGraph};
use std::fmt;

/// One round of the sort: nodes whose dependencies all sit in earlier rounds
pub type Group = Vec<NodeId>;

/// Ordered rounds produced by [`grouped_topological_sort`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grouping {
    groups: Vec<Group>,
}

impl Grouping {
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Group> {
        self.groups.iter()
    }

    /// Round in which `id` was placed
    pub fn group_index_of(&self, id: NodeId) -> Option<usize> {
        self.groups.iter().position(|group| group.contains(&id))
    }

    /// All nodes in execution order
    pub fn flatten(&self) -> Vec<NodeId> {
        self.groups.iter().flatten().copied().collect()
    }
}

impl<'a> IntoIterator for &'a Grouping {
    type Item = &'a Group;
    type IntoIter = std::slice::Iter<'a, Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Kahn's algorithm producing levels instead of a flat order.
///
/// Every round takes all nodes whose unresolved dependency count reached zero,
/// keeping their input order, then releases their dependents. A round without
/// any ready node while work remains means the rest of the graph is stuck
/// behind a cycle.
pub fn grouped_topological_sort<T: fmt::Display>(graph: &WorkGraph<T>) -> Result<Grouping, CycleError> {
    let mut unresolved: Vec<usize> = graph
        .node_ids()
        .map(|id| graph.dependencies(id).len())
        .collect();
    let mut queue: Vec<NodeId> = graph.node_ids().collect();
    let mut groups = Vec::new();

    while !queue.is_empty() {
        let (ready, deferred): (Vec<NodeId>, Vec<NodeId>) = queue
            .into_iter()
            .partition(|id| unresolved[id.index()] == 0);

        if ready.is_empty() {
            tracing::debug!(
                "Grouping stuck after {} rounds with {} nodes left",
                groups.len(),
                deferred.len()
            );
            return Err(CycleError::from_stuck(graph, deferred));
        }

        for &id in &ready {
            for dependent in graph.dependents(id) {
                unresolved[dependent.index()] -= 1;
            }
        }

        tracing::debug!("Round {}: {} ready, {} deferred", groups.len(), ready.len(), deferred.len());
        groups.push(ready);
        queue = deferred;
    }

    Ok(Grouping { groups })
}
