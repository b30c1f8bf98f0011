use crate::{NodeId, WorkGraph};
use std::collections::HashSet;

/// Upper bound on the number of witness paths collected for one error
pub const MAX_WITNESS_PATHS: usize = 32;

/// Find cyclic paths among the nodes a grouping could not place.
///
/// The walk starts from a single stuck node that is known to sit on a cycle and
/// follows the dependents relation. Each time it reaches a node already on the
/// current path, the path from the root up to that node is recorded. Cycles not
/// reachable from the root are not reported.
///
/// A node is expanded at most once. After its dependents are exhausted it is
/// marked finished and later paths reaching it stop there, which keeps the walk
/// linear in the size of the stuck subgraph.
pub(crate) fn witness_paths<T>(graph: &WorkGraph<T>, stuck: &[NodeId]) -> Vec<Vec<NodeId>> {
    let stuck_set: HashSet<NodeId> = stuck.iter().copied().collect();
    let Some(root) = cycle_root(graph, stuck, &stuck_set) else {
        return Vec::new();
    };

    let children = |id: NodeId| -> std::vec::IntoIter<NodeId> {
        graph
            .dependents(id)
            .into_iter()
            .filter(|dependent| stuck_set.contains(dependent))
            .collect::<Vec<_>>()
            .into_iter()
    };

    let mut witnesses = Vec::new();
    let mut path = vec![root];
    let mut on_path: HashSet<NodeId> = HashSet::from([root]);
    let mut finished: HashSet<NodeId> = HashSet::new();
    let mut frames = vec![children(root)];

    while let Some(frame) = frames.last_mut() {
        match frame.next() {
            Some(next) if on_path.contains(&next) => {
                let mut witness = path.clone();
                witness.push(next);
                witnesses.push(witness);
                if witnesses.len() >= MAX_WITNESS_PATHS {
                    break;
                }
            }
            Some(next) if finished.contains(&next) => {}
            Some(next) => {
                path.push(next);
                on_path.insert(next);
                frames.push(children(next));
            }
            None => {
                frames.pop();
                if let Some(done) = path.pop() {
                    on_path.remove(&done);
                    finished.insert(done);
                }
            }
        }
    }

    witnesses
}

/// Walk backwards from the first stuck node through stuck dependencies until a
/// node repeats. Every stuck node has at least one stuck dependency, so the walk
/// always closes on a node that lies on a cycle.
fn cycle_root<T>(graph: &WorkGraph<T>, stuck: &[NodeId], stuck_set: &HashSet<NodeId>) -> Option<NodeId> {
    let mut current = *stuck.first()?;
    let mut seen = HashSet::new();

    while seen.insert(current) {
        current = graph
            .dependencies(current)
            .iter()
            .copied()
            .find(|dependency| stuck_set.contains(dependency))?;
    }

    Some(current)
}
