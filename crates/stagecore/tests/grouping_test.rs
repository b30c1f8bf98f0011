// crates/stagecore/tests/grouping_test.rs

use petgraph::algo::is_cyclic_directed;
use stagecore::{grouped_topological_sort, GraphError, Grouping, NodeId, WorkGraph};

/// Small deterministic generator so graph shapes are reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

/// Random DAG: node j may only depend on nodes added before it
fn random_dag(seed: u64, nodes: usize) -> WorkGraph<String> {
    let mut rng = Lcg(seed);
    let mut graph = WorkGraph::new();
    let mut ids: Vec<NodeId> = Vec::new();

    for i in 0..nodes {
        let id = graph.add_node(format!("n{}", i));
        if !ids.is_empty() {
            let edges = rng.below(4);
            for _ in 0..edges {
                let dep = ids[rng.below(ids.len() as u64) as usize];
                graph.add_dependency(id, dep).unwrap();
            }
        }
        ids.push(id);
    }

    graph
}

fn assert_valid_grouping<T>(graph: &WorkGraph<T>, grouping: &Grouping) {
    let flat = grouping.flatten();
    assert_eq!(flat.len(), graph.len(), "every node should be placed exactly once");

    let mut sorted = flat.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), graph.len(), "no node should be placed twice");

    for (index, group) in grouping.iter().enumerate() {
        assert!(!group.is_empty(), "groups are never empty");
        for &id in group {
            for &dep in graph.dependencies(id) {
                let dep_index = grouping.group_index_of(dep).unwrap();
                assert!(dep_index < index, "dependency {} must be in an earlier group than {}", dep, id);
            }
        }
    }
}

#[test]
fn test_empty_graph_has_no_groups() {
    let graph: WorkGraph<&str> = WorkGraph::new();
    let grouping = grouped_topological_sort(&graph).unwrap();

    assert!(grouping.is_empty());
    assert_eq!(grouping.len(), 0);
}

#[test]
fn test_single_node_is_one_group() {
    let mut graph = WorkGraph::new();
    let a = graph.add_node("a");

    let grouping = graph.grouped_topological_sort().unwrap();

    assert_eq!(grouping.groups(), &[vec![a]]);
}

#[test]
fn test_diamond_groups() {
    let mut graph = WorkGraph::new();
    let a = graph.add_node("A");
    let b = graph.add_node_with_dependencies("B", &[a]).unwrap();
    let c = graph.add_node_with_dependencies("C", &[a]).unwrap();
    let d = graph.add_node_with_dependencies("D", &[b, c]).unwrap();

    let grouping = graph.grouped_topological_sort().unwrap();

    assert_eq!(grouping.groups(), &[vec![a], vec![b, c], vec![d]]);
    assert_valid_grouping(&graph, &grouping);
}

#[test]
fn test_group_order_follows_insertion_order() {
    let mut graph = WorkGraph::new();
    // Declared in reverse of their natural order
    let late = graph.add_node("late");
    let x = graph.add_node("x");
    let early = graph.add_node("early");
    let y = graph.add_node("y");
    graph.add_dependency(late, early).unwrap();
    graph.add_dependency(y, early).unwrap();

    let grouping = graph.grouped_topological_sort().unwrap();

    assert_eq!(grouping.groups(), &[vec![x, early], vec![late, y]]);
}

#[test]
fn test_duplicate_dependency_is_noop() {
    let mut once = WorkGraph::new();
    let a1 = once.add_node("a");
    let b1 = once.add_node("b");
    assert!(once.add_dependency(b1, a1).unwrap());

    let mut twice = WorkGraph::new();
    let a2 = twice.add_node("a");
    let b2 = twice.add_node("b");
    assert!(twice.add_dependency(b2, a2).unwrap());
    assert!(!twice.add_dependency(b2, a2).unwrap());

    assert_eq!(twice.dependencies(b2), &[a2]);
    assert_eq!(twice.dependents(a2), vec![b2]);
    assert_eq!(twice.edge_count(), 1);
    assert_eq!(
        once.grouped_topological_sort().unwrap(),
        twice.grouped_topological_sort().unwrap()
    );
}

#[test]
fn test_duplicate_in_dependency_list_is_deduplicated() {
    let mut graph = WorkGraph::new();
    let a = graph.add_node("a");
    let b = graph.add_node_with_dependencies("b", &[a, a]).unwrap();

    assert_eq!(graph.dependencies(b), &[a]);
    assert_eq!(graph.grouped_topological_sort().unwrap().groups(), &[vec![a], vec![b]]);
}

#[test]
fn test_dependencies_and_dependents_keep_insertion_order() {
    let mut graph = WorkGraph::new();
    let root = graph.add_node("root");
    let other = graph.add_node("other");
    let first = graph.add_node("first");
    let second = graph.add_node("second");
    let third = graph.add_node("third");

    graph.add_dependency(first, root).unwrap();
    graph.add_dependency(second, root).unwrap();
    graph.add_dependency(third, other).unwrap();
    graph.add_dependency(third, root).unwrap();

    assert_eq!(graph.dependents(root), vec![first, second, third]);
    assert_eq!(graph.dependencies(third), &[other, root]);
    assert!(graph.contains_edge(third, root));
    assert!(!graph.contains_edge(root, third));
}

#[test]
fn test_grouping_can_be_repeated() {
    let graph = random_dag(7, 30);

    let first = graph.grouped_topological_sort().unwrap();
    let second = graph.grouped_topological_sort().unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_unknown_node_is_rejected() {
    let mut big = WorkGraph::new();
    big.add_node("a");
    let foreign = big.add_node("b");

    let mut small = WorkGraph::new();
    let a = small.add_node("a");

    assert_eq!(
        small.add_dependency(a, foreign),
        Err(GraphError::NodeNotFound("#1".to_string()))
    );
    assert!(small.add_node_with_dependencies("c", &[foreign]).is_err());
    assert_eq!(small.len(), 1, "a failed insert must not leave a node behind");
}

#[test]
fn test_random_dags_group_correctly() {
    for seed in 0..50 {
        let graph = random_dag(seed, 40);
        assert!(!is_cyclic_directed(graph.as_petgraph()));

        let grouping = graph
            .grouped_topological_sort()
            .unwrap_or_else(|e| panic!("seed {} should be acyclic: {}", seed, e));

        assert_valid_grouping(&graph, &grouping);

        // Round 0 is exactly the set of nodes without dependencies
        let roots: Vec<NodeId> = graph
            .node_ids()
            .filter(|id| graph.dependencies(*id).is_empty())
            .collect();
        assert_eq!(grouping.groups()[0], roots);
    }
}

#[test]
fn test_nodes_are_placed_at_earliest_round() {
    for seed in 100..120 {
        let graph = random_dag(seed, 25);
        let grouping = graph.grouped_topological_sort().unwrap();

        for id in graph.node_ids() {
            let index = grouping.group_index_of(id).unwrap();
            let expected = graph
                .dependencies(id)
                .iter()
                .map(|dep| grouping.group_index_of(*dep).unwrap() + 1)
                .max()
                .unwrap_or(0);
            assert_eq!(index, expected, "node {} is not in its earliest round", id);
        }
    }
}
