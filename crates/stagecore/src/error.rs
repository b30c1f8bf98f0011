use crate::{cycle, NodeId, WorkGraph};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("Task '{task}' failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: TaskError,
    },

    #[error("Task panicked or was aborted: {0}")]
    TaskPanicked(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),
}

/// Errors raised by task bodies
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timeout after {millis}ms")]
    Timeout { millis: u64 },

    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    pub fn custom<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        TaskError::Custom(Box::new(error))
    }
}

/// A concrete cycle found in the graph, as node ids and their labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath {
    pub nodes: Vec<NodeId>,
    pub labels: Vec<String>,
}

impl fmt::Display for CyclePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.labels.join(" -> "))
    }
}

/// Raised when grouping cannot place the remaining nodes
#[derive(Error, Debug, Clone)]
#[error("Cyclic dependency detected:\n{}", render_paths(.paths))]
pub struct CycleError {
    paths: Vec<CyclePath>,
    stuck: Vec<NodeId>,
}

impl CycleError {
    pub(crate) fn from_stuck<T: fmt::Display>(graph: &WorkGraph<T>, stuck: Vec<NodeId>) -> Self {
        let paths = cycle::witness_paths(graph, &stuck)
            .into_iter()
            .map(|nodes| {
                let labels = nodes
                    .iter()
                    .map(|id| match graph.value(*id) {
                        Some(value) => value.to_string(),
                        None => id.to_string(),
                    })
                    .collect();
                CyclePath { nodes, labels }
            })
            .collect();

        Self { paths, stuck }
    }

    /// Witnessed cyclic paths, each ending on a node seen earlier in the path
    pub fn paths(&self) -> &[CyclePath] {
        &self.paths
    }

    /// Every node the grouping could not place
    pub fn stuck(&self) -> &[NodeId] {
        &self.stuck
    }
}

fn render_paths(paths: &[CyclePath]) -> String {
    paths
        .iter()
        .map(CyclePath::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
