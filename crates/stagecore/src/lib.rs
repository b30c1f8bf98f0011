//! Core abstractions for stage
//!
//! Work graphs with explicit dependency edges, the grouped topological sort
//! that batches them into rounds, cycle diagnostics, and the error and event
//! types shared by the runtime.

mod cycle;
mod error;
mod events;
mod graph;
mod sort;

pub use cycle::MAX_WITNESS_PATHS;
pub use error::{CycleError, CyclePath, GraphError, StageError, TaskError};
pub use events::{EventBus, ExecutionEvent, ExecutionId};
pub use graph::{NodeId, WorkGraph, WorkNode};
pub use sort::{grouped_topological_sort, Group, Grouping};

/// Result type for stage operations
pub type Result<T> = std::result::Result<T, StageError>;
