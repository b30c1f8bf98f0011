//! Task execution runtime
//!
//! Wraps work nodes with async task bodies, runs the grouping once per call,
//! then executes each group concurrently behind a barrier and threads the
//! recorded results to dependents.

mod executor;
mod results;
mod runtime;
mod task;

pub use executor::{ExecutionResult, TaskExecutor};
pub use results::{CollectResults, ResultConsumer, ResultTable};
pub use runtime::{RuntimeConfig, StageRuntime};
pub use task::{FnTask, Task, TaskBody, TaskGraph, TaskId};
