use crate::{ExecutionResult, ResultConsumer, TaskExecutor, TaskGraph};
use serde::{Deserialize, Serialize};
use stagecore::{EventBus, ExecutionEvent, Grouping, StageError};
use std::sync::Arc;

/// Main entry point for running task graphs
pub struct StageRuntime {
    executor: Arc<TaskExecutor>,
    event_bus: Arc<EventBus>,
}

impl StageRuntime {
    /// Create a new runtime with default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        let executor = Arc::new(TaskExecutor::new(config.max_parallel_tasks));
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        Self { executor, event_bus }
    }

    /// Execute a task graph, returning the raw result table
    pub async fn execute<C, R>(
        &self,
        tasks: &TaskGraph<C, R>,
        ctx: Arc<C>,
    ) -> Result<ExecutionResult<R>, StageError>
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        self.executor.execute(tasks, ctx, &self.event_bus).await
    }

    /// Execute a task graph and let `consumer` build the final output
    pub async fn run<C, R, O>(
        &self,
        tasks: &TaskGraph<C, R>,
        ctx: Arc<C>,
        consumer: &O,
    ) -> Result<O::Output, StageError>
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
        O: ResultConsumer<R>,
    {
        self.executor.run(tasks, ctx, &self.event_bus, consumer).await
    }

    /// Like [`StageRuntime::run`], reusing a grouping from `tasks.build_schedule()`
    pub async fn run_scheduled<C, R, O>(
        &self,
        tasks: &TaskGraph<C, R>,
        grouping: &Grouping,
        ctx: Arc<C>,
        consumer: &O,
    ) -> Result<O::Output, StageError>
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
        O: ResultConsumer<R>,
    {
        self.executor
            .run_scheduled(tasks, grouping, ctx, &self.event_bus, consumer)
            .await
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

impl Default for StageRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on concurrently running tasks within one group
    pub max_parallel_tasks: Option<usize>,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: None,
            event_buffer_size: 1000,
        }
    }
}
