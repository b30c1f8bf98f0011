use crate::{ResultConsumer, ResultTable, TaskGraph, TaskId};
use chrono::Utc;
use stagecore::{EventBus, ExecutionEvent, ExecutionId, GraphError, Grouping, StageError};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Runs task graphs group by group, with the tasks of a group in parallel
pub struct TaskExecutor {
    max_parallel: Option<usize>,
}

impl TaskExecutor {
    /// `max_parallel` bounds how many tasks of one group run at once; `None`
    /// starts the whole group together
    pub fn new(max_parallel: Option<usize>) -> Self {
        Self { max_parallel }
    }

    /// Execute every task and return the recorded results
    pub async fn execute<C, R>(
        &self,
        tasks: &TaskGraph<C, R>,
        ctx: Arc<C>,
        event_bus: &EventBus,
    ) -> Result<ExecutionResult<R>, StageError>
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let grouping = tasks.build_schedule()?;
        self.execute_scheduled(tasks, &grouping, ctx, event_bus).await
    }

    /// Execute every task along a grouping computed earlier by
    /// [`TaskGraph::build_schedule`] on the same, unchanged graph
    pub async fn execute_scheduled<C, R>(
        &self,
        tasks: &TaskGraph<C, R>,
        grouping: &Grouping,
        ctx: Arc<C>,
        event_bus: &EventBus,
    ) -> Result<ExecutionResult<R>, StageError>
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let execution_id = ExecutionId::new_v4();
        let start_time = Instant::now();

        tracing::info!(
            "Starting execution {}: {} tasks in {} groups",
            execution_id,
            tasks.len(),
            grouping.len()
        );

        event_bus.emit(ExecutionEvent::RunStarted {
            execution_id,
            tasks: tasks.len(),
            groups: grouping.len(),
            timestamp: Utc::now(),
        });

        let mut results = ResultTable::with_len(tasks.len());
        let outcome = self
            .execute_groups(tasks, grouping, &ctx, event_bus, execution_id, &mut results)
            .await;

        let duration_ms = start_time.elapsed().as_millis() as u64;

        event_bus.emit(ExecutionEvent::RunCompleted {
            execution_id,
            success: outcome.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        outcome?;
        tracing::info!("Execution {} completed in {}ms", execution_id, duration_ms);

        Ok(ExecutionResult {
            execution_id,
            results,
            groups: grouping.len(),
            duration_ms,
        })
    }

    /// Execute every task and hand the results to `consumer`
    pub async fn run<C, R, O>(
        &self,
        tasks: &TaskGraph<C, R>,
        ctx: Arc<C>,
        event_bus: &EventBus,
        consumer: &O,
    ) -> Result<O::Output, StageError>
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
        O: ResultConsumer<R>,
    {
        let execution = self.execute(tasks, ctx, event_bus).await?;
        Ok(consumer.consume(execution.results).await)
    }

    /// [`TaskExecutor::run`] along a grouping computed earlier
    pub async fn run_scheduled<C, R, O>(
        &self,
        tasks: &TaskGraph<C, R>,
        grouping: &Grouping,
        ctx: Arc<C>,
        event_bus: &EventBus,
        consumer: &O,
    ) -> Result<O::Output, StageError>
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
        O: ResultConsumer<R>,
    {
        let execution = self.execute_scheduled(tasks, grouping, ctx, event_bus).await?;
        Ok(consumer.consume(execution.results).await)
    }

    async fn execute_groups<C, R>(
        &self,
        tasks: &TaskGraph<C, R>,
        grouping: &Grouping,
        ctx: &Arc<C>,
        event_bus: &EventBus,
        execution_id: ExecutionId,
        results: &mut ResultTable<R>,
    ) -> Result<(), StageError>
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        for (index, group) in grouping.iter().enumerate() {
            self.execute_group(index, group, tasks, ctx, event_bus, execution_id, results)
                .await?;
        }
        Ok(())
    }

    /// Run one group to completion. Returning early drops the join set, which
    /// aborts any sibling still running.
    #[allow(clippy::too_many_arguments)]
    async fn execute_group<C, R>(
        &self,
        index: usize,
        group: &[TaskId],
        tasks: &TaskGraph<C, R>,
        ctx: &Arc<C>,
        event_bus: &EventBus,
        execution_id: ExecutionId,
        results: &mut ResultTable<R>,
    ) -> Result<(), StageError>
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        tracing::debug!("Group {}: starting {} tasks", index, group.len());

        event_bus.emit(ExecutionEvent::GroupStarted {
            execution_id,
            group: index,
            tasks: group.iter().map(|id| tasks.name(*id).to_string()).collect(),
            timestamp: Utc::now(),
        });

        let limit = self.max_parallel.unwrap_or(group.len()).max(1);
        let mut pending = group.iter().copied();
        let mut running = JoinSet::new();

        loop {
            while running.len() < limit {
                let Some(id) = pending.next() else {
                    break;
                };
                let task = tasks
                    .task(id)
                    .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;

                // Dependencies live in earlier groups, so their results are recorded
                let dependencies: Vec<Arc<R>> = tasks
                    .dependencies(id)
                    .iter()
                    .map(|dependency| results.require(*dependency))
                    .collect();

                event_bus.emit(ExecutionEvent::TaskStarted {
                    execution_id,
                    group: index,
                    task: task.name().to_string(),
                    timestamp: Utc::now(),
                });

                let body = task.body();
                let ctx = Arc::clone(ctx);
                running.spawn(async move {
                    let start = Instant::now();
                    let result = body.run(ctx, dependencies).await;
                    let duration_ms = start.elapsed().as_millis() as u64;
                    (id, result, duration_ms)
                });
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            let (id, result, duration_ms) =
                joined.map_err(|e| StageError::TaskPanicked(e.to_string()))?;
            let name = tasks.name(id).to_string();

            match result {
                Ok(output) => {
                    tracing::info!("Task {} completed in {}ms", name, duration_ms);

                    event_bus.emit(ExecutionEvent::TaskCompleted {
                        execution_id,
                        group: index,
                        task: name,
                        duration_ms,
                        timestamp: Utc::now(),
                    });

                    results.insert(id, output);
                }
                Err(e) => {
                    tracing::error!("Task {} failed: {}", name, e);

                    event_bus.emit(ExecutionEvent::TaskFailed {
                        execution_id,
                        group: index,
                        task: name.clone(),
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });

                    return Err(StageError::TaskFailed {
                        task: name,
                        source: e,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Result of executing a task graph
#[derive(Debug)]
pub struct ExecutionResult<R> {
    pub execution_id: ExecutionId,
    pub results: ResultTable<R>,
    pub groups: usize,
    pub duration_ms: u64,
}
