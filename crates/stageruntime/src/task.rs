use async_trait::async_trait;
use stagecore::{CycleError, GraphError, Grouping, NodeId, TaskError, WorkGraph};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub type TaskId = NodeId;

/// Body of a task.
///
/// `dependencies` holds the results of the declared dependencies, in the order
/// they were declared.
#[async_trait]
pub trait TaskBody<C, R>: Send + Sync {
    async fn run(&self, ctx: Arc<C>, dependencies: Vec<Arc<R>>) -> Result<R, TaskError>;
}

/// Adapter turning an async closure into a [`TaskBody`]
pub struct FnTask<F>(F);

impl<F> FnTask<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<C, R, F, Fut> TaskBody<C, R> for FnTask<F>
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
    F: Fn(Arc<C>, Vec<Arc<R>>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, TaskError>> + Send + 'static,
{
    async fn run(&self, ctx: Arc<C>, dependencies: Vec<Arc<R>>) -> Result<R, TaskError> {
        (self.0)(ctx, dependencies).await
    }
}

/// A named task body stored as the payload of a work node
pub struct Task<C, R> {
    name: String,
    body: Arc<dyn TaskBody<C, R>>,
}

impl<C, R> Task<C, R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> Arc<dyn TaskBody<C, R>> {
        Arc::clone(&self.body)
    }
}

impl<C, R> fmt::Display for Task<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl<C, R> fmt::Debug for Task<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish()
    }
}

/// Set of tasks with their dependency edges
pub struct TaskGraph<C, R> {
    graph: WorkGraph<Task<C, R>>,
}

impl<C, R> TaskGraph<C, R>
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            graph: WorkGraph::new(),
        }
    }

    pub fn with_capacity(tasks: usize, dependencies: usize) -> Self {
        Self {
            graph: WorkGraph::with_capacity(tasks, dependencies),
        }
    }

    /// Add a task depending on `dependencies`; their results reach the body in
    /// this order
    pub fn add_task(
        &mut self,
        name: impl Into<String>,
        dependencies: &[TaskId],
        body: impl TaskBody<C, R> + 'static,
    ) -> Result<TaskId, GraphError> {
        let task = Task {
            name: name.into(),
            body: Arc::new(body),
        };
        self.graph.add_node_with_dependencies(task, dependencies)
    }

    /// Add a task whose body is an async closure
    pub fn add_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        dependencies: &[TaskId],
        f: F,
    ) -> Result<TaskId, GraphError>
    where
        F: Fn(Arc<C>, Vec<Arc<R>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, TaskError>> + Send + 'static,
    {
        self.add_task(name, dependencies, FnTask::new(f))
    }

    /// Declare an extra dependency after both tasks exist
    pub fn add_dependency(&mut self, task: TaskId, dependency: TaskId) -> Result<bool, GraphError> {
        self.graph.add_dependency(task, dependency)
    }
}

impl<C, R> TaskGraph<C, R> {
    /// Group the tasks into rounds that may run concurrently
    pub fn build_schedule(&self) -> Result<Grouping, CycleError> {
        self.graph.grouped_topological_sort()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task<C, R>> {
        self.graph.value(id)
    }

    pub fn name(&self, id: TaskId) -> &str {
        self.task(id).map(Task::name).unwrap_or("<unknown>")
    }

    pub fn dependencies(&self, id: TaskId) -> &[TaskId] {
        self.graph.dependencies(id)
    }

    /// Look up a task by name; the first declared task wins on duplicates
    pub fn find(&self, name: &str) -> Option<TaskId> {
        self.graph
            .iter()
            .find(|(_, node)| node.value().name() == name)
            .map(|(id, _)| id)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.graph.node_ids()
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn graph(&self) -> &WorkGraph<Task<C, R>> {
        &self.graph
    }
}

impl<C, R> Default for TaskGraph<C, R>
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
