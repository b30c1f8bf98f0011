use crate::{PagePropsMerger, PageResult, UnitResult};
use stagecore::{CycleError, GraphError, Grouping, StageError, TaskError};
use stageruntime::{StageRuntime, TaskGraph, TaskId};
use std::future::Future;
use std::sync::Arc;

/// Builder for a [`UnitTree`]
pub struct UnitTreeBuilder<C> {
    units: TaskGraph<C, UnitResult>,
}

impl<C> UnitTreeBuilder<C>
where
    C: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            units: TaskGraph::new(),
        }
    }

    /// Add a unit; `dependencies` results are passed to `f` in this order
    pub fn add_unit<F, Fut>(
        &mut self,
        name: impl Into<String>,
        dependencies: &[TaskId],
        f: F,
    ) -> Result<TaskId, GraphError>
    where
        F: Fn(Arc<C>, Vec<Arc<UnitResult>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<UnitResult, TaskError>> + Send + 'static,
    {
        self.units.add_fn(name, dependencies, f)
    }

    pub fn add_dependency(&mut self, unit: TaskId, dependency: TaskId) -> Result<bool, GraphError> {
        self.units.add_dependency(unit, dependency)
    }

    /// Compute the grouping once; a cyclic declaration fails here
    pub fn build(self) -> Result<UnitTree<C>, CycleError> {
        UnitTree::new(self.units)
    }

    pub fn build_with_runtime(self, runtime: StageRuntime) -> Result<UnitTree<C>, CycleError> {
        UnitTree::with_runtime(self.units, runtime)
    }
}

impl<C> Default for UnitTreeBuilder<C>
where
    C: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Units grouped up front and run into a single page result
pub struct UnitTree<C> {
    units: TaskGraph<C, UnitResult>,
    groups: Grouping,
    runtime: StageRuntime,
}

impl<C> UnitTree<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(units: TaskGraph<C, UnitResult>) -> Result<Self, CycleError> {
        Self::with_runtime(units, StageRuntime::new())
    }

    pub fn with_runtime(units: TaskGraph<C, UnitResult>, runtime: StageRuntime) -> Result<Self, CycleError> {
        let groups = units.build_schedule()?;
        tracing::debug!("Unit tree: {} units in {} groups", units.len(), groups.len());

        Ok(Self {
            units,
            groups,
            runtime,
        })
    }

    /// Grouping computed at construction and used by every run
    pub fn groups(&self) -> &Grouping {
        &self.groups
    }

    pub fn units(&self) -> &TaskGraph<C, UnitResult> {
        &self.units
    }

    /// Run every unit for one request along the stored grouping and merge
    /// their page results
    pub async fn run(&self, ctx: Arc<C>) -> Result<PageResult, StageError> {
        self.runtime
            .run_scheduled(&self.units, &self.groups, ctx, &PagePropsMerger)
            .await
    }
}
