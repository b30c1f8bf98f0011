use crate::TaskId;
use async_trait::async_trait;
use std::sync::Arc;

/// Task outputs of one run, indexed by task identity.
///
/// Each slot is written once, when its task completes. Iteration follows task
/// declaration order, not completion order.
#[derive(Debug)]
pub struct ResultTable<R> {
    slots: Vec<Option<Arc<R>>>,
}

impl<R> ResultTable<R> {
    pub(crate) fn with_len(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| None).collect(),
        }
    }

    pub(crate) fn insert(&mut self, id: TaskId, result: R) {
        let slot = &mut self.slots[id.index()];
        debug_assert!(slot.is_none(), "task {} recorded twice", id);
        *slot = Some(Arc::new(result));
    }

    pub fn get(&self, id: TaskId) -> Option<&Arc<R>> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Result of a task that must already have completed.
    ///
    /// # Panics
    ///
    /// Panics when the task has no recorded result. The grouping guarantees a
    /// dependency finishes before any dependent starts, so this only fires on
    /// a broken schedule.
    pub fn require(&self, id: TaskId) -> Arc<R> {
        match self.get(id) {
            Some(result) => Arc::clone(result),
            None => panic!("no result recorded for task {}", id),
        }
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.get(id).is_some()
    }

    /// Number of recorded results
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recorded results in task declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<R>> + '_ {
        self.slots.iter().flatten()
    }

    pub fn into_ordered(self) -> Vec<Arc<R>> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Turns the results of a complete run into the caller-visible output
#[async_trait]
pub trait ResultConsumer<R>: Send + Sync {
    type Output: Send;

    async fn consume(&self, results: ResultTable<R>) -> Self::Output;
}

/// Consumer returning every result in task declaration order
pub struct CollectResults;

#[async_trait]
impl<R> ResultConsumer<R> for CollectResults
where
    R: Send + Sync + 'static,
{
    type Output = Vec<Arc<R>>;

    async fn consume(&self, results: ResultTable<R>) -> Self::Output {
        results.into_ordered()
    }
}
