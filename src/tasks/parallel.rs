//! # ParallelTask: composite over independent units of work.
//!
//! Units are polled concurrently; the composite resolves to
//! - the ordered sequence of unit values (submission order, not completion order), or
//! - the **first observed** failure, wrapped as [`TaskError::Child`] with the unit's
//!   index and label so callers can map the failure back to its origin.
//!
//! ```text
//! units: [u0, u1, u2]          completion: u2 ─► u0 ─► u1
//!          │   │   │
//!          ▼   ▼   ▼           slots:      [_, _, v2] → [v0, _, v2] → [v0, v1, v2]
//!     FuturesUnordered ──────► Ok(vec![v0, v1, v2])
//!
//! any unit Err(e) observed first ──► Err(Child { index, entity: label, source: e })
//! ```
//!
//! Remaining units are dropped once a failure is observed; work they were waiting on
//! elsewhere is not cancelled.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;

use crate::error::TaskError;
use crate::tasks::{ExecutionContext, Task};

struct Unit<T> {
    label: Arc<str>,
    fut: BoxFuture<'static, Result<T, TaskError>>,
}

/// Builder and driver of a composite task.
pub struct ParallelTask<T> {
    name: Arc<str>,
    units: Vec<Unit<T>>,
}

impl<T> ParallelTask<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an empty composite.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            units: Vec::new(),
        }
    }

    /// Appends a unit; `label` names it in a composite failure.
    pub fn push<F>(&mut self, label: impl Into<Arc<str>>, fut: F)
    where
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.units.push(Unit {
            label: label.into(),
            fut: fut.boxed(),
        });
    }

    /// Builder-style [`push`](Self::push).
    pub fn with_unit<F>(mut self, label: impl Into<Arc<str>>, fut: F) -> Self
    where
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.push(label, fut);
        self
    }

    /// Composite name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True if there are no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Drives every unit to completion (or until the first failure).
    pub async fn run(self) -> Result<Vec<T>, TaskError> {
        let total = self.units.len();
        let mut labels = Vec::with_capacity(total);
        let mut pending = FuturesUnordered::new();
        for (index, unit) in self.units.into_iter().enumerate() {
            labels.push(unit.label);
            pending.push(unit.fut.map(move |res| (index, res)));
        }

        let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
        while let Some((index, res)) = pending.next().await {
            match res {
                Ok(value) => slots[index] = Some(value),
                Err(e) => {
                    return Err(TaskError::Child {
                        index,
                        entity: labels[index].to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }

    /// Submits the composite into `ctx` and returns its handle immediately.
    pub fn submit(self, ctx: &ExecutionContext) -> Task<Vec<T>> {
        let name = Arc::clone(&self.name);
        ctx.submit_composite(name, self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn delayed(ms: u64, value: u32) -> impl Future<Output = Result<u32, TaskError>> {
        async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_results_follow_submission_order() {
        let composite = ParallelTask::new("ordered")
            .with_unit("slow", delayed(30, 1))
            .with_unit("fast", delayed(1, 2))
            .with_unit("medium", delayed(10, 3));
        assert_eq!(composite.len(), 3);

        assert_eq!(composite.run().await, Ok(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_failure_names_the_child() {
        let composite = ParallelTask::new("mixed")
            .with_unit("ok", delayed(5, 1))
            .with_unit("bad", async { Err(TaskError::fail("nope")) });

        let err = composite.run().await.unwrap_err();
        assert_eq!(err.failed_child(), Some((1, "bad")));
        assert_eq!(err.root_cause(), &TaskError::fail("nope"));
    }

    #[tokio::test]
    async fn test_empty_composite_yields_empty_sequence() {
        let composite = ParallelTask::<u32>::new("empty");
        assert!(composite.is_empty());
        assert_eq!(composite.run().await, Ok(vec![]));
    }

    #[tokio::test]
    async fn test_submit_runs_in_context() {
        let ctx = ExecutionContext::current();
        let task = ParallelTask::new("submitted")
            .with_unit("a", delayed(2, 10))
            .with_unit("b", delayed(1, 20))
            .submit(&ctx);

        assert_eq!(task.name(), "submitted");
        assert_eq!(task.get().await, Ok(vec![10, 20]));
    }
}
