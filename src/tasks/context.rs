//! # Execution context: where submitted work runs.
//!
//! An [`ExecutionContext`] turns a future into a [`Task`] by spawning it onto a
//! tokio runtime. Each entity carries one; the management context hands out
//! clones that share its event bus and global concurrency limit.
//!
//! ## Flow
//! ```text
//! submit(name, fut)
//!   ├─► Task::channel(name)            → handle returned immediately
//!   └─► runtime.spawn:
//!         ├─► acquire semaphore permit  (bounded submissions only)
//!         ├─► completer.running()
//!         ├─► fut.catch_unwind().await  (panic → TaskError::Panicked)
//!         └─► completer.complete(result)
//! ```
//!
//! ## Rules
//! - `submit` never blocks.
//! - Composite tasks ([`submit_composite`](ExecutionContext::submit_composite)) do not take
//!   a permit: they only wait on children that need permits of their own.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::error::TaskError;
use crate::events::Bus;
use crate::tasks::{Task, panic_message};

/// Submission facility backed by a tokio runtime handle.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    handle: Handle,
    bus: Bus,
    semaphore: Option<Arc<Semaphore>>,
}

impl ExecutionContext {
    /// Creates a context spawning onto `handle`, publishing on `bus`, optionally
    /// bounded by a shared `semaphore`.
    pub fn new(handle: Handle, bus: Bus, semaphore: Option<Arc<Semaphore>>) -> Self {
        Self {
            handle,
            bus,
            semaphore,
        }
    }

    /// Creates an unbounded context on the current tokio runtime with a private bus.
    ///
    /// # Panics
    /// Panics if called outside of a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current(), Bus::default(), None)
    }

    /// Event bus shared by everything submitted through this context.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Submits `fut` and returns its task handle without waiting.
    pub fn submit<T, F>(&self, name: impl Into<Arc<str>>, fut: F) -> Task<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.spawn(name, fut, self.semaphore.clone())
    }

    /// Submits a composite task that only awaits other tasks; never takes a permit.
    pub fn submit_composite<T, F>(&self, name: impl Into<Arc<str>>, fut: F) -> Task<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.spawn(name, fut, None)
    }

    fn spawn<T, F>(&self, name: impl Into<Arc<str>>, fut: F, sem: Option<Arc<Semaphore>>) -> Task<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let (task, completer) = Task::channel(name);

        self.handle.spawn(async move {
            let _permit = match sem {
                Some(sem) => match sem.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_closed) => {
                        completer.complete(Err(TaskError::Closed));
                        return;
                    }
                },
                None => None,
            };

            completer.running();
            let res = AssertUnwindSafe(fut)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(TaskError::Panicked {
                        error: panic_message(&*panic),
                    })
                });
            completer.complete(res);
        });

        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_submit_returns_before_completion() {
        let ctx = ExecutionContext::current();
        let (gate_tx, gate_rx) = tokio::sync::oneshot::channel::<()>();

        let task = ctx.submit("gated", async move {
            let _ = gate_rx.await;
            Ok(5u32)
        });
        assert!(!task.is_done());

        gate_tx.send(()).unwrap();
        assert_eq!(task.get().await, Ok(5));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let ctx = ExecutionContext::current();
        let task: Task<()> = ctx.submit("explodes", async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        });

        assert_eq!(
            task.get().await,
            Err(TaskError::Panicked {
                error: "kaboom".into()
            })
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_semaphore_bounds_concurrency() {
        let sem = Arc::new(Semaphore::new(2));
        let ctx = ExecutionContext::new(Handle::current(), Bus::default(), Some(sem));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<Task<()>> = (0..6)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                ctx.submit(format!("bounded-{i}"), async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();

        for t in &tasks {
            t.get().await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_closed_semaphore_fails_pending_task() {
        let sem = Arc::new(Semaphore::new(1));
        sem.close();
        let ctx = ExecutionContext::new(Handle::current(), Bus::default(), Some(sem));

        let task = ctx.submit("never-runs", async { Ok(1u8) });
        assert_eq!(task.get().await, Err(TaskError::Closed));
        assert_eq!(task.state(), TaskState::Failed);
    }
}
