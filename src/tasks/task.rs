//! # Task handle with observable state.
//!
//! A [`Task`] is a cloneable handle to asynchronous work. Every clone observes
//! the same state transitions:
//!
//! ```text
//! Pending ──► Running ──► Succeeded(value)
//!    │           └──────► Failed(TaskError)
//!    └──────────────────► Failed(TaskError)   (never ran: closed or dropped completer)
//! ```
//!
//! ## Rules
//! - Terminal states are final: the first completion wins, later ones are ignored.
//! - `state()`, `is_done()`, `peek()` never block.
//! - `get()` suspends until the task is terminal and yields a clone of the outcome.
//! - `get_or_cancel()` abandons the wait when the token fires; the token stays cancelled
//!   and the task itself keeps running.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Global id counter for tasks.
static TASK_IDS: AtomicU64 = AtomicU64::new(1);

/// Observable state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Created, not yet executing (e.g. waiting for a concurrency permit).
    Pending,
    /// Executing.
    Running,
    /// Done with a value.
    Succeeded,
    /// Done with a [`TaskError`].
    Failed,
}

impl TaskState {
    /// True for `Succeeded` and `Failed`.
    #[inline]
    pub fn is_done(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

enum Slot<T> {
    Pending,
    Running,
    Done(Result<T, TaskError>),
}

impl<T> Slot<T> {
    fn state(&self) -> TaskState {
        match self {
            Slot::Pending => TaskState::Pending,
            Slot::Running => TaskState::Running,
            Slot::Done(Ok(_)) => TaskState::Succeeded,
            Slot::Done(Err(_)) => TaskState::Failed,
        }
    }

    fn is_done(&self) -> bool {
        matches!(self, Slot::Done(_))
    }
}

impl<T: Clone> Slot<T> {
    fn outcome(&self) -> Option<Result<T, TaskError>> {
        match self {
            Slot::Done(res) => Some(res.clone()),
            _ => None,
        }
    }
}

struct Inner<T> {
    id: u64,
    name: Arc<str>,
    slot: watch::Sender<Slot<T>>,
}

/// Handle to asynchronous work producing a `T`.
///
/// ## Example
/// ```rust
/// use entityvisor::{Task, TaskState};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (task, completer) = Task::<u32>::channel("answer");
/// assert_eq!(task.state(), TaskState::Pending);
///
/// completer.complete(Ok(42));
/// assert_eq!(task.get().await, Ok(42));
/// assert_eq!(task.state(), TaskState::Succeeded);
/// # }
/// ```
pub struct Task<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Task<T> {
    fn with_slot(name: impl Into<Arc<str>>, slot: Slot<T>) -> Self {
        let (tx, _rx) = watch::channel(slot);
        Self {
            inner: Arc::new(Inner {
                id: TASK_IDS.fetch_add(1, Ordering::Relaxed),
                name: name.into(),
                slot: tx,
            }),
        }
    }

    /// Creates a pending task and the [`Completer`] that finishes it.
    ///
    /// Dropping the completer without completing fails the task with [`TaskError::Closed`].
    pub fn channel(name: impl Into<Arc<str>>) -> (Task<T>, Completer<T>) {
        let task = Self::with_slot(name, Slot::Pending);
        let completer = Completer { task: task.clone() };
        (task, completer)
    }

    /// Creates a task that is already done with `value`.
    pub fn ready(name: impl Into<Arc<str>>, value: T) -> Self {
        Self::with_slot(name, Slot::Done(Ok(value)))
    }

    /// Creates a task that is already done with `error`.
    pub fn failed(name: impl Into<Arc<str>>, error: TaskError) -> Self {
        Self::with_slot(name, Slot::Done(Err(error)))
    }

    /// Process-unique task id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Human-readable task name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current state (non-blocking).
    pub fn state(&self) -> TaskState {
        self.inner.slot.borrow().state()
    }

    /// True once the task reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.state().is_done()
    }

    /// True if the task finished with an error.
    pub fn is_error(&self) -> bool {
        self.state() == TaskState::Failed
    }
}

impl<T: Clone> Task<T> {
    /// Returns the outcome if the task is done, `None` otherwise (non-blocking).
    pub fn peek(&self) -> Option<Result<T, TaskError>> {
        self.inner.slot.borrow().outcome()
    }

    /// Waits until the task is terminal and returns its value or re-raises its failure.
    pub async fn get(&self) -> Result<T, TaskError> {
        let mut rx = self.inner.slot.subscribe();
        let outcome = rx.wait_for(Slot::is_done).await.ok().and_then(|s| s.outcome());
        outcome.unwrap_or(Err(TaskError::Closed))
    }

    /// Like [`get`](Self::get), but gives up with [`TaskError::Canceled`] when `token` fires.
    pub async fn get_or_cancel(&self, token: &CancellationToken) -> Result<T, TaskError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(TaskError::Canceled),
            res = self.get() => res,
        }
    }
}

impl<T> fmt::Display for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task[{}#{}]", self.inner.name, self.inner.id)
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Producer side of a [`Task`].
///
/// Used by [`ExecutionContext`](crate::ExecutionContext) and available to external
/// execution engines that want to hand out [`Task`] handles.
pub struct Completer<T> {
    task: Task<T>,
}

impl<T> Completer<T> {
    /// The task this completer finishes.
    pub fn task(&self) -> &Task<T> {
        &self.task
    }

    /// Moves the task from `Pending` to `Running` (no-op in any other state).
    pub fn running(&self) {
        self.task.inner.slot.send_if_modified(|slot| {
            if matches!(slot, Slot::Pending) {
                *slot = Slot::Running;
                true
            } else {
                false
            }
        });
    }

    /// Finishes the task with `result`.
    pub fn complete(self, result: Result<T, TaskError>) {
        self.finish(result);
    }

    fn finish(&self, result: Result<T, TaskError>) {
        self.task.inner.slot.send_if_modified(|slot| {
            if slot.is_done() {
                false
            } else {
                *slot = Slot::Done(result);
                true
            }
        });
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        self.finish(Err(TaskError::Closed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_waits_for_completion() {
        let (task, completer) = Task::<&'static str>::channel("slow");
        completer.running();
        assert_eq!(task.state(), TaskState::Running);

        let waiter = {
            let task = task.clone();
            tokio::spawn(async move { task.get().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        completer.complete(Ok("done"));
        assert_eq!(waiter.await.unwrap(), Ok("done"));
        assert!(task.is_done());
        assert!(!task.is_error());
    }

    #[tokio::test]
    async fn test_first_completion_wins() {
        let (task, completer) = Task::<u8>::channel("once");
        completer.finish(Ok(1));
        completer.complete(Err(TaskError::fail("late")));
        assert_eq!(task.peek(), Some(Ok(1)));
    }

    #[tokio::test]
    async fn test_dropped_completer_fails_task() {
        let (task, completer) = Task::<u8>::channel("orphan");
        drop(completer);
        assert_eq!(task.get().await, Err(TaskError::Closed));
        assert!(task.is_error());
    }

    #[tokio::test]
    async fn test_get_or_cancel_abandons_wait() {
        let (task, _completer) = Task::<u8>::channel("never");
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(task.get_or_cancel(&token).await, Err(TaskError::Canceled));
        assert!(token.is_cancelled());
        assert_eq!(task.state(), TaskState::Pending);
    }

    #[test]
    fn test_ready_and_failed_are_terminal() {
        let ok = Task::ready("ok", 7u8);
        let err = Task::<u8>::failed("err", TaskError::fail("x"));
        assert_eq!(ok.state(), TaskState::Succeeded);
        assert_eq!(err.state(), TaskState::Failed);
        assert!(ok.to_string().starts_with("Task[ok#"));
        assert_ne!(ok.id(), err.id());
    }
}
