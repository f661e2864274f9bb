//! # Task handles and the execution context.
//!
//! This module provides the asynchronous-work abstractions the rest of the crate builds on:
//! - [`Task`] - cloneable handle to work with pending/running/done states
//! - [`TaskState`] - observable state of a task
//! - [`Completer`] - producer side of a task created with [`Task::channel`]
//! - [`ExecutionContext`] - submits futures onto a tokio runtime and returns tasks
//! - [`ParallelTask`] - composite over independent units: ordered results or first failure

mod context;
mod parallel;
mod task;

pub use context::ExecutionContext;
pub use parallel::ParallelTask;
pub use task::{Completer, Task, TaskState};

use std::any::Any;

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
