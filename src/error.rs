//! Error types used by the entityvisor runtime.
//!
//! This module defines the error enums surfaced by the crate:
//!
//! - [`TaskError`]: failures carried by a [`Task`](crate::Task) (effector invocations,
//!   composite fan-outs, interrupted waits).
//! - [`LifecycleError`]: failures of start/stop/teardown and management registration.
//! - [`GraphError`]: rejected mutations of the ownership tree.
//! - [`DumpError`]: failures while rendering an entity subtree.
//!
//! All of them provide `as_label` for logging/metrics.

use thiserror::Error;

/// # Errors carried by a task in its failed terminal state.
///
/// `TaskError` is `Clone` because every handle of a task observes the same outcome.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The unit of work ran and reported a failure.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The unit of work panicked; the panic was caught by the execution context.
    #[error("task panicked: {error}")]
    Panicked {
        /// Panic payload rendered as text.
        error: String,
    },

    /// The wait on a task was interrupted through its cancellation token.
    #[error("wait interrupted")]
    Canceled,

    /// The target entity does not expose the requested effector.
    #[error("effector '{effector}' not found on {entity}")]
    EffectorNotFound {
        /// Display form of the target entity.
        entity: String,
        /// Name of the missing effector.
        effector: String,
    },

    /// The effector returned a value that does not match its declared type.
    #[error("effector '{effector}' returned an unexpected value: {error}")]
    Decode {
        /// Name of the effector.
        effector: String,
        /// Deserialization error message.
        error: String,
    },

    /// One child of a composite task failed; `index` is its position in submission order.
    #[error("invocation #{index} on {entity} failed: {source}")]
    Child {
        /// Position of the failing child in the input sequence.
        index: usize,
        /// Display form of the entity the child targeted.
        entity: String,
        /// The child's own failure.
        source: Box<TaskError>,
    },

    /// The execution context can no longer accept work (its semaphore was closed).
    #[error("execution context closed")]
    Closed,
}

impl TaskError {
    /// Builds a [`TaskError::Fail`] from any displayable message.
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use entityvisor::TaskError;
    ///
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Canceled => "task_canceled",
            TaskError::EffectorNotFound { .. } => "effector_not_found",
            TaskError::Decode { .. } => "effector_decode",
            TaskError::Child { .. } => "child_failed",
            TaskError::Closed => "context_closed",
        }
    }

    /// Returns `(index, entity)` of the failing child if this is a composite failure.
    pub fn failed_child(&self) -> Option<(usize, &str)> {
        match self {
            TaskError::Child { index, entity, .. } => Some((*index, entity.as_str())),
            _ => None,
        }
    }

    /// Unwraps nested [`TaskError::Child`] layers down to the originating failure.
    pub fn root_cause(&self) -> &TaskError {
        let mut err = self;
        while let TaskError::Child { source, .. } = err {
            err = source;
        }
        err
    }

    /// True when the error only reports an interrupted wait.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

/// # Errors produced by lifecycle transitions.
///
/// The lifecycle controller never swallows failures: the underlying
/// [`TaskError`] is kept as the source.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The entity's start operation failed.
    #[error("failed to start {entity}: {source}")]
    Start {
        /// Display form of the entity.
        entity: String,
        /// Underlying failure.
        source: TaskError,
    },

    /// The entity's stop operation failed.
    #[error("failed to stop {entity}: {source}")]
    Stop {
        /// Display form of the entity.
        entity: String,
        /// Underlying failure.
        source: TaskError,
    },

    /// The entity's internal teardown failed.
    #[error("failed to tear down {entity}: {source}")]
    Teardown {
        /// Display form of the entity.
        entity: String,
        /// Underlying failure.
        source: TaskError,
    },

    /// The entity is already managed by a different management context.
    #[error("{entity} is already managed by context #{context}")]
    ManagedElsewhere {
        /// Display form of the entity.
        entity: String,
        /// Id of the context currently managing it.
        context: u64,
    },
}

impl LifecycleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleError::Start { .. } => "lifecycle_start",
            LifecycleError::Stop { .. } => "lifecycle_stop",
            LifecycleError::Teardown { .. } => "lifecycle_teardown",
            LifecycleError::ManagedElsewhere { .. } => "lifecycle_managed_elsewhere",
        }
    }
}

/// # Rejected ownership-tree mutations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The child already has an owner; entities are never moved between owners.
    #[error("{child} is already owned by {owner}")]
    AlreadyOwned {
        /// Display form of the child.
        child: String,
        /// Display form of its current owner.
        owner: String,
    },

    /// Attaching would make an entity its own ancestor.
    #[error("attaching {child} under {parent} would create a cycle")]
    Cycle {
        /// Display form of the would-be parent.
        parent: String,
        /// Display form of the would-be child.
        child: String,
    },
}

impl GraphError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            GraphError::AlreadyOwned { .. } => "graph_already_owned",
            GraphError::Cycle { .. } => "graph_cycle",
        }
    }
}

/// # Errors produced while dumping an entity subtree.
///
/// Sink failures are wrapped uniformly as [`DumpError::Io`]; the only other case
/// is a task that broke its own contract.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DumpError {
    /// Writing to the sink failed.
    #[error("failed to write dump: {0}")]
    Io(#[from] std::io::Error),

    /// A task reported success but its value could not be retrieved.
    #[error("task {task} done without error, but value retrieval failed: {source}")]
    InconsistentTask {
        /// Display form of the offending task.
        task: String,
        /// Failure raised by the retrieval.
        source: TaskError,
    },
}

impl DumpError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DumpError::Io(_) => "dump_io",
            DumpError::InconsistentTask { .. } => "dump_inconsistent_task",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_children() {
        let err = TaskError::Child {
            index: 2,
            entity: "Web[id=3]".into(),
            source: Box::new(TaskError::fail("port in use")),
        };
        assert_eq!(err.failed_child(), Some((2, "Web[id=3]")));
        assert_eq!(err.root_cause(), &TaskError::fail("port in use"));
        assert_eq!(err.as_label(), "child_failed");
    }

    #[test]
    fn test_non_composite_has_no_failed_child() {
        assert!(TaskError::Canceled.failed_child().is_none());
        assert!(TaskError::Canceled.is_canceled());
    }
}
