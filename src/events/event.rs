//! # Runtime events emitted by the management runtime.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Management events**: an entity joined or left a management context
//! - **Lifecycle events**: start/stop/destroy transitions
//! - **Invocation events**: fan-out submission and failure
//! - **Shutdown events**: exit hook installation and stop-on-shutdown progress
//!
//! The [`Event`] struct carries additional metadata such as timestamps, entity,
//! effector and task names, and failure reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use entityvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::InvocationFailed)
//!     .with_entity("WebServer[id=4]")
//!     .with_effector("restart")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::InvocationFailed);
//! assert_eq!(ev.entity.as_deref(), Some("WebServer[id=4]"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `entity` (subscriber name), `reason` (panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `entity` (subscriber name), `reason` ("full" / "closed").
    SubscriberOverflow,

    // === Management events ===
    /// Entity became managed by a context.
    ///
    /// Sets: `entity`.
    EntityManaged,

    /// Entity is no longer managed.
    ///
    /// Sets: `entity`.
    EntityUnmanaged,

    // === Lifecycle events ===
    /// Start operation issued.
    ///
    /// Sets: `entity`, `count` (number of locations).
    EntityStarting,

    /// Start operation completed.
    ///
    /// Sets: `entity`.
    EntityStarted,

    /// Stop operation issued as part of destroy.
    ///
    /// Sets: `entity`.
    EntityStopping,

    /// Stop operation completed.
    ///
    /// Sets: `entity`.
    EntityStopped,

    /// Internal teardown completed and the entity was detached from its owner.
    ///
    /// Sets: `entity`.
    EntityDestroyed,

    // === Invocation events ===
    /// A composite fan-out was submitted into the caller's execution context.
    ///
    /// Sets: `entity` (caller), `effector`, `task`, `count` (number of targets).
    InvocationSubmitted,

    /// A composite fan-out failed.
    ///
    /// Sets: `entity` (first failing target), `effector`, `task`, `reason`.
    InvocationFailed,

    // === Shutdown events ===
    /// The exit hook was installed (exactly once per coordinator).
    ShutdownHookInstalled,

    /// The exit hook started running.
    ///
    /// Sets: `count` (registered entities).
    ShutdownRequested,

    /// Stop on shutdown failed for one entity (submission, failure or timeout).
    ///
    /// Sets: `entity`, `reason`.
    StopOnShutdownFailed,

    /// Stop on shutdown completed for one entity.
    ///
    /// Sets: `entity`.
    StopOnShutdownCompleted,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Display form of the entity concerned, if applicable.
    pub entity: Option<Arc<str>>,
    /// Effector name, if applicable.
    pub effector: Option<Arc<str>>,
    /// Display form of the task concerned, if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Kind-specific count (targets, locations, registered entities).
    pub count: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            entity: None,
            effector: None,
            task: None,
            reason: None,
            count: None,
        }
    }

    /// Attaches the display form of an entity.
    #[inline]
    pub fn with_entity(mut self, entity: impl Into<Arc<str>>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Attaches an effector name.
    #[inline]
    pub fn with_effector(mut self, effector: impl Into<Arc<str>>) -> Self {
        self.effector = Some(effector.into());
        self
    }

    /// Attaches the display form of a task.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a count, saturating at `u32::MAX`.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_entity(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_entity(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::EntityManaged);
        let b = Event::new(EventKind::EntityUnmanaged);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_count_saturates() {
        let ev = Event::new(EventKind::ShutdownRequested).with_count(usize::MAX);
        assert_eq!(ev.count, Some(u32::MAX));
    }
}
