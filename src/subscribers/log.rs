//! # LogWriter: renders runtime events as `tracing` records
//!
//! Failures are logged at `warn`, lifecycle transitions at `info`, everything
//! else at `debug`. Install any `tracing` subscriber to see the output.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO entityvisor: starting entity="WebServer[id=3]" locations=1
//! WARN entityvisor: invocation failed entity="WebServer[id=3]" effector="stop" err="port in use"
//! INFO entityvisor: shutdown requested registered=3
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let entity = e.entity.as_deref().unwrap_or("-");
        let effector = e.effector.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::EntityManaged => debug!(target: "entityvisor", entity, "managed"),
            EventKind::EntityUnmanaged => debug!(target: "entityvisor", entity, "unmanaged"),
            EventKind::EntityStarting => {
                info!(target: "entityvisor", entity, locations = e.count, "starting")
            }
            EventKind::EntityStarted => info!(target: "entityvisor", entity, "started"),
            EventKind::EntityStopping => info!(target: "entityvisor", entity, "stopping"),
            EventKind::EntityStopped => info!(target: "entityvisor", entity, "stopped"),
            EventKind::EntityDestroyed => info!(target: "entityvisor", entity, "destroyed"),
            EventKind::InvocationSubmitted => debug!(
                target: "entityvisor",
                caller = entity,
                effector,
                task = e.task.as_deref(),
                targets = e.count,
                "invocation submitted"
            ),
            EventKind::InvocationFailed => warn!(
                target: "entityvisor",
                entity,
                effector,
                task = e.task.as_deref(),
                err = reason,
                "invocation failed"
            ),
            EventKind::ShutdownHookInstalled => {
                debug!(target: "entityvisor", "stop-on-shutdown hook installed")
            }
            EventKind::ShutdownRequested => {
                info!(target: "entityvisor", registered = e.count, "shutdown requested")
            }
            EventKind::StopOnShutdownFailed => {
                warn!(target: "entityvisor", entity, err = reason, "stop on shutdown failed")
            }
            EventKind::StopOnShutdownCompleted => {
                debug!(target: "entityvisor", entity, "stop on shutdown completed")
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => warn!(
                target: "entityvisor",
                subscriber = entity,
                info = reason,
                "subscriber problem"
            ),
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
