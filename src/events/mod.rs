//! # Runtime events and the broadcast bus.
//!
//! - [`Event`] / [`EventKind`]: what happened (management, lifecycle, invocation, shutdown).
//! - [`Bus`]: non-blocking broadcast channel shared by the management context,
//!   execution contexts and the shutdown coordinator.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
