//! # Event subscribers for the entityvisor runtime.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] that
//! fans runtime events out to every subscriber.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   publishers ── publish(Event) ──► Bus ──► ManagementContext listener ──► SubscriberSet::emit
//!                                                           ┌─────────┼─────────┐
//!                                                           ▼         ▼         ▼
//!                                                       [queue S1] [queue S2] [queue SN]
//!                                                           │         │         │
//!                                                       on_event  on_event  on_event
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use entityvisor::{Subscribe, Event, EventKind};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if matches!(event.kind, EventKind::InvocationFailed) {
//!             // increment failure counter
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "failure-counter" }
//! }
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
