//! # entityvisor
//!
//! **Entityvisor** is the orchestration core of an application-management runtime.
//!
//! A tree of managed *entities* (deployed application components) exposes
//! invokable *effectors* and observable *sensors*. The crate fans effector calls
//! out to many entities as one awaitable task, drives entity lifecycle, and stops
//! registered entities exactly once when the process exits.
//!
//! ## Architecture
//! ### Overview
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ManagementContext                                                │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to subscribers, e.g. LogWriter)        │
//! │  - ExecutionContext template (runtime handle + global semaphore)  │
//! │  - managed entities                                               │
//! └──────┬──────────────────────────────┬─────────────────────────────┘
//!        │ manage / unmanage            │ execution_context()
//!        ▼                              ▼
//!   lifecycle::start / destroy     Entity tree (owner: Weak, children: Arc)
//!        │                              │
//!        │ invoke START / STOP          ├─► graph: is_ancestor / is_descendant
//!        ▼                              ├─► introspect: dump_info
//!   Entity::invoke(effector) ◄──────────┤
//!        ▲                              │
//!        │ one unit per target          │
//!   invoke_many(caller, targets) ──► ParallelTask in caller's context ──► Task<Vec<T>>
//!
//!   ShutdownCoordinator (process-wide, lazy)
//!        register_for_stop_on_shutdown(e) ──► registry + exactly one ExitHook
//!        exit hook ──► STOP on every registered entity, failures isolated, optional grace deadline
//! ```
//!
//! ### Task states
//! ```text
//! Pending ──► Running ──► Succeeded(value)
//!    │           └──────► Failed(TaskError)
//!    └──────────────────► Failed(Closed)
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / functions                         |
//! |-------------------|-----------------------------------------------------------------|-----------------------------------------------|
//! | **Entities**      | Ownership tree, config, sensors, effectors, capabilities        | [`Entity`], [`EntityBuilder`], [`Effector`]   |
//! | **Tasks**         | Awaitable handles, execution contexts, composite fan-in         | [`Task`], [`ExecutionContext`], [`ParallelTask`] |
//! | **Fan-out**       | One effector over many entities as one task                     | [`invoke_many`], [`invoke_many_with`]         |
//! | **Lifecycle**     | Manage + start; stop → teardown → unmanage                      | [`start`], [`destroy`], [`ManagementContext`] |
//! | **Shutdown**      | Stop-on-exit registry with a single exit hook                   | [`ShutdownCoordinator`], [`ExitHookInstaller`] |
//! | **Introspection** | Redacted recursive dump of a subtree                            | [`introspect::dump_info`]                     |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom subscribers) | [`Subscribe`], [`LogWriter`]                  |
//! | **Errors**        | Typed errors with stable labels                                 | [`TaskError`], [`LifecycleError`]             |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use entityvisor::{
//!     Config, Entity, LogWriter, Location, ManagementContext, Startable, Subscribe, TaskError,
//!     STOP, destroy, invoke_many, start,
//! };
//!
//! struct Service;
//!
//! #[async_trait]
//! impl Startable for Service {
//!     async fn start(&self, _e: &Arc<Entity>, _l: &[Location]) -> Result<(), TaskError> {
//!         Ok(())
//!     }
//!     async fn stop(&self, _e: &Arc<Entity>) -> Result<(), TaskError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let ctx = ManagementContext::new(Config::default(), subs);
//!
//!     let app = Entity::builder("App").build(ctx.execution_context());
//!     for _ in 0..3 {
//!         let web = Entity::builder("Web").startable(Service).build_child_of(&app)?;
//!         start(Some(&ctx), web, &[Location::new("eu-west")]).await?;
//!     }
//!
//!     // Stop every child with one task.
//!     let stopped = invoke_many(&app, app.children(), &STOP).expect("has children");
//!     assert_eq!(stopped.get().await?.len(), 3);
//!
//!     for web in app.children() {
//!         destroy(Some(&ctx), &web).await?;
//!     }
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod entity;
mod error;
mod events;
pub mod introspect;
mod management;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{
    ExitHook, ExitHookInstaller, ManualExitHook, ShutdownCoordinator, ShutdownReport,
    SignalExitHook, destroy, invoke_many, invoke_many_with, start,
};
pub use entity::graph;
pub use entity::{
    AttributeSensor, ConfigKey, ConfigValue, DetachOnly, Effector, EffectorBody, EffectorFn,
    Entity, EntityBuilder, EntityId, KeyInfo, LOCATIONS_PARAM, Location, NotificationSensor,
    ParameterInfo, Parameters, START, STOP, SensorInfo, SensorKind, Startable, Teardown,
};
pub use error::{DumpError, GraphError, LifecycleError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use management::ManagementContext;
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{Completer, ExecutionContext, ParallelTask, Task, TaskState};
