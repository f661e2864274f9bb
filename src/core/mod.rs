//! Runtime core: fan-out, lifecycle and shutdown.
//!
//! - [`invoker`]: one effector over many entities as one composite task;
//! - [`lifecycle`]: manage + start, and stop → teardown → unmanage;
//! - [`shutdown`]: process-wide stop-on-shutdown registry and its exit hook;
//! - `signal`: cross-platform termination signal listener.

pub mod invoker;
pub mod lifecycle;
pub mod shutdown;
mod signal;

pub use invoker::{invoke_many, invoke_many_with};
pub use lifecycle::{destroy, start};
pub use shutdown::{
    ExitHook, ExitHookInstaller, ManualExitHook, ShutdownCoordinator, ShutdownReport,
    SignalExitHook,
};
