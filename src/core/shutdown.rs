//! # ShutdownCoordinator: stop registered entities once, at process exit.
//!
//! ## Architecture
//! ```text
//! register_for_stop_on_shutdown(e)          (any thread, any time)
//!   ├─► lock(coordinator) ─► registry exists?
//!   │        no  ─► create registry
//!   ├─► hook installed?
//!   │        no  ─► installer.install(ExitHook)
//!   │                 Ok  ─► installed (exactly once) ─► ShutdownHookInstalled
//!   │                 Err ─► warn, retried by the next registration
//!   └─► lock(registry) ─► push(e)
//!
//! ExitHook::run()                            (body runs at most once)
//!   ├─► ShutdownRequested { count }
//!   ├─► lock(registry): invoke STOP on every entity
//!   │        synchronous failure ─► StopOnShutdownFailed, continue
//!   └─► await each stop task in registration order (bounded only if Config::grace is set)
//!            ok      ─► StopOnShutdownCompleted
//!            failed  ─► StopOnShutdownFailed, continue
//!            timeout ─► StopOnShutdownFailed ("grace exceeded"), continue
//! ```
//!
//! ## Rules
//! - One broken entity never prevents the others from getting a stop attempt.
//! - The hook never fails; it returns a [`ShutdownReport`].
//! - Duplicate registrations are kept: the entity is stopped twice, each attempt independent.
//! - Later calls to [`ExitHook::run`] wait for and return the first run's report.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Weak};
use std::thread;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::core::signal::{exit_code_for, wait_for_termination};
use crate::entity::{Entity, Parameters, STOP};
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};

/// Outcome of one exit-hook run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Display forms of entities whose stop completed.
    pub stopped: Vec<String>,
    /// Display forms of entities whose stop failed, was not issued, or timed out.
    pub failed: Vec<String>,
}

impl ShutdownReport {
    /// Number of stop attempts (one per registration).
    pub fn attempted(&self) -> usize {
        self.stopped.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Installs an [`ExitHook`] with whatever "run at process exit" facility is available.
///
/// Called on registration until one call succeeds; after an `Err` the coordinator
/// retries on the next registration.
pub trait ExitHookInstaller: Send + Sync + 'static {
    fn install(&self, hook: ExitHook) -> io::Result<()>;

    /// Detaches a previously installed hook; the default does nothing.
    fn uninstall(&self) {}
}

/// Handle that runs the coordinator's exit action.
#[derive(Clone)]
pub struct ExitHook {
    shared: Weak<Shared>,
}

impl ExitHook {
    /// Runs the exit action (or waits for the run already in progress).
    ///
    /// Returns an empty report if the coordinator is gone.
    pub async fn run(&self) -> ShutdownReport {
        match self.shared.upgrade() {
            Some(shared) => shared.run().await,
            None => ShutdownReport::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitMode {
    /// `128 + signo`.
    Signal,
    Fixed(i32),
    Stay,
}

/// Runs the hook when the process receives SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere).
///
/// The listener runs on the current tokio runtime; a registration from a thread
/// without one arms it on a dedicated thread with its own runtime.
/// After the hook finishes the process exits with `128 + signo` (130 for SIGINT,
/// 131 for SIGQUIT, 143 for SIGTERM), since the signal's default action was replaced.
///
/// Clones share the armed state.
#[derive(Clone)]
pub struct SignalExitHook {
    exit: ExitMode,
    disarm: CancellationToken,
    armed: Arc<AtomicBool>,
}

impl SignalExitHook {
    pub fn new() -> Self {
        Self {
            exit: ExitMode::Signal,
            disarm: CancellationToken::new(),
            armed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Exits with `code` after the hook ran, whatever the signal.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit = ExitMode::Fixed(code);
        self
    }

    /// Keeps the process alive after the hook ran.
    pub fn keep_alive(mut self) -> Self {
        self.exit = ExitMode::Stay;
        self
    }

    /// True while a signal listener is installed.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    async fn listen(hook: ExitHook, disarm: CancellationToken, exit: ExitMode) {
        tokio::select! {
            _ = disarm.cancelled() => {}
            res = wait_for_termination() => match res {
                Ok(signo) => {
                    hook.run().await;
                    let code = match exit {
                        ExitMode::Signal => Some(exit_code_for(signo)),
                        ExitMode::Fixed(code) => Some(code),
                        ExitMode::Stay => None,
                    };
                    if let Some(code) = code {
                        std::process::exit(code);
                    }
                }
                Err(e) => warn!(target: "entityvisor", err = %e, "signal registration failed"),
            },
        }
    }
}

impl Default for SignalExitHook {
    fn default() -> Self {
        Self::new()
    }
}

impl ExitHookInstaller for SignalExitHook {
    fn install(&self, hook: ExitHook) -> io::Result<()> {
        let listener = Self::listen(hook, self.disarm.clone(), self.exit);
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(listener);
            }
            Err(_) => {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                thread::Builder::new()
                    .name("entityvisor-exit-hook".into())
                    .spawn(move || rt.block_on(listener))?;
            }
        }
        self.armed.store(true, Ordering::Release);
        Ok(())
    }

    fn uninstall(&self) {
        self.disarm.cancel();
        self.armed.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct ManualState {
    hook: Option<ExitHook>,
    installs: usize,
}

/// Installer that only keeps the hook; [`fire`](Self::fire) runs it.
///
/// Clones share state, so one clone can be handed to the coordinator and
/// another kept to fire the hook (tests, embedded runtimes with their own exit path).
#[derive(Clone, Default)]
pub struct ManualExitHook {
    state: Arc<Mutex<ManualState>>,
}

impl ManualExitHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times a hook was installed.
    pub fn installs(&self) -> usize {
        self.state.lock().installs
    }

    /// Runs the installed hook; `None` if nothing was installed yet.
    pub async fn fire(&self) -> Option<ShutdownReport> {
        let hook = self.state.lock().hook.clone()?;
        Some(hook.run().await)
    }
}

impl ExitHookInstaller for ManualExitHook {
    fn install(&self, hook: ExitHook) -> io::Result<()> {
        let mut state = self.state.lock();
        state.hook = Some(hook);
        state.installs += 1;
        Ok(())
    }

    fn uninstall(&self) {
        self.state.lock().hook = None;
    }
}

type Registry = Arc<Mutex<Vec<Arc<Entity>>>>;

#[derive(Default)]
struct HookState {
    registry: Option<Registry>,
    installed: bool,
}

struct Shared {
    cfg: Config,
    bus: Bus,
    installer: Box<dyn ExitHookInstaller>,
    hook: Mutex<HookState>,
    report: OnceCell<ShutdownReport>,
}

impl Shared {
    async fn run(&self) -> ShutdownReport {
        self.report.get_or_init(|| self.execute()).await.clone()
    }

    async fn execute(&self) -> ShutdownReport {
        let registry = self.hook.lock().registry.clone();
        let mut report = ShutdownReport::default();
        let mut pending = Vec::new();

        if let Some(registry) = registry {
            let entities = registry.lock();
            self.bus
                .publish(Event::new(EventKind::ShutdownRequested).with_count(entities.len()));
            for entity in entities.iter() {
                match entity.invoke(&STOP, Parameters::new()) {
                    Ok(task) => pending.push((Arc::clone(entity), task)),
                    Err(e) => self.failed(&mut report, entity, &e),
                }
            }
        } else {
            self.bus
                .publish(Event::new(EventKind::ShutdownRequested).with_count(0));
        }

        let deadline = self.cfg.shutdown_grace().map(|grace| Instant::now() + grace);
        for (entity, task) in pending {
            let outcome = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, task.get())
                    .await
                    .unwrap_or_else(|_elapsed| Err(TaskError::fail("grace exceeded"))),
                None => task.get().await,
            };
            match outcome {
                Ok(()) => {
                    debug!(target: "entityvisor", entity = %entity, "stopped on shutdown");
                    self.bus.publish(
                        Event::new(EventKind::StopOnShutdownCompleted)
                            .with_entity(entity.to_string()),
                    );
                    report.stopped.push(entity.to_string());
                }
                Err(e) => self.failed(&mut report, &entity, &e),
            }
        }
        report
    }

    fn failed(&self, report: &mut ShutdownReport, entity: &Entity, err: &TaskError) {
        warn!(target: "entityvisor", entity = %entity, err = %err, "problem stopping on shutdown");
        self.bus.publish(
            Event::new(EventKind::StopOnShutdownFailed)
                .with_entity(entity.to_string())
                .with_reason(err.to_string()),
        );
        report.failed.push(entity.to_string());
    }
}

/// Process-wide registry of entities to stop at exit, with one lazily installed exit hook.
///
/// # Example
/// ```rust
/// use entityvisor::{Entity, ExecutionContext, ManualExitHook, ShutdownCoordinator};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let hook = ManualExitHook::new();
/// let coordinator = ShutdownCoordinator::new(hook.clone());
///
/// let plain = Entity::builder("Plain").build(&ExecutionContext::current());
/// coordinator.register_for_stop_on_shutdown(plain);
/// assert_eq!(hook.installs(), 1);
///
/// // `Plain` has no stop effector: the attempt fails, the hook still completes.
/// let report = hook.fire().await.unwrap();
/// assert_eq!(report.failed.len(), 1);
/// # }
/// ```
pub struct ShutdownCoordinator {
    shared: Arc<Shared>,
}

impl ShutdownCoordinator {
    pub fn new(installer: impl ExitHookInstaller) -> Self {
        Self::with_config(installer, Config::default())
    }

    pub fn with_config(installer: impl ExitHookInstaller, cfg: Config) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self {
            shared: Arc::new(Shared {
                cfg,
                bus,
                installer: Box::new(installer),
                hook: Mutex::new(HookState::default()),
                report: OnceCell::new(),
            }),
        }
    }

    /// Process-wide coordinator (signal-driven hook).
    pub fn global() -> Arc<ShutdownCoordinator> {
        Arc::clone(&GLOBAL.read())
    }

    /// Replaces the process-wide coordinator with a fresh one; the old hook is uninstalled.
    pub fn reset_global() -> Arc<ShutdownCoordinator> {
        let fresh = Arc::new(ShutdownCoordinator::default());
        let old = std::mem::replace(&mut *GLOBAL.write(), Arc::clone(&fresh));
        old.shared.installer.uninstall();
        fresh
    }

    /// Events published by this coordinator.
    pub fn bus(&self) -> &Bus {
        &self.shared.bus
    }

    /// Adds `entity` to the stop-on-shutdown registry, installing the hook on first use.
    pub fn register_for_stop_on_shutdown(&self, entity: Arc<Entity>) {
        self.registry().lock().push(entity);
    }

    fn registry(&self) -> Registry {
        let mut state = self.shared.hook.lock();
        let registry = Arc::clone(state.registry.get_or_insert_with(Registry::default));
        if !state.installed {
            let hook = ExitHook {
                shared: Arc::downgrade(&self.shared),
            };
            match self.shared.installer.install(hook) {
                Ok(()) => {
                    state.installed = true;
                    self.shared
                        .bus
                        .publish(Event::new(EventKind::ShutdownHookInstalled));
                }
                Err(e) => {
                    warn!(target: "entityvisor", err = %e, "exit hook not installed; retrying on next registration")
                }
            }
        }
        registry
    }

    /// True once the exit hook has been installed.
    pub fn is_installed(&self) -> bool {
        self.shared.hook.lock().installed
    }

    /// Snapshot of the registered entities, in registration order.
    pub fn registered(&self) -> Vec<Arc<Entity>> {
        let registry = self.shared.hook.lock().registry.clone();
        registry.map(|r| r.lock().clone()).unwrap_or_default()
    }

    /// Runs the exit action directly (orderly programmatic exit); at most once.
    pub async fn run_exit_hook(&self) -> ShutdownReport {
        self.shared.run().await
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(SignalExitHook::new())
    }
}

static GLOBAL: LazyLock<RwLock<Arc<ShutdownCoordinator>>> =
    LazyLock::new(|| RwLock::new(Arc::new(ShutdownCoordinator::default())));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Location, Startable};
    use crate::tasks::ExecutionContext;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Sleepy(Duration);

    #[async_trait]
    impl Startable for Sleepy {
        async fn start(&self, _e: &Arc<Entity>, _l: &[Location]) -> Result<(), TaskError> {
            Ok(())
        }

        async fn stop(&self, _e: &Arc<Entity>) -> Result<(), TaskError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hook_body_runs_once() {
        let hook = ManualExitHook::new();
        let coordinator = ShutdownCoordinator::new(hook.clone());
        let ctx = ExecutionContext::current();
        coordinator.register_for_stop_on_shutdown(
            Entity::builder("Quick")
                .startable(Sleepy(Duration::ZERO))
                .build(&ctx),
        );

        let first = hook.fire().await.unwrap();
        let second = coordinator.run_exit_hook().await;
        assert_eq!(first.stopped.len(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_bounds_the_wait() {
        let hook = ManualExitHook::new();
        let cfg = Config {
            grace: Duration::from_secs(1),
            ..Config::default()
        };
        let coordinator = ShutdownCoordinator::with_config(hook.clone(), cfg);
        let ctx = ExecutionContext::current();
        let slow = Entity::builder("Slow")
            .startable(Sleepy(Duration::from_secs(30)))
            .build(&ctx);
        let quick = Entity::builder("Quick")
            .startable(Sleepy(Duration::ZERO))
            .build(&ctx);
        coordinator.register_for_stop_on_shutdown(slow.clone());
        coordinator.register_for_stop_on_shutdown(quick.clone());

        let report = hook.fire().await.unwrap();
        assert_eq!(report.failed, vec![slow.to_string()]);
        assert_eq!(report.stopped, vec![quick.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_config_waits_for_slow_stops() {
        let hook = ManualExitHook::new();
        let coordinator = ShutdownCoordinator::new(hook.clone());
        let ctx = ExecutionContext::current();
        let slow = Entity::builder("Slow")
            .startable(Sleepy(Duration::from_secs(90)))
            .build(&ctx);
        coordinator.register_for_stop_on_shutdown(slow.clone());

        let began = Instant::now();
        let report = hook.fire().await.unwrap();
        assert!(began.elapsed() >= Duration::from_secs(90));
        assert_eq!(report.stopped, vec![slow.to_string()]);
        assert!(report.is_clean());
    }

    /// Fails the first install, succeeds afterwards.
    #[derive(Default)]
    struct FlakyInstaller {
        attempts: Arc<AtomicUsize>,
    }

    impl ExitHookInstaller for FlakyInstaller {
        fn install(&self, _hook: ExitHook) -> io::Result<()> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(io::Error::other("no runtime"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_install_is_retried() {
        let installer = FlakyInstaller::default();
        let attempts = Arc::clone(&installer.attempts);
        let coordinator = ShutdownCoordinator::new(installer);
        let mut rx = coordinator.bus().subscribe();
        let ctx = ExecutionContext::current();

        coordinator.register_for_stop_on_shutdown(Entity::builder("First").build(&ctx));
        assert!(!coordinator.is_installed());
        assert_eq!(coordinator.registered().len(), 1);

        coordinator.register_for_stop_on_shutdown(Entity::builder("Second").build(&ctx));
        coordinator.register_for_stop_on_shutdown(Entity::builder("Third").build(&ctx));
        assert!(coordinator.is_installed());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.registered().len(), 3);
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::ShutdownHookInstalled);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_nothing_installed_until_first_registration() {
        let hook = ManualExitHook::new();
        let coordinator = ShutdownCoordinator::new(hook.clone());

        assert!(!coordinator.is_installed());
        assert!(hook.fire().await.is_none());
        assert_eq!(coordinator.run_exit_hook().await.attempted(), 0);
        assert_eq!(hook.installs(), 0);
    }

    #[tokio::test]
    async fn test_reset_global_replaces_instance() {
        let before = ShutdownCoordinator::global();
        let fresh = ShutdownCoordinator::reset_global();
        let after = ShutdownCoordinator::global();

        assert!(!Arc::ptr_eq(&before, &after));
        assert!(Arc::ptr_eq(&fresh, &after));
        assert!(after.registered().is_empty());
    }
}
