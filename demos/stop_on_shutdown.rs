//! # Demo: stop_on_shutdown
//!
//! Starts a small entity tree, dumps it, and registers every node with the
//! process-wide [`ShutdownCoordinator`]. Press Ctrl-C: the exit hook stops each
//! node (one of them fails on purpose) and the process exits.
//!
//! ## Flow
//! ```text
//! ManagementContext(LogWriter)
//!   └─► App ─┬─► Vm(vm-0)   start ─► register_for_stop_on_shutdown
//!            ├─► Vm(vm-1)   start ─► register_for_stop_on_shutdown
//!            └─► Vm(flaky)  start ─► register_for_stop_on_shutdown
//!
//! Ctrl-C ─► SignalExitHook ─► STOP × 3 (flaky fails, others still stop) ─► exit(128 + signo)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=entityvisor=debug cargo run --example stop_on_shutdown
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use entityvisor::{
    AttributeSensor, Config, ConfigKey, Entity, Location, LogWriter, ManagementContext,
    ShutdownCoordinator, Startable, Subscribe, TaskError, introspect, start,
};
use tracing_subscriber::EnvFilter;

const CPU_COUNT: ConfigKey<u32> = ConfigKey::described("vm.cpus", "virtual CPUs");
const ROOT_PASSWORD: ConfigKey<String> = ConfigKey::new("vm.root.password");
const HOSTNAME: AttributeSensor<String> = AttributeSensor::new("host.name");

struct Vm {
    fail_stop: bool,
}

#[async_trait]
impl Startable for Vm {
    async fn start(&self, entity: &Arc<Entity>, locations: &[Location]) -> Result<(), TaskError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let region = locations.first().map(|l| l.name.as_str()).unwrap_or("local");
        let host = format!("{}.{region}", entity.name().unwrap_or("vm"));
        entity
            .set_attribute(&HOSTNAME, &host)
            .map_err(|e| TaskError::fail(e.to_string()))
    }

    async fn stop(&self, entity: &Arc<Entity>) -> Result<(), TaskError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if self.fail_stop {
            return Err(TaskError::fail(format!("{entity}: hypervisor unreachable")));
        }
        println!("[demo] stopped {entity}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let ctx = ManagementContext::new(Config::default(), subs);
    let coordinator = ShutdownCoordinator::global();

    let app = Entity::builder("App")
        .named("demo")
        .build(ctx.execution_context());
    for name in ["vm-0", "vm-1", "flaky"] {
        let vm = Entity::builder("Vm")
            .named(name)
            .config(&CPU_COUNT, 2)
            .config(&ROOT_PASSWORD, "hunter2")
            .sensor(&HOSTNAME)
            .startable(Vm {
                fail_stop: name == "flaky",
            })
            .build_child_of(&app)?;
        let vm = start(Some(&ctx), vm, &[Location::new("eu-west")]).await?;
        coordinator.register_for_stop_on_shutdown(vm);
    }

    introspect::dump_info_stdout(&app).await?;
    println!("[demo] {} entities registered; press Ctrl-C", coordinator.registered().len());

    std::future::pending::<()>().await;
    Ok(())
}
