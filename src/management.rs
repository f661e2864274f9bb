//! # ManagementContext: authority over which entities are managed.
//!
//! The context owns the runtime plumbing shared by the entities it manages:
//! the event [`Bus`], the [`SubscriberSet`] fed from it, and the
//! [`ExecutionContext`] template (runtime handle + global semaphore).
//!
//! ```text
//! ManagementContext::new(cfg, subscribers)
//!   ├─► Bus::new(cfg.bus_capacity)
//!   ├─► SubscriberSet::new(subscribers, bus)
//!   ├─► listener: Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!   └─► ExecutionContext { Handle::current(), bus, Semaphore(cfg.max_concurrent)? }
//!
//! manage(e)    ─► e.claim(ctx.id)  ─► managed.insert  ─► EntityManaged
//! unmanage(e)  ─► managed.remove   ─► e.release(ctx.id) ─► EntityUnmanaged
//! ```
//!
//! ## Rules
//! - `manage` / `unmanage` are idempotent.
//! - An entity is managed by at most one context; claiming it from another fails with
//!   [`LifecycleError::ManagedElsewhere`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::sync::broadcast::error::RecvError;

use crate::config::Config;
use crate::entity::{Entity, EntityId};
use crate::error::LifecycleError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::ExecutionContext;

/// Context ids start at 1; 0 means "unmanaged" on the entity side.
static CONTEXT_IDS: AtomicU64 = AtomicU64::new(1);

/// Tracks managed entities and owns the shared runtime plumbing.
pub struct ManagementContext {
    id: u64,
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    execution: ExecutionContext,
    managed: RwLock<HashMap<EntityId, Arc<Entity>>>,
}

impl ManagementContext {
    /// Creates a context on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside of a tokio runtime.
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Arc<Self> {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone()));
        let semaphore = cfg
            .concurrency_limit()
            .map(|n| Arc::new(Semaphore::new(n)));
        let execution = ExecutionContext::new(Handle::current(), bus.clone(), semaphore);

        let ctx = Arc::new(Self {
            id: CONTEXT_IDS.fetch_add(1, Ordering::Relaxed),
            cfg,
            bus,
            subs,
            execution,
            managed: RwLock::new(HashMap::new()),
        });
        ctx.subscriber_listener();
        ctx
    }

    /// Forwards bus events to the subscriber set (fire-and-forget).
    fn subscriber_listener(&self) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus shared by every entity built from this context.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Execution context to build entities with.
    pub fn execution_context(&self) -> &ExecutionContext {
        &self.execution
    }

    /// Registers `entity` as managed by this context.
    pub fn manage(&self, entity: &Arc<Entity>) -> Result<(), LifecycleError> {
        entity
            .claim_management(self.id)
            .map_err(|context| LifecycleError::ManagedElsewhere {
                entity: entity.to_string(),
                context,
            })?;

        let fresh = self
            .managed
            .write()
            .insert(entity.id(), Arc::clone(entity))
            .is_none();
        if fresh {
            self.bus
                .publish(Event::new(EventKind::EntityManaged).with_entity(entity.to_string()));
        }
        Ok(())
    }

    /// Removes `entity` from this context; returns whether it was managed here.
    pub fn unmanage(&self, entity: &Entity) -> bool {
        let removed = self.managed.write().remove(&entity.id()).is_some();
        if removed {
            entity.release_management(self.id);
            self.bus
                .publish(Event::new(EventKind::EntityUnmanaged).with_entity(entity.to_string()));
        }
        removed
    }

    pub fn is_managed(&self, entity: &Entity) -> bool {
        self.managed.read().contains_key(&entity.id())
    }

    /// Snapshot of the managed entities, sorted by id.
    pub fn managed(&self) -> Vec<Arc<Entity>> {
        let mut out: Vec<Arc<Entity>> = self.managed.read().values().cloned().collect();
        out.sort_by_key(|e| e.id());
        out
    }
}

impl std::fmt::Debug for ManagementContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementContext")
            .field("id", &self.id)
            .field("managed", &self.managed.read().len())
            .field("subscribers", &self.subs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manage_is_idempotent_and_exclusive() {
        let ctx = ManagementContext::new(Config::default(), Vec::new());
        let other = ManagementContext::new(Config::default(), Vec::new());
        let e = Entity::builder("Web").build(ctx.execution_context());

        ctx.manage(&e).unwrap();
        ctx.manage(&e).unwrap();
        assert_eq!(ctx.managed().len(), 1);
        assert_eq!(e.managed_by(), Some(ctx.id()));

        let err = other.manage(&e).unwrap_err();
        assert_eq!(err.as_label(), "lifecycle_managed_elsewhere");
        assert!(!other.is_managed(&e));

        assert!(ctx.unmanage(&e));
        assert!(!ctx.unmanage(&e));
        assert_eq!(e.managed_by(), None);
        other.manage(&e).unwrap();
    }

    #[tokio::test]
    async fn test_publishes_management_events() {
        let ctx = ManagementContext::new(Config::default(), Vec::new());
        let mut rx = ctx.bus().subscribe();
        let e = Entity::builder("Db").build(ctx.execution_context());

        ctx.manage(&e).unwrap();
        ctx.unmanage(&e);

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::EntityManaged);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::EntityUnmanaged);
        assert_eq!(ev.entity.as_deref(), Some(e.to_string().as_str()));
    }

    #[tokio::test]
    async fn test_managed_snapshot_is_sorted() {
        let ctx = ManagementContext::new(Config::default(), Vec::new());
        let a = Entity::builder("A").build(ctx.execution_context());
        let b = Entity::builder("B").build(ctx.execution_context());

        ctx.manage(&b).unwrap();
        ctx.manage(&a).unwrap();
        let ids: Vec<_> = ctx.managed().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![a.id(), b.id()]);
    }
}
