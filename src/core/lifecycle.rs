//! # Lifecycle: registration and start/stop transitions.
//!
//! ```text
//! start(ctx?, e, locations)
//!   ├─► ctx.manage(e)                               (if ctx)
//!   └─► e.startable()? ─► e.locations = locations
//!                       └► invoke START { locations } ─► await
//!
//! destroy(ctx?, e)                                   fixed order:
//!   1. e.startable()?  ─► invoke STOP ─► await
//!   2. e.teardown()?   ─► release(e) ─► e.detach()
//!   3. ctx.unmanage(e)                              (if ctx)
//! ```
//!
//! Nothing is swallowed: the first failing step aborts the transition and is
//! returned as a [`LifecycleError`]. There is no retry.

use std::sync::Arc;

use crate::entity::{Entity, LOCATIONS_PARAM, Location, Parameters, START, STOP};
use crate::error::{LifecycleError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::management::ManagementContext;

fn bus_for<'a>(ctx: Option<&'a ManagementContext>, entity: &'a Entity) -> &'a Bus {
    match ctx {
        Some(ctx) => ctx.bus(),
        None => entity.execution().bus(),
    }
}

/// Registers `entity` with `ctx` (if any) and starts it at `locations` if it is startable.
///
/// Returns the same entity for chaining.
pub async fn start(
    ctx: Option<&ManagementContext>,
    entity: Arc<Entity>,
    locations: &[Location],
) -> Result<Arc<Entity>, LifecycleError> {
    if let Some(ctx) = ctx {
        ctx.manage(&entity)?;
    }
    if entity.startable().is_none() {
        return Ok(entity);
    }

    let bus = bus_for(ctx, &entity);
    bus.publish(
        Event::new(EventKind::EntityStarting)
            .with_entity(entity.to_string())
            .with_count(locations.len()),
    );

    entity.set_locations(locations.to_vec());
    run_start(&entity, locations)
        .await
        .map_err(|source| LifecycleError::Start {
            entity: entity.to_string(),
            source,
        })?;

    bus.publish(Event::new(EventKind::EntityStarted).with_entity(entity.to_string()));
    Ok(entity)
}

async fn run_start(entity: &Arc<Entity>, locations: &[Location]) -> Result<(), TaskError> {
    let locations = serde_json::to_value(locations).map_err(|e| TaskError::fail(e.to_string()))?;
    let params = Parameters::new().with(LOCATIONS_PARAM, locations);
    entity.invoke(&START, params)?.get().await
}

/// Stops, tears down and unregisters `entity`, in that order.
pub async fn destroy(
    ctx: Option<&ManagementContext>,
    entity: &Arc<Entity>,
) -> Result<(), LifecycleError> {
    let bus = bus_for(ctx, entity);

    if entity.startable().is_some() {
        bus.publish(Event::new(EventKind::EntityStopping).with_entity(entity.to_string()));
        stop(entity)
            .await
            .map_err(|source| LifecycleError::Stop {
                entity: entity.to_string(),
                source,
            })?;
        bus.publish(Event::new(EventKind::EntityStopped).with_entity(entity.to_string()));
    }

    if let Some(teardown) = entity.teardown() {
        teardown
            .release(entity)
            .await
            .map_err(|source| LifecycleError::Teardown {
                entity: entity.to_string(),
                source,
            })?;
        entity.detach();
        bus.publish(Event::new(EventKind::EntityDestroyed).with_entity(entity.to_string()));
    }

    if let Some(ctx) = ctx {
        ctx.unmanage(entity);
    }
    Ok(())
}

pub(crate) async fn stop(entity: &Arc<Entity>) -> Result<(), TaskError> {
    entity.invoke(&STOP, Parameters::new())?.get().await
}
