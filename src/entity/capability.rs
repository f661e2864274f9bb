//! # Entity capabilities.
//!
//! Capabilities are optional trait objects attached to an entity at build time
//! and discovered with a query (`entity.startable()`, `entity.teardown()`),
//! not through a type hierarchy.
//!
//! - [`Startable`]: start/stop operations; also bound as the `start` / `stop` effectors.
//! - [`Teardown`]: release of internally held resources before the entity is detached.

use std::sync::Arc;

use async_trait::async_trait;

use crate::entity::{Entity, Location};
use crate::error::TaskError;

/// # Entity that can be started at locations and stopped.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use entityvisor::{Entity, Location, Startable, TaskError};
///
/// struct Noop;
///
/// #[async_trait]
/// impl Startable for Noop {
///     async fn start(&self, _entity: &Arc<Entity>, _locations: &[Location]) -> Result<(), TaskError> {
///         Ok(())
///     }
///
///     async fn stop(&self, _entity: &Arc<Entity>) -> Result<(), TaskError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Startable: Send + Sync + 'static {
    /// Starts the entity at the given locations.
    async fn start(&self, entity: &Arc<Entity>, locations: &[Location]) -> Result<(), TaskError>;

    /// Stops the entity.
    async fn stop(&self, entity: &Arc<Entity>) -> Result<(), TaskError>;
}

/// # Entity that holds resources to release when destroyed.
///
/// After `release` succeeds the entity is detached from its owner.
#[async_trait]
pub trait Teardown: Send + Sync + 'static {
    /// Releases internally held resources.
    async fn release(&self, entity: &Arc<Entity>) -> Result<(), TaskError>;
}

/// Teardown with nothing to release: the entity is only detached from its owner.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachOnly;

#[async_trait]
impl Teardown for DetachOnly {
    async fn release(&self, _entity: &Arc<Entity>) -> Result<(), TaskError> {
        Ok(())
    }
}
