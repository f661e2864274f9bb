//! # Entity model.
//!
//! - [`Entity`] / [`EntityBuilder`]: identity, ownership tree, config, sensors, effectors.
//! - [`Effector`] / [`EffectorBody`]: typed operation names and their per-entity behaviour.
//! - [`Startable`] / [`Teardown`]: optional capabilities.
//! - [`graph`]: ancestor/descendant queries over the ownership tree.

mod capability;
mod effector;
#[allow(clippy::module_inception)]
mod entity;
pub mod graph;
mod keys;

pub use capability::{DetachOnly, Startable, Teardown};
pub use effector::{
    Effector, EffectorBody, EffectorFn, LOCATIONS_PARAM, ParameterInfo, Parameters, START, STOP,
};
pub use entity::{Entity, EntityBuilder, EntityId};
pub use keys::{
    AttributeSensor, ConfigKey, ConfigValue, KeyInfo, Location, NotificationSensor, SensorInfo,
    SensorKind,
};
