//! # Effectors: named, remotely invokable operations on an entity.
//!
//! An [`Effector<T>`] is the typed *name* of an operation; the behaviour is an
//! [`EffectorBody`] registered on each entity that supports it. Bodies produce a
//! `serde_json::Value` which is decoded into `T` when the invocation completes.
//!
//! ```text
//! entity.invoke(&Effector<T>, Parameters)
//!   ├─► lookup body by name       (missing → TaskError::EffectorNotFound, synchronously)
//!   └─► entity.execution().submit:
//!         body.call(entity, params) ─► Value ─► serde_json::from_value::<T>
//! ```
//!
//! Startable entities get [`START`] and [`STOP`] bound automatically.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::{Entity, Location, Startable};
use crate::error::TaskError;

/// Declared parameter of an effector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: &'static str,
    pub description: &'static str,
}

impl ParameterInfo {
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self { name, description }
    }
}

/// Typed name of an invokable operation.
pub struct Effector<T> {
    name: &'static str,
    parameters: &'static [ParameterInfo],
    _type: PhantomData<fn() -> T>,
}

impl<T> Effector<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            parameters: &[],
            _type: PhantomData,
        }
    }

    /// Attaches the parameter schema.
    pub const fn with_parameters(mut self, parameters: &'static [ParameterInfo]) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parameters(&self) -> &'static [ParameterInfo] {
        self.parameters
    }
}

impl<T> Clone for Effector<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Effector<T> {}

impl<T> fmt::Debug for Effector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Effector({})", self.name)
    }
}

/// Parameter carrying the start locations.
pub const LOCATIONS_PARAM: &str = "locations";

/// Starts a [`Startable`] entity; takes a `locations` array.
pub const START: Effector<()> = Effector::new("start").with_parameters(&[ParameterInfo::new(
    LOCATIONS_PARAM,
    "locations to start the entity at",
)]);

/// Stops a [`Startable`] entity.
pub const STOP: Effector<()> = Effector::new("stop");

/// Named arguments of an invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a named argument.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Decodes a named argument; `Ok(None)` when it is absent.
    pub fn decode<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, TaskError> {
        self.0
            .get(name)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|e| {
                    TaskError::fail(format!("invalid parameter '{name}': {e}"))
                })
            })
            .transpose()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Behaviour behind an effector name on a particular entity.
#[async_trait]
pub trait EffectorBody: Send + Sync + 'static {
    async fn call(&self, entity: Arc<Entity>, params: Parameters) -> Result<Value, TaskError>;
}

/// Closure-backed [`EffectorBody`].
///
/// ```rust
/// use serde_json::json;
/// use entityvisor::EffectorFn;
///
/// let body = EffectorFn::arc(|entity, _params| async move {
///     Ok(json!(entity.id().get()))
/// });
/// # let _ = body;
/// ```
pub struct EffectorFn<F> {
    f: F,
}

impl<F, Fut> EffectorFn<F>
where
    F: Fn(Arc<Entity>, Parameters) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }

    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> EffectorBody for EffectorFn<F>
where
    F: Fn(Arc<Entity>, Parameters) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
{
    async fn call(&self, entity: Arc<Entity>, params: Parameters) -> Result<Value, TaskError> {
        (self.f)(entity, params).await
    }
}

#[derive(Clone, Copy)]
enum LifecycleOp {
    Start,
    Stop,
}

/// Binds [`START`] / [`STOP`] to a [`Startable`] capability.
pub(crate) struct StartableEffector {
    startable: Arc<dyn Startable>,
    op: LifecycleOp,
}

impl StartableEffector {
    pub(crate) fn start(startable: Arc<dyn Startable>) -> Arc<Self> {
        Arc::new(Self {
            startable,
            op: LifecycleOp::Start,
        })
    }

    pub(crate) fn stop(startable: Arc<dyn Startable>) -> Arc<Self> {
        Arc::new(Self {
            startable,
            op: LifecycleOp::Stop,
        })
    }
}

#[async_trait]
impl EffectorBody for StartableEffector {
    async fn call(&self, entity: Arc<Entity>, params: Parameters) -> Result<Value, TaskError> {
        match self.op {
            LifecycleOp::Start => {
                let locations: Vec<Location> =
                    params.decode(LOCATIONS_PARAM)?.unwrap_or_default();
                self.startable.start(&entity, &locations).await?;
            }
            LifecycleOp::Stop => self.startable.stop(&entity).await?,
        }
        Ok(Value::Null)
    }
}
