//! # Entity: a managed node in the ownership tree.
//!
//! ## Ownership
//! ```text
//!            app (owner = none)
//!           /   \
//!        web     db          children: strong Arc<Entity>
//!         │                  owner:    Weak<Entity> back-reference
//!       worker
//! ```
//!
//! ## Rules
//! - `e ∈ owner.children ⇔ e.owner == owner`: both sides change under the child's owner lock.
//! - Entities are never moved: attaching an owned entity fails with [`GraphError::AlreadyOwned`].
//! - Attaching an ancestor below its descendant fails with [`GraphError::Cycle`].
//! - Equality and hashing are by [`EntityId`].

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::entity::effector::StartableEffector;
use crate::entity::{
    AttributeSensor, ConfigKey, ConfigValue, DetachOnly, Effector, EffectorBody, KeyInfo,
    Location, NotificationSensor, Parameters, START, STOP, SensorInfo, Startable, Teardown, graph,
};
use crate::error::{GraphError, TaskError};
use crate::tasks::{ExecutionContext, Task};

/// Global id counter for entities.
static ENTITY_IDS: AtomicU64 = AtomicU64::new(1);

/// Marker for "not managed by any context".
const UNMANAGED: u64 = 0;

/// Process-unique entity identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        Self(ENTITY_IDS.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A managed node: identity, tree links, config, sensors, effectors and capabilities.
pub struct Entity {
    id: EntityId,
    kind: Arc<str>,
    name: Option<Arc<str>>,
    execution: ExecutionContext,

    owner: RwLock<Weak<Entity>>,
    children: RwLock<Vec<Arc<Entity>>>,
    locations: RwLock<Vec<Location>>,

    config_keys: RwLock<Vec<KeyInfo>>,
    config: RwLock<HashMap<Arc<str>, ConfigValue>>,
    sensors: RwLock<Vec<SensorInfo>>,
    attributes: RwLock<HashMap<Arc<str>, Value>>,
    effectors: RwLock<HashMap<&'static str, Arc<dyn EffectorBody>>>,

    startable: Option<Arc<dyn Startable>>,
    teardown: Option<Arc<dyn Teardown>>,
    managed_by: AtomicU64,
}

impl Entity {
    /// Starts building an entity of the given kind (e.g. `"WebServer"`).
    pub fn builder(kind: impl Into<Arc<str>>) -> EntityBuilder {
        EntityBuilder::new(kind)
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The context this entity's own work (effector bodies) is submitted into.
    pub fn execution(&self) -> &ExecutionContext {
        &self.execution
    }

    // ---------------------------
    // Ownership tree
    // ---------------------------

    /// Current owner, `None` at the root.
    pub fn owner(&self) -> Option<Arc<Entity>> {
        self.owner.read().upgrade()
    }

    /// Snapshot of the owned children.
    pub fn children(&self) -> Vec<Arc<Entity>> {
        self.children.read().clone()
    }

    /// True if `other` is a direct child.
    pub fn has_child(&self, other: &Entity) -> bool {
        self.children.read().iter().any(|c| c.id == other.id)
    }

    /// Attaches `child` below this entity.
    pub fn add_child(self: &Arc<Self>, child: &Arc<Entity>) -> Result<(), GraphError> {
        if self.id == child.id || graph::is_ancestor(self, child) {
            return Err(GraphError::Cycle {
                parent: self.to_string(),
                child: child.to_string(),
            });
        }

        let mut owner = child.owner.write();
        if let Some(current) = owner.upgrade() {
            return Err(GraphError::AlreadyOwned {
                child: child.to_string(),
                owner: current.to_string(),
            });
        }
        *owner = Arc::downgrade(self);
        self.children.write().push(Arc::clone(child));
        Ok(())
    }

    /// Detaches this entity from its owner; returns the former owner.
    pub fn detach(&self) -> Option<Arc<Entity>> {
        let mut owner = self.owner.write();
        let former = std::mem::take(&mut *owner).upgrade();
        if let Some(parent) = &former {
            parent.children.write().retain(|c| c.id != self.id);
        }
        former
    }

    // ---------------------------
    // Locations, config, sensors
    // ---------------------------

    pub fn locations(&self) -> Vec<Location> {
        self.locations.read().clone()
    }

    pub fn set_locations(&self, locations: Vec<Location>) {
        *self.locations.write() = locations;
    }

    /// Declares a config key without setting a value.
    pub fn declare_config<T>(&self, key: &ConfigKey<T>) {
        self.declare_key(key.info());
    }

    fn declare_key(&self, info: KeyInfo) {
        let mut keys = self.config_keys.write();
        if !keys.iter().any(|k| k.name == info.name) {
            keys.push(info);
        }
    }

    /// Declared config keys, in declaration order.
    pub fn config_keys(&self) -> Vec<KeyInfo> {
        self.config_keys.read().clone()
    }

    /// Sets a resolved config value, declaring the key if needed.
    pub fn set_config<T: Serialize>(&self, key: &ConfigKey<T>, value: &T) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.put_config(key.info(), ConfigValue::Ready(value));
        Ok(())
    }

    /// Sets a config value that is still being computed.
    pub fn set_config_deferred<T>(&self, key: &ConfigKey<T>, task: Task<Value>) {
        self.put_config(key.info(), ConfigValue::Deferred(task));
    }

    fn put_config(&self, info: KeyInfo, value: ConfigValue) {
        let name = Arc::clone(&info.name);
        self.declare_key(info);
        self.config.write().insert(name, value);
    }

    /// Raw stored value for a config key name.
    pub fn config_value(&self, name: &str) -> Option<ConfigValue> {
        self.config.read().get(name).cloned()
    }

    /// Typed config value; a deferred value is only visible once it succeeded.
    pub fn config<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T> {
        let value = match self.config_value(key.name())? {
            ConfigValue::Ready(v) => v,
            ConfigValue::Deferred(task) => task.peek()?.ok()?,
        };
        serde_json::from_value(value).ok()
    }

    /// Declares a sensor without a value.
    pub fn declare_sensor(&self, info: SensorInfo) {
        let mut sensors = self.sensors.write();
        if !sensors.iter().any(|s| s.name == info.name) {
            sensors.push(info);
        }
    }

    /// Declared sensors, in declaration order.
    pub fn sensors(&self) -> Vec<SensorInfo> {
        self.sensors.read().clone()
    }

    /// Publishes the current value of an attribute sensor, declaring it if needed.
    pub fn set_attribute<T: Serialize>(
        &self,
        sensor: &AttributeSensor<T>,
        value: &T,
    ) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.put_attribute(sensor.info(), value);
        Ok(())
    }

    fn put_attribute(&self, info: SensorInfo, value: Value) {
        let name = Arc::clone(&info.name);
        self.declare_sensor(info);
        self.attributes.write().insert(name, value);
    }

    /// Raw current value of an attribute sensor.
    pub fn attribute_value(&self, name: &str) -> Option<Value> {
        self.attributes.read().get(name).cloned()
    }

    pub fn attribute<T: DeserializeOwned>(&self, sensor: &AttributeSensor<T>) -> Option<T> {
        serde_json::from_value(self.attribute_value(sensor.name())?).ok()
    }

    // ---------------------------
    // Effectors and capabilities
    // ---------------------------

    /// Registers (or replaces) the body behind an effector name.
    pub fn add_effector<T>(&self, effector: &Effector<T>, body: Arc<dyn EffectorBody>) {
        self.effectors.write().insert(effector.name(), body);
    }

    /// Names of the effectors this entity supports, sorted.
    pub fn effector_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.effectors.read().keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Issues one effector call in this entity's own execution context.
    ///
    /// Returns immediately; fails synchronously only when the effector is unknown.
    pub fn invoke<T>(
        self: &Arc<Self>,
        effector: &Effector<T>,
        params: Parameters,
    ) -> Result<Task<T>, TaskError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let name = effector.name();
        let body = self
            .effectors
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| TaskError::EffectorNotFound {
                entity: self.to_string(),
                effector: name.to_string(),
            })?;

        let entity = Arc::clone(self);
        Ok(self.execution.submit(format!("{self}.{name}"), async move {
            let value = body.call(entity, params).await?;
            serde_json::from_value(value).map_err(|e| TaskError::Decode {
                effector: name.to_string(),
                error: e.to_string(),
            })
        }))
    }

    /// The start/stop capability, if the entity has one.
    pub fn startable(&self) -> Option<Arc<dyn Startable>> {
        self.startable.clone()
    }

    /// The internal-teardown capability, if the entity has one.
    pub fn teardown(&self) -> Option<Arc<dyn Teardown>> {
        self.teardown.clone()
    }

    // ---------------------------
    // Management bookkeeping
    // ---------------------------

    /// Id of the management context currently managing this entity.
    pub fn managed_by(&self) -> Option<u64> {
        match self.managed_by.load(Ordering::Acquire) {
            UNMANAGED => None,
            ctx => Some(ctx),
        }
    }

    /// Claims the entity for `ctx`; returns the current holder on conflict.
    pub(crate) fn claim_management(&self, ctx: u64) -> Result<(), u64> {
        match self
            .managed_by
            .compare_exchange(UNMANAGED, ctx, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(current) if current == ctx => Ok(()),
            Err(current) => Err(current),
        }
    }

    pub(crate) fn release_management(&self, ctx: u64) {
        let _ = self.managed_by.compare_exchange(
            ctx,
            UNMANAGED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Releases the subtree iteratively so dropping a deep tree cannot overflow the stack.
impl Drop for Entity {
    fn drop(&mut self) {
        let mut stack = std::mem::take(self.children.get_mut());
        while let Some(child) = stack.pop() {
            // Children still referenced elsewhere only lose one strong count.
            if let Some(mut child) = Arc::into_inner(child) {
                stack.append(child.children.get_mut());
            }
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}[id={},name={}]", self.kind, self.id, name),
            None => write!(f, "{}[id={}]", self.kind, self.id),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Fluent construction of an [`Entity`].
///
/// ## Example
/// ```rust
/// use entityvisor::{AttributeSensor, ConfigKey, Entity, ExecutionContext};
///
/// const PORT: ConfigKey<u16> = ConfigKey::new("http.port");
/// const UP: AttributeSensor<bool> = AttributeSensor::new("service.up");
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let web = Entity::builder("WebServer")
///     .named("frontend")
///     .config(&PORT, 8080)
///     .attribute(&UP, false)
///     .build(&ExecutionContext::current());
///
/// assert_eq!(web.config(&PORT), Some(8080));
/// assert_eq!(web.attribute(&UP), Some(false));
/// # }
/// ```
pub struct EntityBuilder {
    kind: Arc<str>,
    name: Option<Arc<str>>,
    locations: Vec<Location>,
    config: Vec<(KeyInfo, Option<ConfigValue>)>,
    sensors: Vec<(SensorInfo, Option<Value>)>,
    effectors: Vec<(&'static str, Arc<dyn EffectorBody>)>,
    startable: Option<Arc<dyn Startable>>,
    teardown: Option<Arc<dyn Teardown>>,
}

impl EntityBuilder {
    pub fn new(kind: impl Into<Arc<str>>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            locations: Vec::new(),
            config: Vec::new(),
            sensors: Vec::new(),
            effectors: Vec::new(),
            startable: None,
            teardown: None,
        }
    }

    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    /// Declares a config key without a value.
    pub fn declare<T>(mut self, key: &ConfigKey<T>) -> Self {
        self.config.push((key.info(), None));
        self
    }

    pub fn config<T>(mut self, key: &ConfigKey<T>, value: impl Into<Value>) -> Self {
        self.config
            .push((key.info(), Some(ConfigValue::Ready(value.into()))));
        self
    }

    pub fn deferred_config<T>(mut self, key: &ConfigKey<T>, task: Task<Value>) -> Self {
        self.config
            .push((key.info(), Some(ConfigValue::Deferred(task))));
        self
    }

    /// Declares an attribute sensor without a value.
    pub fn sensor<T>(mut self, sensor: &AttributeSensor<T>) -> Self {
        self.sensors.push((sensor.info(), None));
        self
    }

    pub fn notification(mut self, sensor: &NotificationSensor) -> Self {
        self.sensors.push((sensor.info(), None));
        self
    }

    pub fn attribute<T>(mut self, sensor: &AttributeSensor<T>, value: impl Into<Value>) -> Self {
        self.sensors.push((sensor.info(), Some(value.into())));
        self
    }

    pub fn effector<T>(mut self, effector: &Effector<T>, body: Arc<dyn EffectorBody>) -> Self {
        self.effectors.push((effector.name(), body));
        self
    }

    /// Adds the start/stop capability and binds [`START`] / [`STOP`] to it.
    pub fn startable(mut self, startable: impl Startable) -> Self {
        self.startable = Some(Arc::new(startable));
        self
    }

    pub fn teardown(mut self, teardown: impl Teardown) -> Self {
        self.teardown = Some(Arc::new(teardown));
        self
    }

    /// Teardown that only detaches the entity from its owner.
    pub fn destroyable(self) -> Self {
        self.teardown(DetachOnly)
    }

    /// Builds a root entity whose work runs in `execution`.
    pub fn build(self, execution: &ExecutionContext) -> Arc<Entity> {
        let entity = Arc::new(Entity {
            id: EntityId::next(),
            kind: self.kind,
            name: self.name,
            execution: execution.clone(),
            owner: RwLock::new(Weak::new()),
            children: RwLock::new(Vec::new()),
            locations: RwLock::new(self.locations),
            config_keys: RwLock::new(Vec::new()),
            config: RwLock::new(HashMap::new()),
            sensors: RwLock::new(Vec::new()),
            attributes: RwLock::new(HashMap::new()),
            effectors: RwLock::new(HashMap::new()),
            startable: self.startable,
            teardown: self.teardown,
            managed_by: AtomicU64::new(UNMANAGED),
        });

        for (info, value) in self.config {
            match value {
                Some(value) => entity.put_config(info, value),
                None => entity.declare_key(info),
            }
        }
        for (info, value) in self.sensors {
            match value {
                Some(value) => entity.put_attribute(info, value),
                None => entity.declare_sensor(info),
            }
        }
        if let Some(startable) = &entity.startable {
            entity.add_effector(&START, StartableEffector::start(Arc::clone(startable)));
            entity.add_effector(&STOP, StartableEffector::stop(Arc::clone(startable)));
        }
        for (name, body) in self.effectors {
            entity.effectors.write().insert(name, body);
        }
        entity
    }

    /// Builds the entity in `owner`'s execution context and attaches it below `owner`.
    pub fn build_child_of(self, owner: &Arc<Entity>) -> Result<Arc<Entity>, GraphError> {
        let child = self.build(owner.execution());
        owner.add_child(&child)?;
        Ok(child)
    }
}
