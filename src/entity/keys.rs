//! Typed config keys, sensors, locations and stored values.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tasks::Task;

/// Name and description of a config key, independent of its value type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyInfo {
    pub name: Arc<str>,
    pub description: Option<Arc<str>>,
}

/// A named, typed configuration slot.
///
/// ```rust
/// use entityvisor::ConfigKey;
///
/// const HTTP_PORT: ConfigKey<u16> = ConfigKey::new("http.port");
/// assert_eq!(HTTP_PORT.name(), "http.port");
/// ```
pub struct ConfigKey<T> {
    name: &'static str,
    description: Option<&'static str>,
    _type: PhantomData<fn() -> T>,
}

impl<T> ConfigKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            description: None,
            _type: PhantomData,
        }
    }

    pub const fn described(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description: Some(description),
            _type: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn info(&self) -> KeyInfo {
        KeyInfo {
            name: self.name.into(),
            description: self.description.map(Into::into),
        }
    }
}

impl<T> Clone for ConfigKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ConfigKey<T> {}

impl<T> fmt::Debug for ConfigKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigKey({})", self.name)
    }
}

/// Whether a sensor holds a current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Holds a live value on the entity.
    Attribute,
    /// Emits notifications only; no stored value.
    Notification,
}

/// Name, description and kind of a sensor, independent of its value type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SensorInfo {
    pub name: Arc<str>,
    pub description: Option<Arc<str>>,
    pub kind: SensorKind,
}

/// A named observable whose current value is stored on the entity.
pub struct AttributeSensor<T> {
    name: &'static str,
    description: Option<&'static str>,
    _type: PhantomData<fn() -> T>,
}

impl<T> AttributeSensor<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            description: None,
            _type: PhantomData,
        }
    }

    pub const fn described(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description: Some(description),
            _type: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn info(&self) -> SensorInfo {
        SensorInfo {
            name: self.name.into(),
            description: self.description.map(Into::into),
            kind: SensorKind::Attribute,
        }
    }
}

impl<T> Clone for AttributeSensor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttributeSensor<T> {}

impl<T> fmt::Debug for AttributeSensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeSensor({})", self.name)
    }
}

/// A named observable that only emits notifications.
#[derive(Debug, Clone, Copy)]
pub struct NotificationSensor {
    name: &'static str,
}

impl NotificationSensor {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn info(&self) -> SensorInfo {
        SensorInfo {
            name: self.name.into(),
            description: None,
            kind: SensorKind::Notification,
        }
    }
}

/// Where an entity is deployed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
}

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Value stored under a config key: resolved, or still being computed.
#[derive(Debug, Clone)]
pub enum ConfigValue {
    Ready(Value),
    Deferred(Task<Value>),
}

impl From<Value> for ConfigValue {
    fn from(v: Value) -> Self {
        ConfigValue::Ready(v)
    }
}

impl From<Task<Value>> for ConfigValue {
    fn from(t: Task<Value>) -> Self {
        ConfigValue::Deferred(t)
    }
}
