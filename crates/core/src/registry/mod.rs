//! Canonical parameter table of the active rig.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{EntityKind, Result, RigError};

/// Parameter metadata as enumerated by a rig. Every field is required; a rig
/// that cannot report bounds or a default is rejected at load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub id: String,
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParameterInfo {
    pub fn new(id: impl Into<String>, value: f32, min: f32, max: f32, default: f32) -> Self {
        Self {
            id: id.into(),
            value,
            min,
            max,
            default,
        }
    }
}

/// One named scalar control surface. `value` always lies in `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    id: String,
    value: f32,
    min: f32,
    max: f32,
    default: f32,
}

impl Parameter {
    fn from_info(info: ParameterInfo) -> Result<Self> {
        let ParameterInfo {
            id,
            value,
            min,
            max,
            default,
        } = info;

        if id.is_empty() {
            return Err(RigError::InvalidMetadata(
                "parameter with an empty id".to_string(),
            ));
        }
        if ![value, min, max, default].iter().all(|v| v.is_finite()) {
            return Err(RigError::InvalidMetadata(format!(
                "parameter `{id}` has non-finite metadata"
            )));
        }
        if min > max {
            return Err(RigError::InvalidMetadata(format!(
                "parameter `{id}` has min {min} above max {max}"
            )));
        }

        Ok(Self {
            value: value.clamp(min, max),
            default: default.clamp(min, max),
            id,
            min,
            max,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn default_value(&self) -> f32 {
        self.default
    }

    pub fn range(&self) -> f32 {
        self.max - self.min
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Concrete value routed to a rig parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub target: String,
    pub value: f32,
}

impl ParameterUpdate {
    pub fn new(target: impl Into<String>, value: f32) -> Self {
        Self {
            target: target.into(),
            value,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ParameterRegistry {
    params: HashMap<String, Parameter>,
    order: Vec<String>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from rig metadata, preserving enumeration order.
    pub fn load(metadata: impl IntoIterator<Item = ParameterInfo>) -> Result<Self> {
        let mut registry = Self::new();
        for info in metadata {
            let param = Parameter::from_info(info)?;
            if registry.params.contains_key(param.id()) {
                return Err(RigError::InvalidMetadata(format!(
                    "duplicate parameter id `{}`",
                    param.id()
                )));
            }
            registry.order.push(param.id.clone());
            registry.params.insert(param.id.clone(), param);
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Result<&Parameter> {
        self.params
            .get(id)
            .ok_or_else(|| RigError::not_found(EntityKind::Parameter, id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.params.contains_key(id)
    }

    pub fn list(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.order.iter().filter_map(|id| self.params.get(id))
    }

    /// Current value of every parameter in enumeration order.
    pub fn snapshot(&self) -> Vec<ParameterUpdate> {
        self.iter()
            .map(|param| ParameterUpdate::new(param.id(), param.value()))
            .collect()
    }

    /// Stores a resolved value, clamped into the parameter's bounds.
    pub(crate) fn write(&mut self, id: &str, value: f32) -> Result<f32> {
        let param = self
            .params
            .get_mut(id)
            .ok_or_else(|| RigError::not_found(EntityKind::Parameter, id))?;
        param.value = param.clamp(value);
        Ok(param.value)
    }
}
