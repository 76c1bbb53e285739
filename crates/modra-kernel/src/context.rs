//! Execution and selection contexts
//!
//! An [`ExecutionContext`] is the open key/value map a chain mutates step by
//! step. A [`SelectionContext`] is the typed query the registry filters
//! against; it is built from an execution context at the request boundary,
//! where missing or unknown vocabulary values are rejected.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ContextError, ContextResult};
use crate::types::{AgentKind, OrchestrationMode, UserRole};

/// Default effectiveness floor applied when a query does not set one.
pub const DEFAULT_MIN_EFFECTIVENESS: f64 = 0.6;
/// Default error-rate ceiling applied when a query does not set one.
pub const DEFAULT_MAX_ERROR_RATE: f64 = 0.1;

/// Open key/value state passed through a chain.
///
/// Keys are ordered so that serialized contexts and iteration are
/// deterministic. Values are arbitrary JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    values: BTreeMap<String, Value>,
}

impl ExecutionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value under a key. Values that fail to serialize are dropped.
    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(value) = serde_json::to_value(value) {
            self.values.insert(key.into(), value);
        }
    }

    /// Builder-style `set` for constructing contexts inline.
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.set(key, value);
        self
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    /// Get a numeric value as f64 (integers coerce).
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(|v| v.as_f64())
    }

    /// Get an unsigned integer value.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.values.get(key).and_then(|v| v.as_u64())
    }

    /// Get a boolean value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(|v| v.as_bool())
    }

    /// Check whether a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Merge another context into this one. Keys from `other` win.
    pub fn merge(&mut self, other: &ExecutionContext) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Project this context through a key mapping (target key -> source key).
    ///
    /// An empty mapping is the identity: the full context is copied through.
    /// A non-empty mapping copies only the mapped keys that exist here.
    pub fn project(&self, mapping: &HashMap<String, String>) -> ExecutionContext {
        if mapping.is_empty() {
            return self.clone();
        }

        let mut projected = ExecutionContext::new();
        for (target, source) in mapping {
            if let Some(value) = self.values.get(source) {
                projected.values.insert(target.clone(), value.clone());
            }
        }
        projected
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Typed module-selection query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionContext {
    /// Agent class the modules must serve.
    pub agent_kind: AgentKind,
    /// Orchestration mode the modules must support.
    pub mode: OrchestrationMode,
    /// Caller role the modules must support.
    pub role: UserRole,
    /// Capability tags every selected module must offer.
    pub required_features: Vec<String>,
    /// Minimum effectiveness score.
    pub min_effectiveness: f64,
    /// Maximum tolerated error rate.
    pub max_error_rate: f64,
}

impl SelectionContext {
    /// Create a query with default thresholds and no required features.
    pub fn new(agent_kind: AgentKind, mode: OrchestrationMode, role: UserRole) -> Self {
        Self {
            agent_kind,
            mode,
            role,
            required_features: Vec::new(),
            min_effectiveness: DEFAULT_MIN_EFFECTIVENESS,
            max_error_rate: DEFAULT_MAX_ERROR_RATE,
        }
    }

    /// Require a capability tag.
    pub fn with_feature(mut self, feature: &str) -> Self {
        self.required_features.push(feature.to_string());
        self
    }

    /// Require a set of capability tags.
    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.required_features = features;
        self
    }

    /// Override the effectiveness floor.
    pub fn with_min_effectiveness(mut self, min: f64) -> Self {
        self.min_effectiveness = min;
        self
    }

    /// Override the error-rate ceiling.
    pub fn with_max_error_rate(mut self, max: f64) -> Self {
        self.max_error_rate = max;
        self
    }
}

fn typed_field<T: DeserializeOwned>(
    context: &ExecutionContext,
    field: &'static str,
) -> ContextResult<T> {
    let value = context
        .get(field)
        .ok_or(ContextError::MissingField(field))?;
    serde_json::from_value(value.clone()).map_err(|_| ContextError::UnknownValue {
        field,
        value: value.to_string(),
    })
}

impl TryFrom<&ExecutionContext> for SelectionContext {
    type Error = ContextError;

    /// Build a selection query from context keys.
    ///
    /// `agent_type`, `orchestration_mode`, and `user_role` must be present
    /// and hold known vocabulary values. `features` defaults to empty and the
    /// thresholds to their documented defaults.
    fn try_from(context: &ExecutionContext) -> ContextResult<Self> {
        let agent_kind = typed_field(context, "agent_type")?;
        let mode = typed_field(context, "orchestration_mode")?;
        let role = typed_field(context, "user_role")?;

        let required_features = match context.get("features") {
            Some(_) => typed_field(context, "features")?,
            None => Vec::new(),
        };

        Ok(Self {
            agent_kind,
            mode,
            role,
            required_features,
            min_effectiveness: context
                .get_f64("min_effectiveness")
                .unwrap_or(DEFAULT_MIN_EFFECTIVENESS),
            max_error_rate: context
                .get_f64("max_error_rate")
                .unwrap_or(DEFAULT_MAX_ERROR_RATE),
        })
    }
}
