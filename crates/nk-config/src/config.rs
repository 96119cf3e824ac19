//! Dotted-path settings object with layered fallback.
//!
//! A [`Config`] owns one JSON object layer and optionally falls back to a
//! shared, reference-counted parent (`Arc<Config>`). Lookups check the own
//! layer first and then walk the fallback chain. Mutation only ever touches
//! the own layer: a parent behind an `Arc` is immutable, so a shared default
//! template cannot be changed through a child. [`Config::unref`] materializes
//! the merged view into a standalone config with no parent.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

use crate::config_merge::merge_json_values;
use crate::dotted;

#[derive(Debug, Clone)]
pub struct Config {
    data: Value,
    defaults: Option<Arc<Config>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

impl Config {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            data: Value::Object(data),
            defaults: None,
        }
    }

    /// Wrap a JSON document. Fails unless `value` is an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::new(map)),
            other => bail!("config must be a JSON object, got {}", json_kind(&other)),
        }
    }

    /// Parse a JSON document from text.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).context("Failed to parse config JSON")?;
        Self::from_value(value)
    }

    /// Attach a fallback consulted for keys absent from this layer.
    pub fn with_defaults(mut self, defaults: Arc<Config>) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn defaults(&self) -> Option<&Arc<Config>> {
        self.defaults.as_ref()
    }

    /// Look up a dotted key. The nearest layer that has the key wins for the
    /// whole value; use [`Config::get_config`] for merged sub-sections.
    pub fn get(&self, key: &str) -> Option<&Value> {
        dotted::lookup(&self.data, key)
            .or_else(|| self.defaults.as_ref().and_then(|d| d.get(key)))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set a dotted key on this layer, creating intermediate mappings.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        dotted::insert(&mut self.data, key, value.into())
    }

    /// Remove a dotted key from this layer. Fallback layers are untouched,
    /// so a default value may become visible again.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        dotted::remove(&mut self.data, key)
    }

    /// Section of this config rooted at `key`, keeping the fallback chain
    /// for that section.
    pub fn get_config(&self, key: &str) -> Config {
        let own = match dotted::lookup(&self.data, key) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        Config {
            data: Value::Object(own),
            defaults: self
                .defaults
                .as_ref()
                .map(|defaults| Arc::new(defaults.get_config(key))),
        }
    }

    /// Deep copy of the merged view, detached from every fallback layer.
    pub fn unref(&self) -> Config {
        Config {
            data: self.to_value(),
            defaults: None,
        }
    }

    /// Merged view of this layer over all fallback layers.
    pub fn to_value(&self) -> Value {
        match &self.defaults {
            Some(defaults) => merge_json_values(defaults.to_value(), self.data.clone()),
            None => self.data.clone(),
        }
    }

    /// This layer alone, without fallbacks.
    pub fn own_value(&self) -> &Value {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.as_object().is_none_or(Map::is_empty)
            && self.defaults.as_ref().is_none_or(|d| d.is_empty())
    }

    /// Pretty JSON of the merged view with a trailing newline.
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut out =
            serde_json::to_string_pretty(&self.to_value()).context("Failed to serialize config")?;
        out.push('\n');
        Ok(out)
    }
}

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        self.to_value() == other.to_value()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
