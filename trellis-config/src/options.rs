// Path-addressable option tree with namespaced merge

use crate::error::{ConfigError, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// An immutable-by-convention option tree.
///
/// Lookup is dotted-path addressable (`"session.auto_start"`); merge is
/// namespaced and recursive: maps merge key-wise with the newer side
/// winning on scalar conflicts, while lists union (a value already present
/// is not appended again).
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    root: Value,
}

impl Options {
    /// An empty option tree.
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Build from a JSON value; the top level must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(ConfigError::InvalidOptions(type_label(&value).to_string()));
        }
        Ok(Self { root: value })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Load options from a file, dispatching on the extension
    /// (`.json` or `.toml`).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| ConfigError::MissingExtension(path.display().to_string()))?;

        let contents = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), format = extension.as_str(), "loading options file");

        match extension.as_str() {
            "json" => Self::from_json_str(&contents),
            "toml" => {
                let value: Value =
                    toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
                Self::from_value(value)
            }
            other => Err(ConfigError::UnknownExtension(other.to_string())),
        }
    }

    /// Look up a value by dotted path. A missing segment is an error;
    /// use [`Options::get_or`] when a default applies.
    pub fn get(&self, path: &str) -> Result<Value> {
        let mut current = &self.root;
        for segment in path.split('.') {
            current = current
                .as_object()
                .and_then(|map| map.get(segment))
                .ok_or_else(|| ConfigError::UnknownPath(path.to_string()))?;
        }
        Ok(current.clone())
    }

    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).unwrap_or(default)
    }

    /// Look up and deserialize into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.get(path)?;
        serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn has(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    /// Merge another option tree into this one.
    pub fn merge(&mut self, other: Options) {
        merge_value(&mut self.root, other.root);
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_value(old: &mut Value, new: Value) {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, value) in new_map {
                match old_map.get_mut(&key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        old_map.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            for item in new_items {
                if !old_items.contains(&item) {
                    old_items.push(item);
                }
            }
        }
        (old, new) => *old = new,
    }
}

fn type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
