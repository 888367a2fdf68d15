// Environment variable loading

use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::env;

/// Separator turning `SERVER__PORT` into the nested key `server.port`.
pub const NESTING_SEPARATOR: &str = "__";

/// Environment variable loader
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load all environment variables of the process
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.filter(env::vars()))
    }

    /// Keep the pairs matching the prefix, with the prefix stripped and the
    /// key lowercased. Without a prefix every pair is kept.
    pub fn filter<I>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(key, value)| self.strip(&key).map(|k| (k, value)))
            .collect()
    }

    /// Same as [`filter`](Self::filter), keeping the input order.
    pub fn filter_ordered<I>(&self, vars: I) -> Vec<(String, String)>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(key, value)| self.strip(&key).map(|k| (k, value)))
            .collect()
    }

    fn strip(&self, key: &str) -> Option<String> {
        match &self.prefix {
            Some(prefix) => key
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('_'))
                .filter(|rest| !rest.is_empty())
                .map(str::to_lowercase),
            None => Some(key.to_lowercase()),
        }
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = if let Some(ref prefix) = self.prefix {
            format!("{}_{}", prefix, key.to_uppercase())
        } else {
            key.to_uppercase()
        };

        env::var(&full_key).map_err(ConfigError::EnvError)
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Split a stripped env key into its nested path.
pub fn key_path(key: &str) -> Vec<&str> {
    key.split(NESTING_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Convert a raw env string into the JSON type of the value it replaces.
///
/// Numbers and booleans follow an existing number or boolean, comma
/// separated lists follow an existing array. Everything else stays a string.
pub fn coerce(existing: Option<&Value>, raw: &str) -> Value {
    let raw = raw.trim();
    match existing {
        Some(Value::Bool(_)) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Value::Bool(true),
            "false" | "0" | "no" | "off" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        Some(Value::Number(_)) => {
            if let Ok(i) = raw.parse::<i64>() {
                Value::from(i)
            } else if let Ok(u) = raw.parse::<u64>() {
                Value::from(u)
            } else if let Ok(f) = raw.parse::<f64>() {
                Value::from(f)
            } else {
                Value::String(raw.to_string())
            }
        }
        Some(Value::Array(_)) => Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        ),
        _ => Value::String(raw.to_string()),
    }
}

/// Build `{"a": {"b": leaf}}` for the path `["a", "b"]`.
pub(crate) fn nest(path: &[&str], leaf: Value) -> Value {
    path.iter().rev().fold(leaf, |inner, segment| {
        let mut map = Map::new();
        map.insert((*segment).to_string(), inner);
        Value::Object(map)
    })
}

/// JSON pointer for a key path.
pub(crate) fn pointer(path: &[&str]) -> String {
    path.iter()
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect()
}
