//! Configuration management for Roster
//!
//! Values are held as one JSON tree and layered in order: typed defaults,
//! an optional JSON/TOML file, a `.env` file, then process environment
//! variables. Environment keys nest with a double underscore, so
//! `ROSTER_SERVER__PORT=9000` overrides `server.port`.
//!
//! ```rust,no_run
//! use roster_config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("listening on {}", settings.server.bind_addr());
//! # Ok::<(), roster_config::ConfigError>(())
//! ```

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{
    CONFIG_PATH_VAR, CorsSettings, DEFAULT_CONFIG_FILE, DatabaseSettings, ENV_PREFIX,
    ServerSettings, SessionSettings, Settings,
};
pub use validation::{ConfigValidator, Validate};

use parking_lot::RwLock;
use roster_log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Main configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    root: Arc<RwLock<Value>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            root: Arc::new(RwLock::new(Value::Object(Map::new()))),
            env_prefix: None,
        }
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: Some(prefix.into()),
            ..Self::new()
        }
    }

    /// Seed the tree from a serializable value, usually the typed defaults.
    ///
    /// The defaults also decide how environment strings are typed later on.
    pub fn load_defaults<T: Serialize>(&self, defaults: &T) -> Result<()> {
        let value = serde_json::to_value(defaults)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        self.merge_value(value);
        Ok(())
    }

    /// Load configuration from the process environment
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let vars = loader.filter_ordered(std::env::vars());
        self.apply_env(vars);
        Ok(())
    }

    /// Load configuration from explicit `KEY=value` pairs, filtered by the
    /// prefix like real environment variables.
    pub fn load_env_from<I>(&self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let loader = EnvLoader::new(self.env_prefix.clone());
        self.apply_env(loader.filter_ordered(vars));
    }

    fn apply_env(&self, vars: Vec<(String, String)>) {
        let mut root = self.root.write();
        for (key, raw) in vars {
            let path = env::key_path(&key);
            if path.is_empty() {
                continue;
            }
            let value = env::coerce(root.pointer(&env::pointer(&path)), &raw);
            debug!(target: "roster::config", "Override {} from environment", path.join("."));
            merge_values(&mut root, env::nest(&path, value));
        }
    }

    /// Load a `.env` file without touching the process environment.
    ///
    /// With no path, a missing `.env` in the working directory is not an error.
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<()> {
        let iter = match path {
            Some(path) => dotenvy::from_path_iter(path)?,
            None => match dotenvy::dotenv_iter() {
                Ok(iter) => iter,
                Err(err) if err.not_found() => return Ok(()),
                Err(err) => return Err(err.into()),
            },
        };
        let pairs = iter.collect::<std::result::Result<Vec<_>, _>>()?;
        self.load_env_from(pairs);
        Ok(())
    }

    /// Load configuration from file
    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let path = path.as_ref();
        let data = ConfigLoader::new(format).load_file(path)?;
        debug!(target: "roster::config", "Loaded configuration file {}", path.display());
        self.merge_value(data);
        Ok(())
    }

    /// Load configuration from file, detecting the format from its name
    pub fn load_file_auto(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = ConfigLoader::auto(path)?.format();
        self.load_file(path, format)
    }

    /// Set a configuration value. Dotted keys address nested tables.
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        let path = dotted(key);
        if path.is_empty() {
            return Err(ConfigError::KeyNotFound(key.to_string()));
        }
        self.merge_value(env::nest(&path, json_value));
        Ok(())
    }

    /// Get a configuration value. Dotted keys address nested tables.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let root = self.root.read();

        let value = root
            .pointer(&env::pointer(&dotted(key)))
            .filter(|_| !key.is_empty())
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::DeserializationError(format!("{}: {}", key, e)))
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Get a string value
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    /// Get an integer value
    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    /// Get a boolean value
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    /// Get a float value
    pub fn get_float(&self, key: &str) -> Result<f64> {
        self.get(key)
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        !key.is_empty() && self.root.read().pointer(&env::pointer(&dotted(key))).is_some()
    }

    /// Top-level configuration keys
    pub fn keys(&self) -> Vec<String> {
        match &*self.root.read() {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Merge configuration from another manager; its values win.
    pub fn merge(&self, other: &ConfigManager) -> Result<()> {
        let snapshot = other.snapshot();
        self.merge_value(snapshot);
        Ok(())
    }

    /// Copy of the whole configuration tree
    pub fn snapshot(&self) -> Value {
        self.root.read().clone()
    }

    fn merge_value(&self, overlay: Value) {
        let mut root = self.root.write();
        merge_values(&mut root, overlay);
    }

    /// Load and validate configuration
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let validated: T = serde_json::from_value(self.snapshot())
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        validated.validate()?;

        Ok(validated)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-merge `overlay` into `base`: objects merge key by key, anything else
/// replaces the old value.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn dotted(key: &str) -> Vec<&str> {
    key.split('.').filter(|segment| !segment.is_empty()).collect()
}
