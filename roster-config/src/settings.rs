//! Typed application settings.

use crate::validation::{ConfigValidator, Validate};
use crate::{ConfigManager, Result};
use roster_log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of the environment variables read into [`Settings`].
pub const ENV_PREFIX: &str = "ROSTER";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_VAR: &str = "ROSTER_CONFIG";

/// Configuration file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "roster.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
    pub max_header_bytes: usize,
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_body_bytes: 8 * 1024 * 1024,
            max_header_bytes: 16 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file path, or `:memory:`.
    pub path: String,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "roster.sqlite".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub cookie_name: String,
    pub login_path: String,
    /// Paths reachable without a session; a trailing `/*` matches a prefix.
    pub public_paths: Vec<String>,
    /// Requests under this prefix are answered with JSON instead of redirects.
    pub api_prefix: String,
    pub ttl_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "roster_session".to_string(),
            login_path: "/login".to_string(),
            public_paths: vec!["/health".to_string()],
            api_prefix: "/api".to_string(),
            ttl_secs: 2 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsSettings {
    pub enabled: bool,
    pub allow_origin: String,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_origin: "*".to_string(),
        }
    }
}

/// Everything the server binary needs at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub session: SessionSettings,
    pub cors: CorsSettings,
}

impl Settings {
    /// Load from defaults, `roster.toml` (or `$ROSTER_CONFIG`), `.env` and
    /// `ROSTER_*` environment variables, in that order.
    pub fn load() -> Result<Self> {
        let file = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                default.exists().then(|| default.to_path_buf())
            }
        };

        let manager = Self::seeded_manager()?;
        if let Some(path) = &file {
            manager.load_file_auto(path)?;
        }
        manager.load_dotenv(None)?;
        manager.load_env()?;

        let settings: Settings = manager.load_validated()?;
        info!(
            target: "roster::config",
            "Configuration loaded (file: {})",
            file.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        Ok(settings)
    }

    /// Load from an optional file plus explicit environment pairs, skipping
    /// the process environment.
    pub fn from_sources<I>(file: Option<&Path>, env: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let manager = Self::seeded_manager()?;
        if let Some(path) = file {
            manager.load_file_auto(path)?;
        }
        manager.load_env_from(env);
        manager.load_validated()
    }

    fn seeded_manager() -> Result<ConfigManager> {
        let manager = ConfigManager::with_prefix(ENV_PREFIX);
        manager.load_defaults(&Settings::default())?;
        Ok(manager)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        let server = &self.server;
        let session = &self.session;
        let validator = ConfigValidator::new()
            .not_empty(&server.host, "server.host")
            .port(server.port, "server.port")
            .in_range(server.max_header_bytes, 1024, 1024 * 1024, "server.max_header_bytes")
            .in_range(server.max_body_bytes, 1, usize::MAX, "server.max_body_bytes")
            .not_empty(&self.database.path, "database.path")
            .not_empty(&session.cookie_name, "session.cookie_name")
            .url_path(&session.login_path, "session.login_path")
            .url_path(&session.api_prefix, "session.api_prefix");
        session
            .public_paths
            .iter()
            .fold(validator, |v, path| v.url_path(path, "session.public_paths"))
            .finish()
    }
}
