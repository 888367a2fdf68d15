//! Configuration for SQLite connections.

use crate::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Path understood by SQLite as a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    /// File path, `:memory:`, or a `file:` URI.
    pub path: String,

    /// How long a statement waits on a locked database, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Enforce foreign key constraints.
    #[serde(default = "default_foreign_keys")]
    pub foreign_keys: bool,

    /// Create the database file if it does not exist.
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_foreign_keys() -> bool {
    true
}

fn default_create_if_missing() -> bool {
    true
}

impl DbConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
            foreign_keys: default_foreign_keys(),
            create_if_missing: default_create_if_missing(),
        }
    }

    /// Private in-memory database.
    pub fn in_memory() -> Self {
        Self::new(MEMORY_PATH)
    }

    /// Create configuration from environment variables.
    ///
    /// - `DATABASE_PATH`: required database path
    /// - `DATABASE_BUSY_TIMEOUT_MS`: busy timeout (default: 5000)
    pub fn from_env() -> DbResult<Self> {
        let path = std::env::var("DATABASE_PATH")
            .map_err(|_| DbError::Config("DATABASE_PATH not set".into()))?;
        let mut config = Self::new(path);

        if let Ok(timeout) = std::env::var("DATABASE_BUSY_TIMEOUT_MS") {
            config.busy_timeout_ms = timeout
                .parse()
                .map_err(|_| DbError::Config("Invalid DATABASE_BUSY_TIMEOUT_MS".into()))?;
        }

        Ok(config)
    }

    pub fn busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn is_memory(&self) -> bool {
        self.path == MEMORY_PATH
    }

    /// Reject settings that cannot open a connection.
    pub fn validate(&self) -> DbResult<()> {
        if self.path.trim().is_empty() {
            return Err(DbError::Config("database path must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::new("roster.sqlite")
    }
}
