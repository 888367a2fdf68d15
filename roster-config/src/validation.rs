// Settings validation

use crate::{ConfigError, Result};
use std::fmt::Display;

/// Implemented by settings types loaded through
/// [`ConfigManager::load_validated`](crate::ConfigManager::load_validated).
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Collects every failed rule so one error reports all of them.
///
/// ```
/// use roster_config::ConfigValidator;
///
/// let err = ConfigValidator::new()
///     .not_empty("", "database.path")
///     .port(0, "server.port")
///     .finish()
///     .unwrap_err();
/// assert_eq!(
///     err.to_string(),
///     "Validation error: database.path cannot be empty; server.port must be a valid port number"
/// );
/// ```
#[derive(Debug, Default)]
pub struct ConfigValidator {
    failures: Vec<String>,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(mut self, ok: bool, failure: impl FnOnce() -> String) -> Self {
        if !ok {
            self.failures.push(failure());
        }
        self
    }

    /// Fails on empty or whitespace-only values.
    pub fn not_empty(self, value: &str, field: &str) -> Self {
        self.check(!value.trim().is_empty(), || format!("{} cannot be empty", field))
    }

    /// Inclusive bounds.
    pub fn in_range<T: PartialOrd + Display>(self, value: T, min: T, max: T, field: &str) -> Self {
        let ok = value >= min && value <= max;
        self.check(ok, || {
            format!("{} must be between {} and {} (got {})", field, min, max, value)
        })
    }

    pub fn one_of<T: PartialEq + Display>(self, value: &T, allowed: &[T], field: &str) -> Self {
        self.check(allowed.contains(value), || {
            let names: Vec<String> = allowed.iter().map(ToString::to_string).collect();
            format!("{} must be one of {} (got {})", field, names.join(", "), value)
        })
    }

    pub fn port(self, value: u16, field: &str) -> Self {
        self.check(value != 0, || format!("{} must be a valid port number", field))
    }

    /// An absolute URL path such as `/login`.
    pub fn url_path(self, value: &str, field: &str) -> Self {
        self.check(value.starts_with('/'), || format!("{} must start with '/' (got '{}')", field, value))
    }

    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn finish(self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError(self.failures.join("; ")))
        }
    }
}
