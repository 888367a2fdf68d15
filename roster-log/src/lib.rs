//! Roster Logging
//!
//! Structured logging for the Roster backend, controlled through `ROSTER_*`
//! environment variables.
//!
//! # Usage
//!
//! ```rust
//! use roster_log::{debug, info, warn, error, trace};
//!
//! debug!("Processing request");
//! info!("Server started on port {}", 8080);
//! warn!("Session store nearly full");
//! error!("Failed to open database");
//!
//! let path = "/api/influencers";
//! debug!(target: "roster::router", "Matching route: {}", path);
//! ```
//!
//! Controllers receive a [`Logger`] handle instead of calling the macros
//! directly, so the target they log under is decided by whoever builds them.
//!
//! # Environment Variables
//!
//! - `ROSTER_DEBUG=1` - Enable debug logging
//! - `ROSTER_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `ROSTER_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `ROSTER_LOG_COLOR=1|0` - Enable/disable colors
//! - `ROSTER_LOG_TIMESTAMPS=1|0` - Include timestamps
//! - `ROSTER_LOG_MODULE=1|0` - Include the log target
use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::env;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

// ============================================================================
// Levels and formats
// ============================================================================

/// Severity of a log line, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    /// Disables output entirely
    Off = 5,
}

const LEVELS: [Level; 6] = [
    Level::Trace,
    Level::Debug,
    Level::Info,
    Level::Warn,
    Level::Error,
    Level::Off,
];

impl Level {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "warning" => Some(Level::Warn),
            "none" => Some(Level::Off),
            _ => LEVELS
                .iter()
                .copied()
                .find(|level| level.as_str().eq_ignore_ascii_case(s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }

    fn from_u8(value: u8) -> Self {
        LEVELS
            .get(usize::from(value))
            .copied()
            .unwrap_or(Level::Off)
    }

    fn filter(&self) -> log::LevelFilter {
        match self {
            Level::Trace => log::LevelFilter::Trace,
            Level::Debug => log::LevelFilter::Debug,
            Level::Info => log::LevelFilter::Info,
            Level::Warn => log::LevelFilter::Warn,
            Level::Error => log::LevelFilter::Error,
            Level::Off => log::LevelFilter::Off,
        }
    }

    #[cfg(feature = "color")]
    fn paint(&self) -> String {
        use colored::Colorize;
        let label = format!("{:5}", self.as_str());
        match self {
            Level::Trace => label.magenta().to_string(),
            Level::Debug => label.blue().to_string(),
            Level::Info => label.green().to_string(),
            Level::Warn => label.yellow().to_string(),
            Level::Error => label.red().bold().to_string(),
            Level::Off => label,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Level::Trace,
            log::Level::Debug => Level::Debug,
            log::Level::Info => Level::Info,
            log::Level::Warn => Level::Warn,
            log::Level::Error => Level::Error,
        }
    }
}

/// Line layout written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Timestamp, padded level, `[target]`, message
    Pretty,
    /// Time of day, level initial, `target:`, message
    Compact,
    /// One JSON object per line
    Json,
}

impl Format {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

/// Output settings, read once from `ROSTER_LOG_*`.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub debug: bool,
    pub level: Level,
    pub format: Format,
    pub color: bool,
    pub timestamps: bool,
    /// Print the target next to the message
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false,
            timestamps: true,
            module_path: true,
        }
    }
}

impl LogConfig {
    /// Read the environment and publish the level to the global filter.
    pub fn from_env() -> Self {
        let config = Self::from_lookup(|name| env::var(name).ok());
        DEBUG_ENABLED.store(config.debug, Ordering::SeqCst);
        LOG_LEVEL.store(config.level as u8, Ordering::SeqCst);
        config
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |name: &str| {
            lookup(name).map(|v| v.trim() == "1" || v.trim().eq_ignore_ascii_case("true"))
        };
        let defaults = Self::default();

        let debug = flag("ROSTER_DEBUG").unwrap_or(false);
        let level = lookup("ROSTER_LOG_LEVEL")
            .and_then(|s| Level::from_str(&s))
            .unwrap_or(if debug { Level::Debug } else { defaults.level });
        let format = lookup("ROSTER_LOG_FORMAT")
            .and_then(|s| Format::from_str(&s))
            .unwrap_or(defaults.format);
        let color = flag("ROSTER_LOG_COLOR")
            .unwrap_or_else(|| lookup("NO_COLOR").is_none() && lookup("TERM").is_some());

        Self {
            debug,
            level,
            format,
            color,
            timestamps: flag("ROSTER_LOG_TIMESTAMPS").unwrap_or(defaults.timestamps),
            module_path: flag("ROSTER_LOG_MODULE").unwrap_or(defaults.module_path),
        }
    }
}

/// Read the environment now instead of on the first log line.
pub fn init() {
    Lazy::force(&CONFIG);
}

/// Forward records from the `log` crate (used by dependencies) to the
/// same sink. Returns `false` if a logger was already installed.
pub fn install_log_bridge() -> bool {
    init();
    if log::set_logger(&BRIDGE).is_err() {
        return false;
    }
    log::set_max_level(current_level().filter());
    true
}

#[inline]
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    level != Level::Off && level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

/// Level filter including the `ROSTER_DEBUG` override.
#[doc(hidden)]
#[inline]
pub fn enabled(level: Level) -> bool {
    is_level_enabled(level) || (level == Level::Debug && is_debug_enabled())
}

pub fn current_level() -> Level {
    Level::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

pub fn set_level(level: Level) {
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Turning debug on also lowers the level to `Debug`.
pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    if enabled && current_level() > Level::Debug {
        set_level(Level::Debug);
    }
}

pub fn config() -> &'static LogConfig {
    &CONFIG
}

// ============================================================================
// Logger handle
// ============================================================================

/// A logging handle bound to a target.
///
/// Controllers get one from whoever builds them, typically via
/// [`Logger::child`].
#[derive(Debug, Clone)]
pub struct Logger {
    target: Cow<'static, str>,
}

impl Logger {
    pub fn new(target: impl Into<Cow<'static, str>>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// `parent::name`
    pub fn child(&self, name: &str) -> Self {
        Self::new(format!("{}::{}", self.target, name))
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn log(&self, level: Level, message: &str) {
        if enabled(level) {
            log(level, &self.target, message);
        }
    }

    pub fn trace(&self, message: &str) {
        self.log(Level::Trace, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new("roster")
    }
}

// ============================================================================
// Output
// ============================================================================

/// Write one line to stderr. Callers filter by level first.
#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str) {
    let line = render(level, target, message, config());
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", line);
}

/// Format one line without the trailing newline.
pub fn render(level: Level, target: &str, message: &str, config: &LogConfig) -> String {
    let show_target = config.module_path && !target.is_empty();
    match config.format {
        Format::Json => render_json(level, target, message),
        Format::Pretty => {
            let mut line = String::new();
            if config.timestamps {
                line.push_str(&chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f ").to_string());
            }
            line.push_str(&level_label(level, config.color));
            line.push(' ');
            if show_target {
                line.push_str(&format!("[{}] ", target));
            }
            line.push_str(message);
            line
        }
        Format::Compact => {
            let mut line = String::new();
            if config.timestamps {
                line.push_str(&chrono::Local::now().format("%H:%M:%S ").to_string());
            }
            line.push_str(&level.as_str()[..1]);
            line.push(' ');
            if show_target {
                line.push_str(&format!("{}: ", target));
            }
            line.push_str(message);
            line
        }
    }
}

#[cfg(feature = "color")]
fn level_label(level: Level, color: bool) -> String {
    if color {
        level.paint()
    } else {
        format!("{:5}", level.as_str())
    }
}

#[cfg(not(feature = "color"))]
fn level_label(level: Level, _color: bool) -> String {
    format!("{:5}", level.as_str())
}

#[cfg(feature = "json")]
fn render_json(level: Level, target: &str, message: &str) -> String {
    serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "level": level.as_str(),
        "target": target,
        "message": message,
    })
    .to_string()
}

#[cfg(not(feature = "json"))]
fn render_json(level: Level, target: &str, message: &str) -> String {
    format!(
        "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"target\":{:?},\"message\":{:?}}}",
        chrono::Utc::now().to_rfc3339(),
        level.as_str(),
        target,
        message
    )
}

struct Bridge;

static BRIDGE: Bridge = Bridge;

impl log::Log for Bridge {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        enabled(metadata.level().into())
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            log(
                record.level().into(),
                record.target(),
                &record.args().to_string(),
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

// ============================================================================
// Macros
// ============================================================================

#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:expr, target: $target:expr, $($arg:tt)+) => {
        if $crate::enabled($level) {
            $crate::log($level, $target, &format!($($arg)+));
        }
    };
    ($level:expr, $($arg:tt)+) => {
        $crate::__log!($level, target: module_path!(), $($arg)+)
    };
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Trace, $($arg)+) };
}

/// Log a debug message.
///
/// Enabled by `ROSTER_DEBUG=1` or `ROSTER_LOG_LEVEL=debug`.
///
/// ```rust
/// use roster_log::debug;
///
/// let table = "influencers";
/// debug!(target: "roster::db", "Selecting from {}", table);
/// ```
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Debug, $($arg)+) };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Info, $($arg)+) };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Warn, $($arg)+) };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Error, $($arg)+) };
}
