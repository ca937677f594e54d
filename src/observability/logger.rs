//! Leveled structured logger with pluggable hooks.
//!
//! The logger owns no transport. Each record is mirrored to the local
//! `tracing` subscriber and then handed to every hook that supports its level.
//! Hook failures are reported locally and never reach the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured fields attached to a record.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Severity of a log record, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl Level {
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
            Level::Panic => "panic",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive range of levels a hook accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRange {
    pub min: Level,
    pub max: Level,
}

impl LevelRange {
    pub const fn new(min: Level, max: Level) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, level: Level) -> bool {
        self.min <= level && level <= self.max
    }
}

/// A single log event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub fields: Fields,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>, fields: Fields) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            fields,
        }
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

/// Error returned by a hook that could not accept a record.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("hook queue is full, record dropped")]
    QueueFull,

    #[error("hook is closed")]
    Closed,

    #[error("failed to format record: {0}")]
    Format(#[from] serde_json::Error),
}

/// A destination for log records.
///
/// `emit` runs on the caller's task and must not block on I/O.
pub trait Hook: Send + Sync {
    /// Whether this hook wants records at `level`.
    fn supports(&self, level: Level) -> bool;

    /// Accept a record.
    fn emit(&self, record: &LogRecord) -> Result<(), HookError>;
}

/// Structured logger dispatching to a fixed set of hooks.
#[derive(Clone, Default)]
pub struct Logger {
    hooks: Vec<Arc<dyn Hook>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    /// Record an event and dispatch it to every interested hook.
    pub fn log(&self, level: Level, message: &str, fields: Fields) {
        let record = LogRecord::new(level, message, fields);
        mirror_to_tracing(&record);

        for hook in &self.hooks {
            if !hook.supports(level) {
                continue;
            }
            if let Err(e) = hook.emit(&record) {
                tracing::warn!(error = %e, level = %level, "Log hook rejected record");
            }
        }
    }

    pub fn info(&self, message: &str, fields: Fields) {
        self.log(Level::Info, message, fields);
    }

    pub fn warn(&self, message: &str, fields: Fields) {
        self.log(Level::Warn, message, fields);
    }

    pub fn error(&self, message: &str, fields: Fields) {
        self.log(Level::Error, message, fields);
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }
}

#[derive(Default)]
pub struct LoggerBuilder {
    hooks: Vec<Arc<dyn Hook>>,
}

impl LoggerBuilder {
    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Logger {
        Logger { hooks: self.hooks }
    }
}

fn mirror_to_tracing(record: &LogRecord) {
    // Fields are rendered as one JSON object; tracing needs static field names.
    let fields = serde_json::Value::Object(
        record
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    );
    match record.level {
        Level::Trace => tracing::trace!(fields = %fields, "{}", record.message),
        Level::Debug => tracing::debug!(fields = %fields, "{}", record.message),
        Level::Info => tracing::info!(fields = %fields, "{}", record.message),
        Level::Warn => tracing::warn!(fields = %fields, "{}", record.message),
        Level::Error | Level::Fatal | Level::Panic => {
            tracing::error!(severity = %record.level, fields = %fields, "{}", record.message)
        }
    }
}

/// Build a [`Fields`] map from `key => value` pairs.
///
/// ```
/// use loki_request_logger::fields;
/// let f = fields! { "status" => 200, "method" => "GET" };
/// assert_eq!(f.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => { $crate::observability::logger::Fields::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::observability::logger::Fields::new();
        $( map.insert(($key).to_string(), ::serde_json::json!($value)); )+
        map
    }};
}
