//! Configuration loading from the process environment.
//!
//! Absence is never an error: every unset or empty variable falls back to its
//! default. Numeric tuning knobs that fail to parse also fall back, with a
//! warning.

use std::str::FromStr;

use crate::config::schema::ServiceConfig;

pub const SERVER: &str = "SERVER";
pub const PORT: &str = "PORT";
pub const SERVER_LOKI: &str = "SERVER_LOKI";
pub const PORT_LOKI: &str = "PORT_LOKI";
pub const JOB: &str = "JOB";
pub const USERNAME: &str = "USERNAME";
pub const PASSWORD: &str = "PASSWORD";
pub const LOKI_TIMEOUT_SECS: &str = "LOKI_TIMEOUT_SECS";
pub const LOKI_QUEUE_CAPACITY: &str = "LOKI_QUEUE_CAPACITY";
pub const LOKI_BATCH_SIZE: &str = "LOKI_BATCH_SIZE";
pub const REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
pub const METRICS_ENABLED: &str = "METRICS_ENABLED";
pub const METRICS_ADDRESS: &str = "METRICS_ADDRESS";

/// Return the environment value for `name` if it is set and non-empty,
/// otherwise `default`.
pub fn resolve(name: &str, default: &str) -> String {
    resolve_with(&|key: &str| std::env::var(key).ok(), name, default)
}

fn resolve_with<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn resolve_parsed<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(name) {
        Some(raw) if !raw.is_empty() => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(
                    variable = name,
                    value = %raw,
                    default = %default,
                    "Unparseable setting, using default"
                );
                default
            }
        },
        _ => default,
    }
}

impl ServiceConfig {
    /// Resolve every setting from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve every setting through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServiceConfig::default();

        let listener = &mut config.listener;
        listener.host = resolve_with(&lookup, SERVER, &listener.host);
        listener.port = resolve_with(&lookup, PORT, &listener.port);

        let sink = &mut config.sink;
        sink.host = resolve_with(&lookup, SERVER_LOKI, &sink.host);
        sink.port = resolve_with(&lookup, PORT_LOKI, &sink.port);
        sink.job = resolve_with(&lookup, JOB, &sink.job);
        sink.username = resolve_with(&lookup, USERNAME, &sink.username);
        sink.password = resolve_with(&lookup, PASSWORD, &sink.password);
        sink.queue_capacity = resolve_parsed(&lookup, LOKI_QUEUE_CAPACITY, sink.queue_capacity);
        sink.batch_size = resolve_parsed(&lookup, LOKI_BATCH_SIZE, sink.batch_size);

        let timeouts = &mut config.timeouts;
        timeouts.sink_push_secs = resolve_parsed(&lookup, LOKI_TIMEOUT_SECS, timeouts.sink_push_secs);
        timeouts.request_secs = resolve_parsed(&lookup, REQUEST_TIMEOUT_SECS, timeouts.request_secs);

        let observability = &mut config.observability;
        observability.metrics_enabled =
            resolve_parsed(&lookup, METRICS_ENABLED, observability.metrics_enabled);
        observability.metrics_address =
            resolve_with(&lookup, METRICS_ADDRESS, &observability.metrics_address);

        config
    }
}
