//! Configuration schema definitions.
//!
//! All settings are plain values resolved once at startup. Every struct has a
//! `Default` matching the documented deployment defaults.

use serde::Serialize;
use std::time::Duration;

/// Root configuration for the service.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    pub listener: ListenerConfig,

    /// Log sink (Loki) settings.
    pub sink: SinkConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Local observability settings.
    pub observability: ObservabilityConfig,
}

impl ServiceConfig {
    /// JSON dump of the resolved settings, password omitted.
    pub fn redacted_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Address the HTTP server binds to, e.g. `0.0.0.0:8080`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listener.host, self.listener.port)
    }

    /// Base URL of the log sink, e.g. `http://127.0.0.1:3100`.
    pub fn sink_url(&self) -> String {
        format!("http://{}:{}", self.sink.host, self.sink.port)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ListenerConfig {
    /// Bind host (`SERVER`).
    pub host: String,

    /// Bind port (`PORT`). Kept as a string; only the socket bind interprets it.
    pub port: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: "8080".to_string(),
        }
    }
}

/// Log sink configuration.
#[derive(Debug, Clone, Serialize)]
pub struct SinkConfig {
    /// Sink host (`SERVER_LOKI`).
    pub host: String,

    /// Sink port (`PORT_LOKI`).
    pub port: String,

    /// Value of the static `job` label (`JOB`).
    pub job: String,

    /// Basic-auth username (`USERNAME`).
    pub username: String,

    /// Basic-auth password (`PASSWORD`). Never serialized.
    #[serde(skip_serializing)]
    pub password: String,

    /// Maximum records buffered before new ones are dropped.
    pub queue_capacity: usize,

    /// Maximum records sent in a single push.
    pub batch_size: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: "3100".to_string(),
            job: "example-app".to_string(),
            username: "admin".to_string(),
            password: "secretpassword".to_string(),
            queue_capacity: 1024,
            batch_size: 100,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Serialize)]
pub struct TimeoutConfig {
    /// Total time allowed for a single sink push, in seconds.
    pub sink_push_secs: u64,

    /// Total time allowed for handling an inbound request, in seconds.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn sink_push(&self) -> Duration {
        Duration::from_secs(self.sink_push_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            sink_push_secs: 5,
            request_secs: 30,
        }
    }
}

/// Local observability configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ObservabilityConfig {
    /// Fallback filter for the local tracing subscriber when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "loki_request_logger=info,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
