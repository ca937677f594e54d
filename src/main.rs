//! Loki Request Logger
//!
//! Minimal HTTP service whose per-request logs are shipped to Loki.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ request id ──▶ trace ──▶ request log ──▶ timeout ──▶ handler
//!                                             │                        │
//!                                             ▼                        ▼
//!                                         ┌──────────────────────────────┐
//!                                         │            Logger            │
//!                                         │  mirror → local tracing      │
//!                                         │  hooks  → LokiHook (queue)   │
//!                                         └──────────────┬───────────────┘
//!                                                        ▼
//!                                      shipper task ──▶ POST /loki/api/v1/push
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use loki_request_logger::config::{ObservabilityConfig, ServiceConfig};
use loki_request_logger::observability::{logging, metrics, Logger, LokiHook};
use loki_request_logger::{HttpServer, Shutdown};

/// Upper bound on waiting for queued logs at exit.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&ObservabilityConfig::default().log_filter);

    tracing::info!("loki-request-logger v{} starting", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::from_env();

    tracing::info!(
        bind_address = %config.bind_address(),
        sink_url = %config.sink_url(),
        job = %config.sink.job,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );
    tracing::debug!(config = %config.redacted_json(), "Resolved configuration");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let hook = Arc::new(LokiHook::from_config(&config)?);
    let logger = Arc::new(Logger::builder().hook(hook.clone()).build());

    // Bind TCP listener
    let listener = TcpListener::bind(config.bind_address()).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, logger);
    server.run(listener, shutdown.subscribe()).await?;

    if tokio::time::timeout(FLUSH_TIMEOUT, hook.flush()).await.is_err() {
        tracing::warn!("Timed out flushing logs to sink");
    }
    let stats = hook.stats();
    tracing::info!(
        pushed = stats.pushed(),
        failed = stats.failed(),
        dropped = stats.dropped(),
        "Shutdown complete"
    );
    Ok(())
}
