//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with both handlers
//! - Wire up middleware (request id, request log, tracing, timeout)
//! - Serve on a bound listener until shutdown

use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServiceConfig;
use crate::http::handlers;
use crate::http::middleware::request_log;
use crate::observability::Logger;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub logger: Arc<Logger>,
}

/// HTTP server for the service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server. `logger` is shared by handlers and the
    /// request-log middleware.
    pub fn new(config: ServiceConfig, logger: Arc<Logger>) -> Self {
        let router = build_router(logger, config.timeouts.request());
        Self { router, config }
    }

    /// Run the server on `listener` until `shutdown` fires or Ctrl+C.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            configured = %self.config.bind_address(),
            request_timeout_secs = self.config.timeouts.request_secs,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown.recv() => {},
                    _ = shutdown_signal() => {},
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
///
/// Layers run outermost first: request id, trace, request log, timeout.
#[allow(deprecated)]
pub fn build_router(logger: Arc<Logger>, request_timeout: Duration) -> Router {
    let state = AppState {
        logger: logger.clone(),
    };

    Router::new()
        .route("/", get(handlers::health))
        .route("/test", get(handlers::test))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn_with_state(logger, request_log))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
