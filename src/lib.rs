//! Loki Request Logger Library
//!
//! A two-endpoint HTTP service whose request logs are shipped to Loki.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod math;
pub mod observability;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use observability::{Logger, LokiHook};
