//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! handlers / request-log middleware
//!     → logger.rs (Logger::log, one LogRecord per call)
//!         → mirrored to logging.rs (local tracing subscriber)
//!         → every Hook whose level range matches
//!             → loki.rs (enqueue, background push to the sink)
//!
//! metrics.rs counts requests and sink deliveries on the side.
//! ```
//!
//! # Design Decisions
//! - The Logger is built once in main and passed into the router; there is
//!   no global logger
//! - Sink failures never reach request handling; they show up in
//!   ShipperStats, metrics and local warnings

pub mod logger;
pub mod logging;
pub mod loki;
pub mod metrics;

pub use logger::{Fields, Hook, HookError, Level, LevelRange, LogRecord, Logger};
pub use loki::{
    Formatter, Labels, LevelMap, LokiHook, LokiHookOptions, ShipError, ShipperStats, SHIPPED_LEVELS,
};
