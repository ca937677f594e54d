//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → middleware/request_log.rs (start timer, snapshot request)
//!     → handlers.rs (`/` or `/test`, fallback 404)
//!     → middleware/request_log.rs (complete snapshot, one log record)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use middleware::{HandlerError, RequestSnapshot};
pub use server::{build_router, AppState, HttpServer};
