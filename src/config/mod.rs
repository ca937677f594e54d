//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment
//!     → loader.rs (resolve each variable, default when unset or empty)
//!     → ServiceConfig (immutable)
//!     → passed by value to main, server and hook construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults; absence is never an error
//! - No semantic validation: a bad bind address surfaces as a bind failure

pub mod loader;
pub mod schema;

pub use loader::resolve;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ServiceConfig;
pub use schema::SinkConfig;
pub use schema::TimeoutConfig;
