//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Resolve config → Init tracing → Build Loki hook + Logger → Bind → Serve
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C or Shutdown::trigger → Stop accepting → Drain requests
//!     → Flush Loki hook (bounded wait) → Exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
