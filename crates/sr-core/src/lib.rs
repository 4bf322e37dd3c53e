//! sr-core: shared errors, configuration, and the relay log.
//!
//! This crate is the foundational dependency for all other sr-* crates,
//! providing a unified error type, the application configuration, and the
//! bounded [`LogSink`](log::LogSink) that operators poll through the HTTP API.

pub mod config;
pub mod error;
pub mod log;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use log::{LogEntry, LogSink};
