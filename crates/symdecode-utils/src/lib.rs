//! # symdecode Utilities
//!
//! Shared logging setup for the symdecode workspace.
//!
//! `symdecode-core` only emits `tracing` events; binaries and embedders use
//! this crate to install a subscriber for them.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    LogFormat, LogLevel, LoggingError, LoggingGuard, init_logging, init_logging_to_file, init_logging_with_format,
    init_logging_with_level,
};
pub use tracing::{debug, error, info, trace, warn};
