//! Error types for the ctxpack domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Only configuration problems and cancellation ever reach a caller;
//! collector errors are recovered inside the engine.

use thiserror::Error;

/// The top-level error type for all ctxpack operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Run control ---
    #[error("Context request was cancelled")]
    Cancelled,
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures raised from inside `Collector::collect`.
///
/// The orchestrator logs these and treats the collector as having
/// produced nothing.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Missing parameter '{parameter}' for collector {collector}")]
    MissingParameter { collector: String, parameter: String },

    #[error("I/O failure in {collector}: {reason}")]
    Io { collector: String, reason: String },

    #[error("Collector {collector} failed: {reason}")]
    Failed { collector: String, reason: String },

    #[error("Collector {collector} timed out after {timeout_ms}ms")]
    Timeout { collector: String, timeout_ms: u64 },

    #[error("Collector {0} observed cancellation")]
    Cancelled(String),
}
