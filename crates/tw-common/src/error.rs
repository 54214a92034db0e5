//! Error types for Threshold Watch.
//!
//! Structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//!
//! Everything except ingestion backpressure is absorbed inside the engine
//! (the last good threshold stands); `QueueFull` is the one failure callers
//! must handle, since it represents a capacity decision the operator tunes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Threshold Watch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Window statistics errors (empty windows).
    Window,
    /// Threshold computation errors (insufficient data).
    Threshold,
    /// Ingestion errors (backpressure, closed engine).
    Ingest,
    /// Configuration file errors.
    Config,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Window => write!(f, "window"),
            ErrorCategory::Threshold => write!(f, "threshold"),
            ErrorCategory::Ingest => write!(f, "ingest"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for Threshold Watch.
#[derive(Error, Debug)]
pub enum Error {
    // Window errors (10-19)
    #[error("window is empty: no statistics available")]
    EmptyWindow,

    // Threshold errors (20-29)
    #[error("insufficient data for metric {metric}: {detail}")]
    InsufficientData { metric: String, detail: String },

    // Ingestion errors (30-39)
    #[error("ingest queue full for metric {metric} (capacity {capacity})")]
    QueueFull { metric: String, capacity: usize },

    #[error("engine is closed: no longer accepting submissions")]
    EngineClosed,

    // Configuration errors (40-49)
    #[error("configuration error: {0}")]
    Config(String),

    // I/O errors (50-59)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the stable error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            Error::EmptyWindow => 10,
            Error::InsufficientData { .. } => 20,
            Error::QueueFull { .. } => 30,
            Error::EngineClosed => 31,
            Error::Config(_) => 40,
            Error::Io(_) => 50,
            Error::Json(_) => 51,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::EmptyWindow => ErrorCategory::Window,
            Error::InsufficientData { .. } => ErrorCategory::Threshold,
            Error::QueueFull { .. } | Error::EngineClosed => ErrorCategory::Ingest,
            Error::Config(_) => ErrorCategory::Config,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    ///
    /// Window and threshold errors recover on the next cycle once data
    /// accrues; `QueueFull` recovers when the consumer drains; a closed
    /// engine does not come back.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::EmptyWindow => true,
            Error::InsufficientData { .. } => true,
            Error::QueueFull { .. } => true,
            Error::EngineClosed => false,
            Error::Config(_) => true,
            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }
}

/// Structured error response for JSON output (agent/automation consumers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,
    /// Error category for grouping.
    pub category: ErrorCategory,
    /// Human-readable error message.
    pub message: String,
    /// Whether the error is potentially recoverable.
    pub recoverable: bool,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

impl StructuredError {
    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}
