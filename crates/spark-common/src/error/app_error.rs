//! Application error types
//!
//! Unified error handling for the client host process.

use crate::config::ConfigError;
use crate::telemetry::TracingError;
use std::fmt;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    // Telemetry errors
    #[error(transparent)]
    Tracing(#[from] TracingError),

    // Input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Get the process exit code for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            // EX_USAGE
            Self::InvalidInput(_) => 64,
            // EX_CONFIG
            Self::Config(_) | Self::Tracing(_) => 78,
            // EX_IOERR
            Self::Io(_) => 74,
            // EX_SOFTWARE
            Self::Internal(_) => 70,
        }
    }

    /// Get a stable error code for log records
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Tracing(_) => "TRACING_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Create an invalid input error
    #[must_use]
    pub fn invalid_input(msg: impl fmt::Display) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
