//! Crate-level error type
//!
//! The runtime loop has no fatal path: network and broker failures are
//! retried forever inside their components. What remains for the process to
//! report is startup trouble, mostly configuration.

use thiserror::Error;

/// Main error type for device startup and shutdown
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl DeviceError {
    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;
