//! Error types for the Floodgate library.

use thiserror::Error;

/// Main error type for Floodgate operations.
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// Unusable limiter parameters or rule values
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Rule-file parsing errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;
